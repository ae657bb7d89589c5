//! Non-player characters: monsters, traps, guards, destructibles and balls.
//!
//! One struct covers every kind; what an actor can do follows from its
//! definition's [`ObjectKind`] and from the intelligence bound to it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use log::{debug, warn};
use npc_shared::{ActorDefinition, ActorNotification, DeathInformation, Direction, ObjectKind, Point, SpawnArea};
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::ai::Intelligence;
use crate::combat::Health;
use crate::entities::{EffectList, Player, StatusFlags};
use crate::error::{ActorError, ObjectId, Result};
use crate::observers::{ObserverEdge, ObserverSet, WorldObserver};
use crate::world::GameMap;

#[derive(Debug, Clone, Copy)]
struct Placement {
    position: Point,
    rotation: Direction,
}

/// A simulated actor on a map
pub struct NonPlayerCharacter {
    id: ObjectId,
    definition: Arc<ActorDefinition>,
    spawn_area: Arc<SpawnArea>,
    map: Weak<GameMap>,
    pub(crate) weak_self: Weak<NonPlayerCharacter>,
    placement: Mutex<Placement>,
    pub(crate) effects: EffectList,
    pub(crate) observers: ObserverSet,
    pub(crate) health: Health,
    pub(crate) death: Mutex<Option<DeathInformation>>,
    summoned_by: Option<Weak<Player>>,
    intelligence: Mutex<Option<Arc<Intelligence>>>,
    pub(crate) respawn_task: Mutex<Option<JoinHandle<()>>>,
    pub(crate) walk_task: Mutex<Option<JoinHandle<()>>>,
    pub(crate) walking: AtomicBool,
    disposed: AtomicBool,
}

impl NonPlayerCharacter {
    pub(crate) fn new(
        id: ObjectId,
        definition: Arc<ActorDefinition>,
        spawn_area: Arc<SpawnArea>,
        map: &Arc<GameMap>,
        summoned_by: Option<&Arc<Player>>,
    ) -> Arc<Self> {
        let max_health = spawn_area.max_health_override.unwrap_or(definition.max_health);
        let position = Point::new(spawn_area.x1, spawn_area.y1);

        Arc::new_cyclic(|weak_self| Self {
            id,
            definition,
            spawn_area,
            map: Arc::downgrade(map),
            weak_self: weak_self.clone(),
            placement: Mutex::new(Placement {
                position,
                rotation: Direction::Undefined,
            }),
            effects: EffectList::default(),
            observers: ObserverSet::new(),
            health: Health::new(max_health),
            death: Mutex::new(None),
            summoned_by: summoned_by.map(Arc::downgrade),
            intelligence: Mutex::new(None),
            respawn_task: Mutex::new(None),
            walk_task: Mutex::new(None),
            walking: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        })
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Start a new life: pick a valid spawn point, reset health and rotation.
    ///
    /// Gives up with [`ActorError::NoSpawnPoint`] after the configured number
    /// of attempts, which means the spawn area is misconfigured.
    pub fn initialize(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(ActorError::Disposed(self.id));
        }
        let map = self.map()?;
        let attempts = map.config().spawn_retry_limit;

        let position = (0..attempts)
            .map(|_| self.spawn_area.random_point())
            .find(|point| self.is_valid_spawn_point(&map, *point))
            .ok_or_else(|| {
                warn!(
                    "No valid spawn point for {} in spawn area {} after {} attempts",
                    self.definition.designation, self.spawn_area.id, attempts
                );
                ActorError::NoSpawnPoint {
                    area: self.spawn_area.id,
                    attempts,
                }
            })?;

        *self.placement.lock() = Placement {
            position,
            rotation: self.spawn_area.direction.or_random(),
        };
        self.health.reset(self.max_health());
        self.effects.clear();
        *self.death.lock() = None;
        self.walking.store(false, Ordering::Release);

        debug!("{} {} initialized at {}", self.definition.designation, self.id, position);
        Ok(())
    }

    fn is_valid_spawn_point(&self, map: &GameMap, point: Point) -> bool {
        let kind = self.definition.kind;
        let terrain = map.terrain();
        if kind.avoids_safe_zone() && terrain.is_safe_zone(point) {
            return false;
        }
        if kind.can_walk() && !terrain.is_walkable(point) {
            return false;
        }
        true
    }

    /// Called once the actor is registered on its map
    pub fn on_spawn(&self) -> Result<()> {
        match self.intelligence() {
            Some(intelligence) => intelligence.start(),
            None => Ok(()),
        }
    }

    pub(crate) fn attach_intelligence(&self, intelligence: Arc<Intelligence>) {
        *self.intelligence.lock() = Some(intelligence);
    }

    /// Remove the actor for good: stop its intelligence, walk and pending
    /// respawn, and tell every observer it is gone. Calling this again does
    /// nothing.
    pub async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        if let Some(respawn) = self.respawn_task.lock().take() {
            respawn.abort();
        }
        self.stop_walking();
        if let Some(intelligence) = self.intelligence.lock().take() {
            intelligence.dispose();
        }

        let disappeared = ActorNotification::ObjectDisappeared { id: self.id };
        for observer in self.observers.clear().await {
            observer.notify(&disappeared);
        }
        debug!("{} {} disposed", self.definition.designation, self.id);
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    // ========================================================================
    // Observers
    // ========================================================================

    /// Make the actor visible to an observer. Dead or disposed actors cannot
    /// gain observers.
    pub async fn add_observer(&self, observer: Arc<dyn WorldObserver>) -> ObserverEdge {
        if self.is_disposed() || !self.is_alive() {
            return ObserverEdge::Unchanged;
        }

        let intelligence = self.intelligence();
        let edge = self
            .observers
            .add_with(observer.clone(), |edge| {
                if let (ObserverEdge::FirstAdded, Some(intelligence)) = (edge, &intelligence) {
                    intelligence.set_observed(true);
                }
            })
            .await;
        if edge.changed() {
            observer.notify(&self.appeared_notification());
        }
        edge
    }

    /// The observed flag flips under the set's write lock, so it always
    /// matches whether the set is empty.
    pub async fn remove_observer(&self, id: ObjectId) -> ObserverEdge {
        let intelligence = self.intelligence();
        let (edge, removed) = self
            .observers
            .remove_with(id, |edge| {
                if let (ObserverEdge::LastRemoved, Some(intelligence)) = (edge, &intelligence) {
                    intelligence.set_observed(false);
                }
            })
            .await;
        if let Some(observer) = removed {
            observer.notify(&ActorNotification::ObjectDisappeared { id: self.id });
        }
        edge
    }

    pub fn observers(&self) -> &ObserverSet {
        &self.observers
    }

    pub async fn notify_observers(&self, notification: &ActorNotification) {
        self.observers.notify_all(notification).await;
    }

    fn appeared_notification(&self) -> ActorNotification {
        let placement = *self.placement.lock();
        ActorNotification::ObjectAppeared {
            id: self.id,
            definition: self.definition.number,
            position: placement.position,
            rotation: placement.rotation,
            health: self.health.current(),
        }
    }

    // ========================================================================
    // Movement
    // ========================================================================

    /// Put the actor on another tile without walking there
    pub async fn move_to(&self, target: Point) -> Result<()> {
        let kind = self.definition.kind;
        if !kind.can_walk() && kind != ObjectKind::SoccerBall {
            return Err(ActorError::NotSupported {
                operation: "move",
                kind,
                id: self.id,
            });
        }
        if self.is_disposed() {
            return Err(ActorError::Disposed(self.id));
        }

        self.stop_walking();
        self.place(target, Direction::between(self.position(), target), false).await;
        Ok(())
    }

    /// Update position and rotation, tell observers and refresh who can see us
    pub(crate) async fn place(&self, position: Point, rotation: Direction, walking: bool) {
        let rotation = {
            let mut placement = self.placement.lock();
            placement.position = position;
            if rotation != Direction::Undefined {
                placement.rotation = rotation;
            }
            placement.rotation
        };

        self.observers
            .notify_all(&ActorNotification::ObjectMoved {
                id: self.id,
                position,
                rotation,
                walking,
            })
            .await;

        if let (Ok(map), Some(me)) = (self.map(), self.weak_self.upgrade()) {
            map.refresh_npc_visibility(&me).await;
        }
    }

    pub fn stop_walking(&self) {
        if let Some(walk) = self.walk_task.lock().take() {
            walk.abort();
        }
        self.walking.store(false, Ordering::Release);
    }

    pub fn is_walking(&self) -> bool {
        self.walking.load(Ordering::Acquire)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.definition.designation
    }

    pub fn kind(&self) -> ObjectKind {
        self.definition.kind
    }

    pub fn definition(&self) -> &Arc<ActorDefinition> {
        &self.definition
    }

    pub fn spawn_area(&self) -> &Arc<SpawnArea> {
        &self.spawn_area
    }

    pub fn position(&self) -> Point {
        self.placement.lock().position
    }

    pub fn rotation(&self) -> Direction {
        self.placement.lock().rotation
    }

    pub fn set_rotation(&self, rotation: Direction) {
        if rotation != Direction::Undefined {
            self.placement.lock().rotation = rotation;
        }
    }

    pub fn health(&self) -> u32 {
        self.health.current()
    }

    pub fn max_health(&self) -> u32 {
        self.spawn_area.max_health_override.unwrap_or(self.definition.max_health)
    }

    pub fn is_alive(&self) -> bool {
        !self.health.is_depleted()
    }

    pub fn status(&self) -> StatusFlags {
        self.effects.status()
    }

    pub fn effects(&self) -> &EffectList {
        &self.effects
    }

    /// The player that summoned this actor, if it is a summon and the player
    /// is still around
    pub fn summoned_by(&self) -> Option<Arc<Player>> {
        self.summoned_by.as_ref()?.upgrade()
    }

    pub fn is_summoned(&self) -> bool {
        self.summoned_by.is_some()
    }

    /// How this actor died last time, while it is dead
    pub fn death_information(&self) -> Option<DeathInformation> {
        self.death.lock().clone()
    }

    pub fn intelligence(&self) -> Option<Arc<Intelligence>> {
        self.intelligence.lock().clone()
    }

    pub fn map(&self) -> Result<Arc<GameMap>> {
        self.map.upgrade().ok_or(ActorError::NotOnMap(self.id))
    }

    pub(crate) fn arc(&self) -> Result<Arc<NonPlayerCharacter>> {
        self.weak_self.upgrade().ok_or(ActorError::Disposed(self.id))
    }
}

impl std::fmt::Debug for NonPlayerCharacter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NonPlayerCharacter")
            .field("id", &self.id)
            .field("designation", &self.definition.designation)
            .field("kind", &self.definition.kind)
            .field("position", &self.position())
            .field("health", &self.health.current())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
