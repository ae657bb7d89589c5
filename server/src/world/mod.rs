//! Game map management.
//!
//! A [`GameMap`] owns the actors, players and gates on one map, hands out
//! object ids and decides who can see whom. Collaborators such as the damage
//! calculator and the loot service are injected through [`WorldServices`].

mod event_state;
mod loot;
mod spawn_table;
mod terrain;

pub use event_state::{EventStateProvider, WorldEventState};
pub use loot::{DropTableLoot, DroppedItem, LootDrop, LootService};
pub use spawn_table::{SpawnTable, WorldData};
pub use terrain::{GridTerrain, Terrain, TerrainFlags};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Weak};

use log::{debug, info, warn};
use npc_shared::{ActorDefinition, ActorNotification, Point, SpawnArea};
use parking_lot::{Mutex, RwLock};

use crate::ai::{create_intelligence, TickScheduler};
use crate::combat::{AttributeDamageCalculator, DamageCalculator};
use crate::config::CoreConfig;
use crate::entities::{Gate, NonPlayerCharacter, Player};
use crate::error::{ActorError, ObjectId, Result};
use crate::navigation::{GridPathfinder, Pathfinder};
use crate::observers::WorldObserver;

/// First id handed out to actors and gates; lower ids belong to players
const FIRST_OBJECT_ID: ObjectId = 10000;

/// First id of items lying on the map
const FIRST_ITEM_ID: u32 = 20000;

/// Players pick up items on their own tile or an adjacent one
const PICKUP_RANGE: u8 = 1;

/// Collaborators shared by everything on a map
#[derive(Clone)]
pub struct WorldServices {
    pub config: Arc<CoreConfig>,
    pub scheduler: Arc<TickScheduler>,
    pub damage: Arc<dyn DamageCalculator>,
    pub loot: Arc<dyn LootService>,
    pub events: Arc<dyn EventStateProvider>,
    pub pathfinder: Arc<dyn Pathfinder>,
}

impl WorldServices {
    /// Default collaborators for the given configuration
    pub fn new(config: CoreConfig) -> Self {
        let pathfinder = GridPathfinder::new(config.pathfinding_max_iterations);
        Self {
            config: Arc::new(config),
            scheduler: Arc::new(TickScheduler::new()),
            damage: Arc::new(AttributeDamageCalculator::default()),
            loot: Arc::new(DropTableLoot::default()),
            events: Arc::new(WorldEventState::new()),
            pathfinder: Arc::new(pathfinder),
        }
    }

    pub fn with_scheduler(mut self, scheduler: Arc<TickScheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn with_damage(mut self, damage: Arc<dyn DamageCalculator>) -> Self {
        self.damage = damage;
        self
    }

    pub fn with_loot(mut self, loot: Arc<dyn LootService>) -> Self {
        self.loot = loot;
        self
    }

    pub fn with_events(mut self, events: Arc<dyn EventStateProvider>) -> Self {
        self.events = events;
        self
    }

    pub fn with_pathfinder(mut self, pathfinder: Arc<dyn Pathfinder>) -> Self {
        self.pathfinder = pathfinder;
        self
    }
}

/// Called when an actor was killed by a player, e.g. to count quest kills
pub trait KillListener: Send + Sync {
    fn on_killed(&self, victim: &NonPlayerCharacter, killer: &Arc<Player>);
}

/// One map with everything on it
pub struct GameMap {
    id: u16,
    terrain: Box<dyn Terrain>,
    services: WorldServices,
    npcs: RwLock<HashMap<ObjectId, Arc<NonPlayerCharacter>>>,
    players: RwLock<HashMap<ObjectId, Arc<Player>>>,
    gates: RwLock<HashMap<ObjectId, Arc<Gate>>>,
    next_id: Mutex<ObjectId>,
    next_item_id: AtomicU32,
    drops: Mutex<Vec<DroppedItem>>,
    kill_listeners: RwLock<Vec<Arc<dyn KillListener>>>,
    shut_down: AtomicBool,
    weak_self: Weak<GameMap>,
}

impl GameMap {
    pub fn new<T: Terrain + 'static>(id: u16, terrain: T, services: WorldServices) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            id,
            terrain: Box::new(terrain),
            services,
            npcs: RwLock::new(HashMap::new()),
            players: RwLock::new(HashMap::new()),
            gates: RwLock::new(HashMap::new()),
            next_id: Mutex::new(FIRST_OBJECT_ID),
            next_item_id: AtomicU32::new(FIRST_ITEM_ID),
            drops: Mutex::new(Vec::new()),
            kill_listeners: RwLock::new(Vec::new()),
            shut_down: AtomicBool::new(false),
            weak_self: weak_self.clone(),
        })
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn config(&self) -> &CoreConfig {
        &self.services.config
    }

    pub fn services(&self) -> &WorldServices {
        &self.services
    }

    pub fn terrain(&self) -> &dyn Terrain {
        self.terrain.as_ref()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Next id that is neither used by an actor nor by a gate
    fn allocate_id(&self) -> Result<ObjectId> {
        let npcs = self.npcs.read();
        let gates = self.gates.read();
        let mut next = self.next_id.lock();

        let span = (ObjectId::MAX - FIRST_OBJECT_ID) as u32 + 1;
        for _ in 0..span {
            let id = *next;
            *next = if id == ObjectId::MAX { FIRST_OBJECT_ID } else { id + 1 };
            if !npcs.contains_key(&id) && !gates.contains_key(&id) {
                return Ok(id);
            }
        }
        Err(ActorError::IdsExhausted(self.id))
    }

    // ========================================================================
    // Actors
    // ========================================================================

    /// Create an actor from a spawn area, place it and start its intelligence
    pub async fn spawn_npc(
        self: &Arc<Self>,
        definition: Arc<ActorDefinition>,
        area: Arc<SpawnArea>,
    ) -> Result<Arc<NonPlayerCharacter>> {
        self.spawn(definition, area, None).await
    }

    /// Summon a creature next to `owner`. A previous summon of the owner is
    /// removed.
    pub async fn summon_monster(
        self: &Arc<Self>,
        owner: &Arc<Player>,
        definition: Arc<ActorDefinition>,
    ) -> Result<Arc<NonPlayerCharacter>> {
        let area = Arc::new(SpawnArea::around(
            0,
            self.id,
            definition.number,
            owner.position(),
            self.config().summon_spawn_radius,
        ));
        let summon = self.spawn(definition, area, Some(owner)).await?;

        if let Some(previous) = owner.set_summon(Some(summon.clone())) {
            self.remove_npc(previous.id()).await;
        }
        info!("Player {} summoned {} {}", owner.name(), summon.name(), summon.id());
        Ok(summon)
    }

    async fn spawn(
        self: &Arc<Self>,
        definition: Arc<ActorDefinition>,
        area: Arc<SpawnArea>,
        owner: Option<&Arc<Player>>,
    ) -> Result<Arc<NonPlayerCharacter>> {
        if self.is_shut_down() {
            return Err(ActorError::NotOnMap(0));
        }
        let id = self.allocate_id()?;
        let npc = NonPlayerCharacter::new(id, definition.clone(), area, self, owner);

        if let Some(intelligence) =
            create_intelligence(&definition, owner.is_some(), &self.services.scheduler, self.config())
        {
            intelligence.bind(&npc)?;
            npc.attach_intelligence(intelligence);
        }
        if let Err(e) = npc.initialize() {
            npc.dispose().await;
            return Err(e);
        }

        self.npcs.write().insert(id, npc.clone());
        npc.on_spawn()?;
        self.refresh_npc_visibility(&npc).await;

        debug!("Spawned {} {} at {}", npc.name(), id, npc.position());
        Ok(npc)
    }

    /// Remove an actor for good
    pub async fn remove_npc(&self, id: ObjectId) -> Option<Arc<NonPlayerCharacter>> {
        let npc = self.npcs.write().remove(&id)?;
        npc.dispose().await;
        if let Some(owner) = npc.summoned_by() {
            owner.release_summon(id);
        }

        debug!("Removed {} {} from map {}", npc.name(), id, self.id);
        Some(npc)
    }

    /// Start a new life of a dead actor: new spawn point, full health
    pub async fn respawn_npc(&self, npc: &Arc<NonPlayerCharacter>) -> Result<()> {
        if npc.is_disposed() || self.is_shut_down() {
            return Err(ActorError::Disposed(npc.id()));
        }
        if let Err(e) = npc.initialize() {
            self.remove_npc(npc.id()).await;
            return Err(e);
        }

        self.npcs.write().insert(npc.id(), npc.clone());
        npc.on_spawn()?;
        self.refresh_npc_visibility(npc).await;

        info!("{} {} respawned at {}", npc.name(), npc.id(), npc.position());
        Ok(())
    }

    pub fn npc(&self, id: ObjectId) -> Option<Arc<NonPlayerCharacter>> {
        self.npcs.read().get(&id).cloned()
    }

    pub fn npcs(&self) -> Vec<Arc<NonPlayerCharacter>> {
        self.npcs.read().values().cloned().collect()
    }

    /// Living actors within `radius` tiles of `center`
    pub fn npcs_near(&self, center: Point, radius: u8) -> Vec<Arc<NonPlayerCharacter>> {
        self.npcs
            .read()
            .values()
            .filter(|npc| npc.is_alive() && center.is_in_range(npc.position(), radius))
            .cloned()
            .collect()
    }

    // ========================================================================
    // Players
    // ========================================================================

    pub async fn add_player(self: &Arc<Self>, player: Arc<Player>) {
        player.attach_to(self);
        self.players.write().insert(player.id(), player.clone());
        self.refresh_player_visibility(&player).await;
        info!("Player {} ({}) entered map {}", player.name(), player.id(), self.id);
    }

    /// The player goes offline: it stops observing, and its gates and summon
    /// go away with it
    pub async fn remove_player(&self, id: ObjectId) -> Option<Arc<Player>> {
        let player = self.players.write().remove(&id)?;

        for npc in self.npcs() {
            npc.remove_observer(id).await;
        }
        self.remove_gates_of(id);
        if let Some(summon) = player.summoned() {
            self.remove_npc(summon.id()).await;
        }
        player.detach();

        info!("Player {} ({}) left map {}", player.name(), id, self.id);
        Some(player)
    }

    pub async fn move_player(&self, id: ObjectId, to: Point) -> Result<()> {
        let player = self.player(id).ok_or(ActorError::NotOnMap(id))?;
        player.set_position(to);
        self.refresh_player_visibility(&player).await;
        Ok(())
    }

    pub fn player(&self, id: ObjectId) -> Option<Arc<Player>> {
        self.players.read().get(&id).cloned()
    }

    pub fn players(&self) -> Vec<Arc<Player>> {
        self.players.read().values().cloned().collect()
    }

    /// A player died: its gates and summon are removed
    pub async fn on_player_died(&self, player: &Player) {
        self.remove_gates_of(player.id());
        if let Some(summon) = player.summoned() {
            self.remove_npc(summon.id()).await;
        }
    }

    // ========================================================================
    // Area of interest
    // ========================================================================

    /// Update which actors `player` observes after it moved or appeared
    pub async fn refresh_player_visibility(&self, player: &Arc<Player>) {
        let radius = self.config().view_radius;
        let position = player.position();
        let observer: Arc<dyn WorldObserver> = player.clone();

        for npc in self.npcs() {
            if position.is_in_range(npc.position(), radius) {
                npc.add_observer(observer.clone()).await;
            } else {
                npc.remove_observer(player.id()).await;
            }
        }
    }

    /// Update which players observe `npc` after it moved or appeared
    pub async fn refresh_npc_visibility(&self, npc: &Arc<NonPlayerCharacter>) {
        let radius = self.config().view_radius;
        let position = npc.position();

        for player in self.players() {
            if position.is_in_range(player.position(), radius) {
                npc.add_observer(player).await;
            } else {
                npc.remove_observer(player.id()).await;
            }
        }
    }

    // ========================================================================
    // Gates
    // ========================================================================

    pub fn create_gate(self: &Arc<Self>, owner: &Arc<Player>, position: Point, destination: Point) -> Result<Arc<Gate>> {
        let id = self.allocate_id()?;
        let gate = Gate::new(id, owner, position, destination, self.config().gate_max_uses, self);
        self.gates.write().insert(id, gate.clone());
        gate.start_lifetime(self.config().gate_lifetime());

        debug!("Player {} opened gate {} to {}", owner.id(), id, destination);
        Ok(gate)
    }

    pub fn remove_gate(&self, id: ObjectId) -> Option<Arc<Gate>> {
        let gate = self.gates.write().remove(&id)?;
        gate.dispose();
        Some(gate)
    }

    fn remove_gates_of(&self, owner_id: ObjectId) {
        let owned: Vec<ObjectId> = self
            .gates
            .read()
            .values()
            .filter(|gate| gate.owner_id() == owner_id)
            .map(|gate| gate.id())
            .collect();
        for id in owned {
            self.remove_gate(id);
        }
    }

    pub fn gate(&self, id: ObjectId) -> Option<Arc<Gate>> {
        self.gates.read().get(&id).cloned()
    }

    pub fn gates(&self) -> Vec<Arc<Gate>> {
        self.gates.read().values().cloned().collect()
    }

    // ========================================================================
    // Kills and loot
    // ========================================================================

    pub fn add_kill_listener(&self, listener: Arc<dyn KillListener>) {
        self.kill_listeners.write().push(listener);
    }

    pub fn notify_kill_listeners(&self, victim: &NonPlayerCharacter, killer: &Arc<Player>) {
        let listeners = self.kill_listeners.read().clone();
        for listener in listeners {
            listener.on_killed(victim, killer);
        }
    }

    /// Hand out experience and drops once the death animation had time to
    /// play. The task is detached and runs to completion even if the victim
    /// is removed meanwhile.
    pub fn schedule_loot(&self, victim: &NonPlayerCharacter, killer: Arc<Player>) {
        let map = self.weak_self.clone();
        let definition = victim.definition().clone();
        let victim_id = victim.id();
        let position = victim.position();
        let delay = self.config().loot_drop_delay();

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(map) = map.upgrade() else {
                return;
            };
            if let Err(e) = map.distribute_loot(victim_id, &definition, position, &killer) {
                warn!("Loot of {} for {} failed: {}", victim_id, killer.id(), e);
            }
        });
    }

    /// Give the killer its experience and put the drops on the map
    pub fn distribute_loot(
        &self,
        victim_id: ObjectId,
        definition: &ActorDefinition,
        position: Point,
        killer: &Arc<Player>,
    ) -> Result<LootDrop> {
        if killer.map().map_or(true, |map| map.id() != self.id) {
            return Err(ActorError::NotOnMap(killer.id()));
        }

        let experience = self.services.loot.distribute_experience(definition, killer);
        if experience > 0 {
            killer.add_experience(experience);
            killer.notify(&ActorNotification::ExperienceGained {
                victim_id,
                amount: experience,
            });
        }

        let drop = self.services.loot.generate_drops(definition, experience, killer);
        if drop.is_empty() {
            return Ok(drop);
        }

        let ids: Vec<u32> = {
            let mut drops = self.drops.lock();
            drop.items
                .iter()
                .map(|item| {
                    let id = self.next_item_id.fetch_add(1, Ordering::Relaxed);
                    drops.push(DroppedItem {
                        id,
                        item: item.clone(),
                        position,
                    });
                    id
                })
                .collect()
        };
        if let Some(money) = drop.money {
            killer.add_money(money);
        }

        self.notify_players_near(
            position,
            &ActorNotification::ItemsDropped {
                position,
                items: drop.items.clone(),
                money: drop.money,
            },
        );
        self.schedule_drop_expiry(ids);

        debug!("{} dropped {} items for {}", definition.designation, drop.items.len(), killer.name());
        Ok(drop)
    }

    /// Items lying on the map
    pub fn drops(&self) -> Vec<DroppedItem> {
        self.drops.lock().clone()
    }

    /// Move a dropped item into the inventory of a player standing on or next
    /// to it
    pub fn pick_up(&self, item_id: u32, player: &Arc<Player>) -> Result<DroppedItem> {
        if player.map().map_or(true, |map| map.id() != self.id) {
            return Err(ActorError::NotOnMap(player.id()));
        }

        let dropped = {
            let mut drops = self.drops.lock();
            let index = drops
                .iter()
                .position(|dropped| dropped.id == item_id)
                .ok_or(ActorError::UnknownItem(item_id))?;
            if !drops[index].position.is_in_range(player.position(), PICKUP_RANGE) {
                return Err(ActorError::ItemOutOfReach {
                    item: item_id,
                    player: player.id(),
                });
            }
            drops.swap_remove(index)
        };

        player.add_item(dropped.item.clone());
        self.notify_players_near(
            dropped.position,
            &ActorNotification::ItemRemoved {
                item_id,
                position: dropped.position,
            },
        );
        debug!("{} picked up item {} ({})", player.name(), item_id, dropped.item.item_id);
        Ok(dropped)
    }

    /// Remove the given drops once their lifetime is over, unless they were
    /// picked up meanwhile
    fn schedule_drop_expiry(&self, ids: Vec<u32>) {
        if ids.is_empty() {
            return;
        }
        let map = self.weak_self.clone();
        let lifetime = self.config().drop_lifetime();

        tokio::spawn(async move {
            tokio::time::sleep(lifetime).await;
            if let Some(map) = map.upgrade() {
                map.expire_drops(&ids);
            }
        });
    }

    fn expire_drops(&self, ids: &[u32]) {
        let expired: Vec<DroppedItem> = {
            let mut drops = self.drops.lock();
            let (expired, kept) = std::mem::take(&mut *drops)
                .into_iter()
                .partition(|dropped| ids.contains(&dropped.id));
            *drops = kept;
            expired
        };

        for dropped in &expired {
            self.notify_players_near(
                dropped.position,
                &ActorNotification::ItemRemoved {
                    item_id: dropped.id,
                    position: dropped.position,
                },
            );
        }
        if !expired.is_empty() {
            debug!("{} dropped items expired on map {}", expired.len(), self.id);
        }
    }

    fn notify_players_near(&self, position: Point, notification: &ActorNotification) {
        let radius = self.config().view_radius;
        for player in self.players() {
            if position.is_in_range(player.position(), radius) {
                player.notify(notification);
            }
        }
    }

    // ========================================================================
    // Shutdown
    // ========================================================================

    /// Dispose everything on the map and stop all schedules
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }

        let npcs: Vec<_> = self.npcs.write().drain().map(|(_, npc)| npc).collect();
        for npc in &npcs {
            npc.dispose().await;
        }
        let gates: Vec<_> = self.gates.write().drain().map(|(_, gate)| gate).collect();
        for gate in &gates {
            gate.dispose();
        }
        self.services.scheduler.cancel_all();

        info!(
            "Map {} shut down: {} actors, {} gates, {} players",
            self.id,
            npcs.len(),
            gates.len(),
            self.players.read().len()
        );
    }
}

impl std::fmt::Debug for GameMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameMap")
            .field("id", &self.id)
            .field("npcs", &self.npcs.read().len())
            .field("players", &self.players.read().len())
            .field("gates", &self.gates.read().len())
            .finish()
    }
}
