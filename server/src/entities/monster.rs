//! Actions of actors that fight and walk: attacking and path following.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, trace};
use npc_shared::{ActorNotification, Direction, ObjectKind, Point};

use crate::combat::{Attackable, Attacker, HitReport};
use crate::entities::{NonPlayerCharacter, Player};
use crate::error::{ActorError, ObjectId, Result};

impl NonPlayerCharacter {
    /// Attack one or more targets as a single action.
    ///
    /// The actor turns towards the first target and observers see one attack
    /// animation; every target then receives its own hit. Targets that turn
    /// out to be unattackable are skipped.
    pub async fn attack_targets(&self, targets: &[Arc<dyn Attackable>]) -> Result<Vec<HitReport>> {
        let Some(first) = targets.first() else {
            return Ok(Vec::new());
        };
        if self.is_disposed() {
            return Err(ActorError::Disposed(self.id()));
        }
        let me: Arc<dyn Attacker> = self.arc()?;

        self.set_rotation(Direction::between(self.position(), first.position()));
        let skill = self.definition().attack_skill.as_ref();
        self.observers
            .notify_all(&ActorNotification::ObjectAttacked {
                attacker_id: self.id(),
                target_id: first.id(),
                skill_number: skill.map(|s| s.number).unwrap_or(0),
                rotation: self.rotation(),
            })
            .await;

        let mut reports = Vec::with_capacity(targets.len());
        for target in targets {
            match target.attack_by(me.clone(), skill).await {
                Ok(Some(report)) => reports.push(report),
                Ok(None) => {}
                Err(e) => debug!("{} {} could not hit {}: {}", self.name(), self.id(), target.id(), e),
            }
        }
        Ok(reports)
    }

    /// Start walking to `destination` along a computed path.
    ///
    /// Returns `Ok(false)` if there is no path. The walk runs in the
    /// background, one step per move delay; the actor counts as walking
    /// until it arrives or is stopped.
    pub fn walk_to(&self, destination: Point) -> Result<bool> {
        let kind = self.kind();
        if !kind.can_walk() {
            return Err(ActorError::NotSupported {
                operation: "walk",
                kind,
                id: self.id(),
            });
        }
        let map = self.map()?;
        let me = self.arc()?;

        let from = self.position();
        let path = match map.services().pathfinder.find_path(map.terrain(), from, destination) {
            Some(path) if !path.is_empty() => path,
            _ => return Ok(false),
        };
        trace!("{} {} walks {} -> {} in {} steps", self.name(), self.id(), from, destination, path.len());

        self.stop_walking();
        self.walking.store(true, Ordering::Release);
        let handle = tokio::spawn(async move { me.follow_path(path).await });
        *self.walk_task.lock() = Some(handle);
        Ok(true)
    }

    async fn follow_path(self: Arc<Self>, path: Vec<Point>) {
        let delay = Duration::from_millis(self.definition().move_delay_ms);
        for step in path {
            tokio::time::sleep(delay).await;
            if !self.is_alive() || self.is_disposed() {
                break;
            }
            let rotation = Direction::between(self.position(), step);
            self.place(step, rotation, true).await;
        }
        self.walking.store(false, Ordering::Release);
    }
}

impl Attacker for NonPlayerCharacter {
    fn id(&self) -> ObjectId {
        NonPlayerCharacter::id(self)
    }

    fn name(&self) -> String {
        NonPlayerCharacter::name(self).to_string()
    }

    fn position(&self) -> Point {
        NonPlayerCharacter::position(self)
    }

    fn damage_range(&self) -> (u32, u32) {
        let definition = self.definition();
        (definition.min_damage, definition.max_damage)
    }

    /// Kills by a summon are credited to its owner
    fn credited_player(&self) -> Option<Arc<Player>> {
        self.summoned_by()
    }

    fn as_target(self: Arc<Self>) -> Option<Arc<dyn Attackable>> {
        match self.kind() {
            ObjectKind::Monster | ObjectKind::Destructible => Some(self),
            _ => None,
        }
    }
}
