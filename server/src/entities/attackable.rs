//! Combat resolution and death handling for non-player characters.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use npc_shared::{ActorNotification, DeathInformation, Direction, HitOutcome, ObjectKind, Point, SkillDefinition, SpawnTrigger};

use crate::combat::{Attackable, Attacker, DamageApplied, HitReport, TargetKind};
use crate::entities::{NonPlayerCharacter, StatusFlags};
use crate::error::{ActorError, ObjectId, Result};
use crate::observers::WorldObserver;
use crate::world::{EventStateProvider, GameMap};

impl NonPlayerCharacter {
    /// Kinds that cannot take hits at all
    fn ensure_attackable(&self) -> Result<()> {
        let kind = self.definition().kind;
        match kind {
            ObjectKind::Guard | ObjectKind::PassiveNpc => Err(ActorError::Unattackable(self.id())),
            ObjectKind::Trap => Err(ActorError::NotSupported {
                operation: "register hit",
                kind,
                id: self.id(),
            }),
            _ if self.is_disposed() => Err(ActorError::Disposed(self.id())),
            _ => Ok(()),
        }
    }

    /// Damage from reflection or poison. Runs through the same path as a
    /// regular hit, with a tagged outcome and possibly no attacker.
    pub async fn receive_effect_damage(
        &self,
        outcome: HitOutcome,
        source: Option<Arc<dyn Attacker>>,
    ) -> Result<Option<HitReport>> {
        self.ensure_attackable()?;
        if self.kind() == ObjectKind::SoccerBall || !self.is_alive() {
            return Ok(None);
        }
        Ok(self.apply_hit(outcome, source, 0).await)
    }

    /// Apply a computed outcome to health and handle the consequences.
    ///
    /// Returns `None` if the actor was already dead when the damage landed.
    async fn apply_hit(
        &self,
        outcome: HitOutcome,
        attacker: Option<Arc<dyn Attacker>>,
        skill_number: u16,
    ) -> Option<HitReport> {
        let applied = if outcome.health_damage > 0 {
            self.health.apply_damage(outcome.health_damage)?
        } else {
            DamageApplied {
                remaining: self.health.current(),
                lethal: false,
            }
        };

        if outcome.has_damage() {
            if let Some(attacker) = &attacker {
                if let Some(intelligence) = self.intelligence() {
                    intelligence.register_hit(attacker.clone());
                }
                attacker.after_hit_target(&outcome);
            }
        }

        let hit = ActorNotification::ObjectHit {
            target_id: self.id(),
            attacker_id: attacker.as_ref().map(|a| a.id()),
            outcome,
            remaining_health: applied.remaining,
        };
        self.observers.notify_all(&hit).await;

        if applied.lethal {
            let death = DeathInformation {
                killer_id: attacker.as_ref().map(|a| a.id()).unwrap_or(0),
                killer_name: attacker.as_ref().map(|a| a.name()).unwrap_or_default(),
                outcome,
                skill_number,
            };
            *self.death.lock() = Some(death.clone());

            // The owner hears about the hit on its summon before the death
            if let Some(owner) = self.summoned_by() {
                owner.notify(&hit);
            }
            self.on_death(death, attacker).await;
        }

        Some(HitReport {
            outcome,
            lethal: applied.lethal,
        })
    }

    async fn on_death(&self, death: DeathInformation, attacker: Option<Arc<dyn Attacker>>) {
        self.stop_walking();
        info!(
            "{} {} was killed by {} ({})",
            self.name(),
            self.id(),
            death.killer_name,
            death.killer_id
        );

        self.observers
            .notify_all(&ActorNotification::ObjectKilled {
                target_id: self.id(),
                killer_id: death.killer_id,
                killer_name: death.killer_name.clone(),
                skill_number: death.skill_number,
            })
            .await;
        self.observers.clear().await;
        if let Some(intelligence) = self.intelligence() {
            intelligence.set_observed(false);
        }

        let Ok(map) = self.map() else {
            return;
        };

        if let Some(killer) = attacker.and_then(|a| a.credited_player()) {
            map.schedule_loot(self, killer.clone());
            map.notify_kill_listeners(self, &killer);
        }

        if self.should_respawn(map.services().events.as_ref()) {
            self.schedule_respawn(map);
        } else {
            map.remove_npc(self.id()).await;
        }
    }

    /// Whether this actor comes back after dying, given the current world state
    pub fn should_respawn(&self, events: &dyn EventStateProvider) -> bool {
        if self.is_summoned() {
            return false;
        }

        let area = self.spawn_area();
        match area.trigger {
            SpawnTrigger::Automatic => true,
            SpawnTrigger::AutomaticDuringEvent => events.is_event_running(area.map_id),
            SpawnTrigger::AutomaticDuringWave => events.is_wave_running(area.map_id, area.wave),
            SpawnTrigger::Wandering | SpawnTrigger::Manual => false,
        }
    }

    fn schedule_respawn(&self, map: Arc<GameMap>) {
        let Some(npc) = self.weak_self.upgrade() else {
            return;
        };
        let delay = Duration::from_millis(self.definition().respawn_delay_ms);
        debug!("{} {} respawns in {:?}", self.name(), self.id(), delay);

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Past this point the respawn is no longer cancellable
            npc.respawn_task.lock().take();

            if let Err(e) = map.respawn_npc(&npc).await {
                if e.is_cancellation() {
                    debug!("Respawn of {} skipped: {}", npc.id(), e);
                } else {
                    warn!("Respawn of {} failed: {}", npc.id(), e);
                }
            }
        });
        *self.respawn_task.lock() = Some(handle);
    }

    /// Whether a respawn is pending
    pub fn is_respawn_pending(&self) -> bool {
        self.respawn_task.lock().as_ref().map_or(false, |task| !task.is_finished())
    }

    /// Kicked soccer balls roll away from the kicker as far as the terrain allows
    async fn push_away_from(&self, from: Point) -> Result<()> {
        let map = self.map()?;
        let mut direction = Direction::between(from, self.position());
        if direction == Direction::Undefined {
            direction = Direction::random();
        }

        let mut destination = self.position();
        for _ in 0..map.config().soccer_ball_push_distance {
            match destination.step(direction) {
                Some(next) if map.terrain().is_walkable(next) => destination = next,
                _ => break,
            }
        }

        if destination != self.position() {
            self.place(destination, direction, false).await;
        }
        Ok(())
    }
}

#[async_trait]
impl Attackable for NonPlayerCharacter {
    fn id(&self) -> ObjectId {
        NonPlayerCharacter::id(self)
    }

    fn name(&self) -> String {
        NonPlayerCharacter::name(self).to_string()
    }

    fn position(&self) -> Point {
        NonPlayerCharacter::position(self)
    }

    fn health(&self) -> u32 {
        self.health.current()
    }

    fn is_alive(&self) -> bool {
        NonPlayerCharacter::is_alive(self)
    }

    fn is_active(&self) -> bool {
        NonPlayerCharacter::is_alive(self) && !self.is_disposed()
    }

    fn status(&self) -> StatusFlags {
        self.effects.status()
    }

    fn target_kind(&self) -> TargetKind {
        TargetKind::Npc {
            kind: self.kind(),
            summoned: self.is_summoned(),
        }
    }

    fn defense(&self) -> u32 {
        self.definition().defense
    }

    async fn attack_by(&self, attacker: Arc<dyn Attacker>, skill: Option<&SkillDefinition>) -> Result<Option<HitReport>> {
        self.ensure_attackable()?;
        if self.kind() == ObjectKind::SoccerBall {
            self.push_away_from(attacker.position()).await?;
            return Ok(None);
        }
        if !NonPlayerCharacter::is_alive(self) {
            return Ok(None);
        }

        if self.effects.clear_status(StatusFlags::ASLEEP) > 0 {
            debug!("{} {} woke up", NonPlayerCharacter::name(self), self.id());
        }

        let map = self.map()?;
        let outcome = map.services().damage.calculate_damage(attacker.as_ref(), self, skill, false, 1.0);
        let skill_number = skill.map(|s| s.number).unwrap_or(0);
        Ok(self.apply_hit(outcome, Some(attacker), skill_number).await)
    }
}
