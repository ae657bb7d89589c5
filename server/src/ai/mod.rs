//! Actor intelligence: the decision loop and its strategies.

mod intelligence;
mod movement;
pub mod scheduler;
mod targeting;
mod trap;

pub use intelligence::{Intelligence, IntelligenceState};
pub use movement::{FollowOwner, MovementPolicy, Roaming, Stationary};
pub use scheduler::{tick_key, TickKey, TickScheduler};
pub use targeting::{observed_targets, GuardTargeting, NearestTarget, SummonTargeting, TargetingStrategy};
pub use trap::{DirectionalAreaTrigger, PressureTrigger};

use std::sync::Arc;

use npc_shared::{ActorDefinition, IntelligenceKind};

use crate::combat::Attackable;
use crate::config::CoreConfig;
use crate::entities::NonPlayerCharacter;
use crate::world::{GameMap, Terrain};

/// What a strategy gets to look at during a tick
pub struct TickContext<'a> {
    pub npc: &'a Arc<NonPlayerCharacter>,
    pub map: &'a Arc<GameMap>,
}

impl<'a> TickContext<'a> {
    pub fn config(&self) -> &CoreConfig {
        self.map.config()
    }

    pub fn terrain(&self) -> &dyn Terrain {
        self.map.terrain()
    }

    /// Whether `target` may be picked at all: active, targetable and not in a
    /// safe zone
    pub fn is_eligible(&self, target: &Arc<dyn Attackable>) -> bool {
        target.is_active()
            && !target.status().prevents_targeting()
            && !self.terrain().is_safe_zone(target.position())
    }

    /// Whether a previously selected target is still worth pursuing
    pub fn is_valid_target(&self, target: &Arc<dyn Attackable>, candidates: &[Arc<dyn Attackable>]) -> bool {
        let id = target.id();
        self.is_eligible(target)
            && self.npc.position().is_in_range(target.position(), self.npc.definition().view_range)
            && candidates.iter().any(|c| c.id() == id)
    }
}

/// Build the intelligence an actor of `definition` runs, if any.
///
/// Summons always follow their owner, whatever their definition says.
pub fn create_intelligence(
    definition: &ActorDefinition,
    summoned: bool,
    scheduler: &Arc<TickScheduler>,
    config: &CoreConfig,
) -> Option<Arc<Intelligence>> {
    let (targeting, movement): (Box<dyn TargetingStrategy>, Box<dyn MovementPolicy>) = if summoned {
        (Box::new(SummonTargeting), Box::new(FollowOwner))
    } else {
        match definition.intelligence_kind()? {
            IntelligenceKind::BasicMonster => (Box::new(NearestTarget), Box::new(Roaming)),
            IntelligenceKind::Guard => (
                Box::new(GuardTargeting {
                    threshold: config.guard_player_kill_threshold,
                }),
                Box::new(Roaming),
            ),
            IntelligenceKind::TrapPressure => (Box::new(PressureTrigger), Box::new(Stationary)),
            IntelligenceKind::TrapDirectionalArea => (Box::new(DirectionalAreaTrigger), Box::new(Stationary)),
        }
    };

    Some(Intelligence::new(targeting, movement, scheduler.clone(), config.max_tick_offset_ms))
}
