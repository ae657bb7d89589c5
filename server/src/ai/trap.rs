//! Trigger policies of traps.
//!
//! Traps never hold on to a target and never retaliate; each tick they look
//! at who is standing where right now.

use std::sync::Arc;

use async_trait::async_trait;
use npc_shared::Direction;

use crate::ai::{observed_targets, TargetingStrategy, TickContext};
use crate::combat::Attackable;
use crate::entities::NonPlayerCharacter;

/// Fires at whoever stands on the trap's tile
#[derive(Debug, Default)]
pub struct PressureTrigger;

#[async_trait]
impl TargetingStrategy for PressureTrigger {
    async fn candidates(&self, cx: &TickContext<'_>) -> Vec<Arc<dyn Attackable>> {
        let position = cx.npc.position();
        let mut targets = observed_targets(cx).await;
        targets.retain(|target| target.position() == position);
        targets
    }

    fn keeps_target(&self) -> bool {
        false
    }

    fn retaliates_against(&self, _npc: &NonPlayerCharacter, _attacker: &Arc<dyn Attackable>) -> bool {
        false
    }
}

/// Fires at everyone in range in the direction the trap faces
#[derive(Debug, Default)]
pub struct DirectionalAreaTrigger;

#[async_trait]
impl TargetingStrategy for DirectionalAreaTrigger {
    async fn candidates(&self, cx: &TickContext<'_>) -> Vec<Arc<dyn Attackable>> {
        let position = cx.npc.position();
        let rotation = cx.npc.rotation();
        let range = cx.npc.definition().attack_range;
        if rotation == Direction::Undefined {
            return Vec::new();
        }

        let mut targets = observed_targets(cx).await;
        targets.retain(|target| {
            let at = target.position();
            position.is_in_range(at, range) && Direction::between(position, at) == rotation
        });
        targets
    }

    fn keeps_target(&self) -> bool {
        false
    }

    fn volley(
        &self,
        _cx: &TickContext<'_>,
        _target: &Arc<dyn Attackable>,
        candidates: &[Arc<dyn Attackable>],
    ) -> Vec<Arc<dyn Attackable>> {
        candidates.to_vec()
    }

    fn retaliates_against(&self, _npc: &NonPlayerCharacter, _attacker: &Arc<dyn Attackable>) -> bool {
        false
    }
}
