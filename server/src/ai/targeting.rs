//! Target selection strategies.

use std::sync::Arc;

use async_trait::async_trait;

use crate::ai::TickContext;
use crate::combat::{Attackable, TargetKind};
use crate::entities::NonPlayerCharacter;
use crate::observers::WorldObserver;

/// Decides whom an intelligence may attack
#[async_trait]
pub trait TargetingStrategy: Send + Sync {
    /// Every target that may be selected this tick
    async fn candidates(&self, cx: &TickContext<'_>) -> Vec<Arc<dyn Attackable>>;

    /// Pick one of the candidates. Defaults to the nearest; the first one
    /// wins ties.
    fn select(&self, cx: &TickContext<'_>, candidates: &[Arc<dyn Attackable>]) -> Option<Arc<dyn Attackable>> {
        let position = cx.npc.position();
        candidates
            .iter()
            .min_by(|a, b| {
                position
                    .distance_to(a.position())
                    .total_cmp(&position.distance_to(b.position()))
            })
            .cloned()
    }

    /// Whether a still valid target is kept between ticks
    fn keeps_target(&self) -> bool {
        true
    }

    /// Everyone hit by one attack on `target`
    fn volley(
        &self,
        _cx: &TickContext<'_>,
        target: &Arc<dyn Attackable>,
        _candidates: &[Arc<dyn Attackable>],
    ) -> Vec<Arc<dyn Attackable>> {
        vec![target.clone()]
    }

    /// Whether receiving a hit from `attacker` makes it the target
    fn retaliates_against(&self, _npc: &NonPlayerCharacter, _attacker: &Arc<dyn Attackable>) -> bool {
        true
    }
}

/// Eligible targets among the observers of the ticking actor and their
/// summons, within its view range
pub async fn observed_targets(cx: &TickContext<'_>) -> Vec<Arc<dyn Attackable>> {
    let position = cx.npc.position();
    let view_range = cx.npc.definition().view_range;

    let mut targets = Vec::new();
    for observer in cx.npc.observers().snapshot().await {
        let summon = observer.summon();
        if let Some(target) = WorldObserver::as_target(observer) {
            targets.push(target);
        }
        if let Some(summon) = summon {
            targets.push(summon);
        }
    }

    targets.retain(|target| {
        target.id() != cx.npc.id() && cx.is_eligible(target) && position.is_in_range(target.position(), view_range)
    });
    targets
}

/// Attacks the nearest observer
#[derive(Debug, Default)]
pub struct NearestTarget;

#[async_trait]
impl TargetingStrategy for NearestTarget {
    async fn candidates(&self, cx: &TickContext<'_>) -> Vec<Arc<dyn Attackable>> {
        observed_targets(cx).await
    }
}

/// Guards only hunt player killers
#[derive(Debug)]
pub struct GuardTargeting {
    /// Players whose player-kill level is above this are targeted
    pub threshold: u8,
}

#[async_trait]
impl TargetingStrategy for GuardTargeting {
    async fn candidates(&self, cx: &TickContext<'_>) -> Vec<Arc<dyn Attackable>> {
        let mut targets = observed_targets(cx).await;
        targets.retain(|target| {
            matches!(target.target_kind(), TargetKind::Player { player_kill_level } if player_kill_level > self.threshold)
        });
        targets
    }
}

/// Summons fight wild monsters around their owner, never players
#[derive(Debug, Default)]
pub struct SummonTargeting;

#[async_trait]
impl TargetingStrategy for SummonTargeting {
    async fn candidates(&self, cx: &TickContext<'_>) -> Vec<Arc<dyn Attackable>> {
        let Some(owner) = cx.npc.summoned_by() else {
            return Vec::new();
        };
        let view_range = cx.npc.definition().view_range;

        cx.map
            .npcs_near(owner.position(), view_range)
            .into_iter()
            .filter(|npc| npc.id() != cx.npc.id())
            .map(|npc| npc as Arc<dyn Attackable>)
            .filter(|target| target.target_kind().is_wild_monster() && cx.is_eligible(target))
            .collect()
    }

    fn retaliates_against(&self, npc: &NonPlayerCharacter, attacker: &Arc<dyn Attackable>) -> bool {
        let owner_id = npc.summoned_by().map(|owner| owner.id());
        attacker.target_kind().is_wild_monster() && Some(attacker.id()) != owner_id
    }
}
