//! Movement policies: when an actor may act, and where it walks.

use std::sync::Arc;

use async_trait::async_trait;
use npc_shared::Point;
use rand::Rng;

use crate::ai::TickContext;
use crate::combat::Attackable;
use crate::error::Result;
use crate::observers::WorldObserver;

/// Attempts to find a destination before giving up for this tick
const DESTINATION_ATTEMPTS: usize = 5;

#[async_trait]
pub trait MovementPolicy: Send + Sync {
    /// Checked before searching for targets. Returning `false` skips the rest
    /// of the tick.
    async fn can_act(&self, _cx: &TickContext<'_>) -> Result<bool> {
        Ok(true)
    }

    /// Nothing to attack. Returns whether the actor started moving.
    async fn on_no_target(&self, cx: &TickContext<'_>) -> Result<bool> {
        self.wander(cx).await
    }

    /// Walk close enough to attack `target`. Returns whether the actor started
    /// moving.
    async fn approach(&self, cx: &TickContext<'_>, target: &Arc<dyn Attackable>) -> Result<bool>;

    /// Walk around a bit. Returns whether the actor started moving.
    async fn wander(&self, cx: &TickContext<'_>) -> Result<bool>;

    /// A target exists but could not be attacked or approached. Walks a short
    /// random distance so the actor does not freeze in front of it.
    async fn fallback_walk(&self, _cx: &TickContext<'_>) -> Result<bool> {
        Ok(false)
    }
}

/// Random walkable tile within `radius` of `center` that the actor may stand on
fn destination_near(cx: &TickContext<'_>, center: Point, radius: u8) -> Option<Point> {
    let avoids_safe_zone = cx.npc.kind().avoids_safe_zone();
    (0..DESTINATION_ATTEMPTS)
        .filter_map(|_| cx.terrain().random_coordinate_near(center, radius))
        .find(|point| *point != cx.npc.position() && !(avoids_safe_zone && cx.terrain().is_safe_zone(*point)))
}

fn roll(chance: f64) -> bool {
    rand::thread_rng().gen_bool(chance.clamp(0.0, 1.0))
}

/// Walks towards targets and occasionally around while someone who could be
/// attacked is watching
#[derive(Debug, Default)]
pub struct Roaming;

#[async_trait]
impl MovementPolicy for Roaming {
    async fn approach(&self, cx: &TickContext<'_>, target: &Arc<dyn Attackable>) -> Result<bool> {
        if !cx.npc.kind().can_walk() {
            return Ok(false);
        }
        match destination_near(cx, target.position(), cx.npc.definition().attack_range) {
            Some(destination) => cx.npc.walk_to(destination),
            None => Ok(false),
        }
    }

    async fn wander(&self, cx: &TickContext<'_>) -> Result<bool> {
        if !cx.npc.kind().can_walk() {
            return Ok(false);
        }

        let watched = cx
            .npc
            .observers()
            .snapshot()
            .await
            .into_iter()
            .any(|observer| WorldObserver::as_target(observer).is_some());
        if !watched || !roll(cx.config().random_walk_chance) {
            return Ok(false);
        }
        self.fallback_walk(cx).await
    }

    async fn fallback_walk(&self, cx: &TickContext<'_>) -> Result<bool> {
        if !cx.npc.kind().can_walk() {
            return Ok(false);
        }
        match destination_near(cx, cx.npc.position(), cx.npc.definition().move_range) {
            Some(destination) => cx.npc.walk_to(destination),
            None => Ok(false),
        }
    }
}

/// Summons stay close to their owner and only fight from there
#[derive(Debug, Default)]
pub struct FollowOwner;

#[async_trait]
impl MovementPolicy for FollowOwner {
    async fn can_act(&self, cx: &TickContext<'_>) -> Result<bool> {
        let Some(owner) = cx.npc.summoned_by() else {
            return Ok(false);
        };
        let owner_position = owner.position();
        if cx.npc.position().is_in_range(owner_position, cx.config().summon_follow_distance) {
            return Ok(true);
        }

        if cx.npc.kind().can_walk() {
            if let Some(destination) = destination_near(cx, owner_position, 1) {
                cx.npc.walk_to(destination)?;
            }
        }
        Ok(false)
    }

    async fn on_no_target(&self, _cx: &TickContext<'_>) -> Result<bool> {
        Ok(false)
    }

    async fn approach(&self, cx: &TickContext<'_>, target: &Arc<dyn Attackable>) -> Result<bool> {
        Roaming.approach(cx, target).await
    }

    async fn wander(&self, _cx: &TickContext<'_>) -> Result<bool> {
        Ok(false)
    }
}

/// Never moves
#[derive(Debug, Default)]
pub struct Stationary;

#[async_trait]
impl MovementPolicy for Stationary {
    async fn on_no_target(&self, _cx: &TickContext<'_>) -> Result<bool> {
        Ok(false)
    }

    async fn approach(&self, _cx: &TickContext<'_>, _target: &Arc<dyn Attackable>) -> Result<bool> {
        Ok(false)
    }

    async fn wander(&self, _cx: &TickContext<'_>) -> Result<bool> {
        Ok(false)
    }
}
