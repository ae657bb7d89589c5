//! Timed status effects (stun, sleep, invisibility, ...).

use std::time::Duration;

use bitflags::bitflags;
use parking_lot::Mutex;
use tokio::time::Instant;

bitflags! {
    /// Statuses produced by active effects
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct StatusFlags: u8 {
        const STUNNED     = 1 << 0;
        const ASLEEP      = 1 << 1;
        const INVISIBLE   = 1 << 2;
        const TELEPORTING = 1 << 3;
        const POISONED    = 1 << 4;
    }
}

impl StatusFlags {
    /// Statuses that keep an actor from doing anything on its own
    pub fn prevents_action(&self) -> bool {
        self.intersects(StatusFlags::STUNNED | StatusFlags::ASLEEP)
    }

    /// Statuses that make an entity impossible to target
    pub fn prevents_targeting(&self) -> bool {
        self.intersects(StatusFlags::INVISIBLE | StatusFlags::TELEPORTING)
    }
}

/// An effect currently applied to an entity
#[derive(Debug, Clone)]
pub struct ActiveEffect {
    pub name: String,
    pub status: StatusFlags,
    /// `None` for effects that last until removed
    pub expires_at: Option<Instant>,
}

impl ActiveEffect {
    pub fn timed(name: &str, status: StatusFlags, duration: Duration) -> Self {
        Self {
            name: name.to_string(),
            status,
            expires_at: Some(Instant::now() + duration),
        }
    }

    pub fn permanent(name: &str, status: StatusFlags) -> Self {
        Self {
            name: name.to_string(),
            status,
            expires_at: None,
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map_or(false, |at| at <= now)
    }
}

/// Effects of one entity. Expired effects are pruned whenever the list is read.
#[derive(Debug, Default)]
pub struct EffectList {
    effects: Mutex<Vec<ActiveEffect>>,
}

impl EffectList {
    pub fn add(&self, effect: ActiveEffect) {
        self.effects.lock().push(effect);
    }

    /// Combined status of all active effects
    pub fn status(&self) -> StatusFlags {
        let now = Instant::now();
        let mut effects = self.effects.lock();
        effects.retain(|e| !e.is_expired(now));
        effects.iter().fold(StatusFlags::empty(), |acc, e| acc | e.status)
    }

    /// Remove every effect producing any of `status`. Returns how many were removed.
    pub fn clear_status(&self, status: StatusFlags) -> usize {
        let mut effects = self.effects.lock();
        let before = effects.len();
        effects.retain(|e| !e.status.intersects(status));
        before - effects.len()
    }

    pub fn clear(&self) {
        self.effects.lock().clear();
    }

    pub fn active(&self) -> Vec<ActiveEffect> {
        let now = Instant::now();
        let mut effects = self.effects.lock();
        effects.retain(|e| !e.is_expired(now));
        effects.clone()
    }
}
