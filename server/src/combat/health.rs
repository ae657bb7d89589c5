//! Lock-free health counter.

use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};

/// Result of applying damage to a living health counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageApplied {
    pub remaining: u32,
    /// True for exactly one caller per life: the one whose damage took the
    /// counter from positive to zero or below
    pub lethal: bool,
}

/// Signed health counter updated with compare-and-swap.
///
/// Once the counter reaches zero it stays there until [`Health::reset`]
/// starts a new life; further damage or healing has no effect.
#[derive(Debug)]
pub struct Health {
    current: AtomicI64,
    maximum: AtomicU32,
}

impl Health {
    pub fn new(maximum: u32) -> Self {
        Self {
            current: AtomicI64::new(maximum as i64),
            maximum: AtomicU32::new(maximum),
        }
    }

    /// Start a new life at full health
    pub fn reset(&self, maximum: u32) {
        self.maximum.store(maximum, Ordering::Release);
        self.current.store(maximum as i64, Ordering::Release);
    }

    /// Current health, clamped at zero
    pub fn current(&self) -> u32 {
        self.current.load(Ordering::Acquire).clamp(0, u32::MAX as i64) as u32
    }

    pub fn maximum(&self) -> u32 {
        self.maximum.load(Ordering::Acquire)
    }

    pub fn is_depleted(&self) -> bool {
        self.current.load(Ordering::Acquire) <= 0
    }

    /// Subtract `amount`. Returns `None` if the counter was already depleted.
    pub fn apply_damage(&self, amount: u32) -> Option<DamageApplied> {
        let previous = self
            .current
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current > 0).then(|| current - amount as i64)
            })
            .ok()?;

        let now = previous - amount as i64;
        Some(DamageApplied {
            remaining: now.max(0) as u32,
            lethal: now <= 0,
        })
    }
}
