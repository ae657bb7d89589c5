//! Combat results shared between the combat core and its observers.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Tags attached to a hit.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct DamageFlags: u16 {
        const MISSED         = 1 << 0;
        const CRITICAL       = 1 << 1;
        const EXCELLENT      = 1 << 2;
        const DOUBLE         = 1 << 3;
        const IGNORE_DEFENSE = 1 << 4;
        const COMBO          = 1 << 5;
        /// Damage reflected back to an attacker
        const REFLECTED      = 1 << 6;
        /// Damage dealt by a poison effect
        const POISON         = 1 << 7;
    }
}

/// Computed result of one damage-dealing interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HitOutcome {
    pub health_damage: u32,
    pub shield_damage: u32,
    pub flags: DamageFlags,
}

impl HitOutcome {
    pub fn new(health_damage: u32, shield_damage: u32, flags: DamageFlags) -> Self {
        Self { health_damage, shield_damage, flags }
    }

    /// A hit that did no damage at all
    pub fn miss() -> Self {
        Self { health_damage: 0, shield_damage: 0, flags: DamageFlags::MISSED }
    }

    /// Damage without an attacker, e.g. poison ticks or reflection
    pub fn tagged(health_damage: u32, flags: DamageFlags) -> Self {
        Self { health_damage, shield_damage: 0, flags }
    }

    pub fn total_damage(&self) -> u32 {
        self.health_damage.saturating_add(self.shield_damage)
    }

    pub fn has_damage(&self) -> bool {
        self.total_damage() > 0
    }
}

/// Snapshot taken at the moment an actor received lethal damage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeathInformation {
    /// Id of the killer; 0 when the damage had no attacker
    pub killer_id: u16,
    pub killer_name: String,
    pub outcome: HitOutcome,
    /// Skill that caused the death; 0 if none
    pub skill_number: u16,
}

/// An item dropped into the world
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDrop {
    pub item_id: u32,
    pub quantity: u32,
}
