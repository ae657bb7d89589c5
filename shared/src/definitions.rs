//! Static actor definitions.
//!
//! Definitions are loaded once at world start and shared read-only between all
//! instances spawned from them. Nothing here is mutated at runtime.

use serde::{Deserialize, Serialize};

/// What kind of object a definition describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    /// Hostile creature that walks, searches and attacks
    Monster,
    /// Town guard; hunts player killers and cannot be attacked
    Guard,
    /// Stationary trap that fires on whoever triggers it
    Trap,
    /// Object with health that can be destroyed but never acts
    Destructible,
    /// Ball that is pushed around instead of damaged
    SoccerBall,
    /// Passive non-player character such as a merchant
    PassiveNpc,
}

impl ObjectKind {
    /// Whether actors of this kind move around on their own
    pub fn can_walk(&self) -> bool {
        matches!(self, ObjectKind::Monster | ObjectKind::Guard)
    }

    /// Whether actors of this kind may not be placed in a safe zone
    pub fn avoids_safe_zone(&self) -> bool {
        matches!(self, ObjectKind::Monster | ObjectKind::Trap)
    }
}

/// Decision loop variant bound to an actor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntelligenceKind {
    BasicMonster,
    Guard,
    /// Trap that fires when someone stands on it
    TrapPressure,
    /// Trap that fires at everyone in front of it
    TrapDirectionalArea,
}

/// Skill used by an actor when attacking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillDefinition {
    pub number: u16,
    pub name: String,
    /// Range in tiles
    pub range: u8,
    /// Flat damage added on top of the attacker's base damage
    #[serde(default)]
    pub damage: u32,
    /// Whether the skill hits every target in range instead of one
    #[serde(default)]
    pub area: bool,
}

/// Loot table entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LootEntry {
    pub item_id: u32,
    pub drop_chance: f32, // 0.0 - 1.0
    pub min_quantity: u32,
    pub max_quantity: u32,
}

/// Static stats of a monster, trap, guard or other non-player character
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorDefinition {
    pub number: u16,
    pub designation: String,
    pub kind: ObjectKind,
    #[serde(default = "default_level")]
    pub level: u16,
    pub max_health: u32,
    #[serde(default)]
    pub min_damage: u32,
    #[serde(default)]
    pub max_damage: u32,
    #[serde(default)]
    pub defense: u32,
    /// Range in tiles at which a target can be hit
    pub attack_range: u8,
    /// Range in tiles at which a target is noticed
    pub view_range: u8,
    /// Radius of random walks around the current position
    #[serde(default)]
    pub move_range: u8,
    /// Delay between two steps while walking
    #[serde(default = "default_move_delay")]
    pub move_delay_ms: u64,
    /// Delay between two decision ticks, and therefore between two attacks
    #[serde(default = "default_attack_delay")]
    pub attack_delay_ms: u64,
    #[serde(default = "default_respawn_delay")]
    pub respawn_delay_ms: u64,
    /// Maximum number of items dropped on death
    #[serde(default)]
    pub drop_count: u8,
    #[serde(default)]
    pub loot_table: Vec<LootEntry>,
    #[serde(default)]
    pub attack_skill: Option<SkillDefinition>,
    /// Overrides the intelligence implied by `kind`
    #[serde(default)]
    pub intelligence: Option<IntelligenceKind>,
}

fn default_level() -> u16 {
    1
}

fn default_move_delay() -> u64 {
    400
}

fn default_attack_delay() -> u64 {
    1500
}

fn default_respawn_delay() -> u64 {
    10_000
}

impl ActorDefinition {
    /// The intelligence an actor of this definition runs, if any
    pub fn intelligence_kind(&self) -> Option<IntelligenceKind> {
        if self.intelligence.is_some() {
            return self.intelligence;
        }

        match self.kind {
            ObjectKind::Monster => Some(IntelligenceKind::BasicMonster),
            ObjectKind::Guard => Some(IntelligenceKind::Guard),
            ObjectKind::Trap => Some(IntelligenceKind::TrapPressure),
            ObjectKind::Destructible | ObjectKind::SoccerBall | ObjectKind::PassiveNpc => None,
        }
    }
}
