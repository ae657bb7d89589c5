//! Combat resolution contracts.
//!
//! Any attacker can hit any [`Attackable`]. The number crunching is delegated
//! to a [`DamageCalculator`]; the attackable applies the outcome to its health
//! and handles death.

mod health;

pub use health::{DamageApplied, Health};

use std::sync::Arc;

use async_trait::async_trait;
use npc_shared::{DamageFlags, HitOutcome, ObjectKind, Point, SkillDefinition};
use rand::Rng;

use crate::entities::{Player, StatusFlags};
use crate::error::{ObjectId, Result};

/// What an attack target is, as far as target selection cares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Player { player_kill_level: u8 },
    Npc { kind: ObjectKind, summoned: bool },
}

impl TargetKind {
    pub fn is_player(&self) -> bool {
        matches!(self, TargetKind::Player { .. })
    }

    /// Monsters that are not owned by a player
    pub fn is_wild_monster(&self) -> bool {
        matches!(self, TargetKind::Npc { kind: ObjectKind::Monster, summoned: false })
    }
}

/// What a single attack did to its target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitReport {
    pub outcome: HitOutcome,
    /// Whether this hit killed the target. Only one hit per life reports true.
    pub lethal: bool,
}

/// Something that can receive attacks
#[async_trait]
pub trait Attackable: Send + Sync {
    fn id(&self) -> ObjectId;
    fn name(&self) -> String;
    fn position(&self) -> Point;

    /// Current health, never below zero
    fn health(&self) -> u32;
    fn is_alive(&self) -> bool;

    /// Alive and currently part of the world
    fn is_active(&self) -> bool {
        self.is_alive()
    }

    fn status(&self) -> StatusFlags;
    fn target_kind(&self) -> TargetKind;
    fn defense(&self) -> u32;

    /// Resolve an attack against this target.
    ///
    /// Returns `Ok(None)` when the target is already dead.
    async fn attack_by(&self, attacker: Arc<dyn Attacker>, skill: Option<&SkillDefinition>) -> Result<Option<HitReport>>;
}

/// Something that attacks
pub trait Attacker: Send + Sync {
    fn id(&self) -> ObjectId;
    fn name(&self) -> String;
    fn position(&self) -> Point;

    /// Minimum and maximum base damage
    fn damage_range(&self) -> (u32, u32);

    /// Called after the attacker hit something, e.g. to consume ammunition
    fn after_hit_target(&self, _outcome: &HitOutcome) {}

    /// The player credited for kills made by this attacker
    fn credited_player(&self) -> Option<Arc<Player>>;

    /// The attacker as a target, for retaliation
    fn as_target(self: Arc<Self>) -> Option<Arc<dyn Attackable>>;
}

/// Computes the outcome of a hit. The formulas belong to the attribute system.
pub trait DamageCalculator: Send + Sync {
    fn calculate_damage(
        &self,
        attacker: &dyn Attacker,
        target: &dyn Attackable,
        skill: Option<&SkillDefinition>,
        is_combo: bool,
        factor: f32,
    ) -> HitOutcome;
}

/// Default calculator: rolls base damage, adds skill damage, applies critical
/// hits and subtracts the target's defense.
#[derive(Debug, Clone)]
pub struct AttributeDamageCalculator {
    pub critical_chance: f64,
    pub miss_chance: f64,
}

impl Default for AttributeDamageCalculator {
    fn default() -> Self {
        Self {
            critical_chance: 0.05,
            miss_chance: 0.05,
        }
    }
}

impl DamageCalculator for AttributeDamageCalculator {
    fn calculate_damage(
        &self,
        attacker: &dyn Attacker,
        target: &dyn Attackable,
        skill: Option<&SkillDefinition>,
        is_combo: bool,
        factor: f32,
    ) -> HitOutcome {
        let (min, max) = attacker.damage_range();
        let mut rng = rand::thread_rng();

        if rng.gen_bool(self.miss_chance) {
            return HitOutcome::miss();
        }

        let mut flags = DamageFlags::empty();
        let mut base = if rng.gen_bool(self.critical_chance) {
            flags |= DamageFlags::CRITICAL;
            max
        } else {
            rng.gen_range(min.min(max)..=max)
        };
        base += skill.map(|s| s.damage).unwrap_or(0);
        if is_combo {
            flags |= DamageFlags::COMBO;
            base += base / 2;
        }

        let scaled = (base as f32 * factor).round() as u32;
        let damage = scaled.saturating_sub(target.defense()).max(1);
        HitOutcome::new(damage, 0, flags)
    }
}
