//! Shared fixtures for the scenario tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use npc_shared::{
    ActorDefinition, DamageFlags, Direction, HitOutcome, IntelligenceKind, LootEntry, ObjectKind, Point,
    SkillDefinition, SpawnArea, SpawnTrigger,
};

use npc_server::combat::{Attackable, Attacker, DamageCalculator};
use npc_server::config::CoreConfig;
use npc_server::entities::{NonPlayerCharacter, Player, PlayerStats};
use npc_server::world::{DropTableLoot, GameMap, GridTerrain, KillListener, WorldEventState, WorldServices};

/// Deals exactly the attacker's maximum damage, ignoring defense
pub struct FixedDamage;

impl DamageCalculator for FixedDamage {
    fn calculate_damage(
        &self,
        attacker: &dyn Attacker,
        _target: &dyn Attackable,
        _skill: Option<&SkillDefinition>,
        _is_combo: bool,
        _factor: f32,
    ) -> HitOutcome {
        let (_, max) = attacker.damage_range();
        if max == 0 {
            HitOutcome::miss()
        } else {
            HitOutcome::new(max, 0, DamageFlags::empty())
        }
    }
}

#[derive(Default)]
pub struct CountingKills {
    pub kills: AtomicU32,
}

impl KillListener for CountingKills {
    fn on_killed(&self, _victim: &NonPlayerCharacter, _killer: &Arc<Player>) {
        self.kills.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn test_config() -> CoreConfig {
    CoreConfig {
        max_tick_offset_ms: 0,
        loot_drop_delay_ms: 50,
        random_walk_chance: 0.0,
        gate_lifetime_secs: 30,
        gate_max_uses: 2,
        drop_lifetime_secs: 5,
        ..CoreConfig::default()
    }
}

pub struct TestWorld {
    pub map: Arc<GameMap>,
    pub events: Arc<WorldEventState>,
}

pub fn test_world(terrain: GridTerrain) -> TestWorld {
    let events = Arc::new(WorldEventState::new());
    let services = WorldServices::new(test_config())
        .with_damage(Arc::new(FixedDamage))
        .with_loot(Arc::new(DropTableLoot { money_chance: 0.0 }))
        .with_events(events.clone());
    TestWorld {
        map: GameMap::new(0, terrain, services),
        events,
    }
}

pub fn open_world() -> TestWorld {
    test_world(GridTerrain::open(32, 32))
}

/// Definition with fixed damage and short delays
pub fn definition(number: u16, kind: ObjectKind, max_health: u32, damage: u32, attack_range: u8) -> Arc<ActorDefinition> {
    Arc::new(ActorDefinition {
        number,
        designation: format!("{:?} {}", kind, number),
        kind,
        level: 5,
        max_health,
        min_damage: damage,
        max_damage: damage,
        defense: 0,
        attack_range,
        view_range: 5,
        move_range: 2,
        move_delay_ms: 100,
        attack_delay_ms: 100,
        respawn_delay_ms: 1000,
        drop_count: 1,
        loot_table: vec![LootEntry {
            item_id: 42,
            drop_chance: 1.0,
            min_quantity: 1,
            max_quantity: 1,
        }],
        attack_skill: None,
        intelligence: None,
    })
}

pub fn trap_definition(number: u16, intelligence: IntelligenceKind, damage: u32, attack_range: u8) -> Arc<ActorDefinition> {
    let mut definition = (*definition(number, ObjectKind::Trap, 1, damage, attack_range)).clone();
    definition.intelligence = Some(intelligence);
    Arc::new(definition)
}

/// Spawn area covering exactly `at`
pub fn point_area(id: u32, definition: &ActorDefinition, at: Point, direction: Direction, trigger: SpawnTrigger) -> Arc<SpawnArea> {
    let mut area = SpawnArea::point(id, 0, definition.number, at, direction);
    area.trigger = trigger;
    Arc::new(area)
}

/// Spawn an actor at a fixed tile and stop its schedule so ticks can be
/// driven by hand
pub async fn spawn_still(
    map: &Arc<GameMap>,
    definition: Arc<ActorDefinition>,
    at: Point,
    direction: Direction,
) -> Arc<NonPlayerCharacter> {
    let area = point_area(at.x as u32 * 1000 + at.y as u32, &definition, at, direction, SpawnTrigger::Manual);
    let npc = map.spawn_npc(definition, area).await.unwrap();
    if let Some(intelligence) = npc.intelligence() {
        intelligence.pause();
    }
    npc
}

pub async fn join_player(map: &Arc<GameMap>, id: u16, at: Point) -> Arc<Player> {
    let player = Player::new(id, &format!("Player{}", id), at, 100);
    map.add_player(player.clone()).await;
    player
}

pub fn hitting_for(player: &Player, damage: u32) {
    player.set_stats(PlayerStats {
        min_damage: damage,
        max_damage: damage,
        defense: 0,
    });
}
