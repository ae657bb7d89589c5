//! Headless actor simulation.
//!
//! Loads configuration, world data and terrain (falling back to built-in
//! defaults), populates one map and lets a few simulated players roam and
//! fight until the configured demo duration has passed.
//!
//! Usage: `npc-server [config.json] [world.json] [terrain.json]`

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info};
use npc_shared::{Direction, ObjectKind, Point};
use rand::Rng;

use npc_server::combat::{Attackable, Attacker};
use npc_server::config::CoreConfig;
use npc_server::entities::{NonPlayerCharacter, Player};
use npc_server::world::{GameMap, GridTerrain, KillListener, SpawnTable, WorldData, WorldEventState, WorldServices};

/// Map simulated by the demo
const MAP_ID: u16 = 0;

/// Delay between two actions of a simulated player
const PLAYER_ACTION_INTERVAL: Duration = Duration::from_millis(700);

/// Counts kills per map for the summary
#[derive(Default)]
struct KillCounter {
    kills: AtomicU64,
}

impl KillListener for KillCounter {
    fn on_killed(&self, victim: &NonPlayerCharacter, killer: &Arc<Player>) {
        let total = self.kills.fetch_add(1, Ordering::Relaxed) + 1;
        debug!("Kill #{}: {} {} by {}", total, victim.name(), victim.id(), killer.name());
    }
}

fn load_config(path: &str) -> CoreConfig {
    match CoreConfig::load_or_default(path) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            error!("Using default configuration");
            CoreConfig::default()
        }
    }
}

fn load_world(path: &str) -> WorldData {
    if !Path::new(path).exists() {
        info!("No world data at {:?}, using built-in world", path);
        return WorldData::built_in();
    }
    match WorldData::load(path) {
        Ok(data) => data,
        Err(e) => {
            error!("Failed to load world data: {}", e);
            error!("Using built-in world");
            WorldData::built_in()
        }
    }
}

/// 64x64 field with a safe town square in the corner and a wall
fn built_in_terrain() -> GridTerrain {
    let rows: Vec<String> = (0..64u8)
        .map(|y| {
            (0..64u8)
                .map(|x| match (x, y) {
                    (0..=4, 0..=4) => 'S',
                    (45, 5..=15) => '#',
                    _ => '.',
                })
                .collect()
        })
        .collect();
    GridTerrain::from_rows(&rows)
}

fn load_terrain(path: &str) -> GridTerrain {
    if !Path::new(path).exists() {
        info!("No terrain at {:?}, using built-in terrain", path);
        return built_in_terrain();
    }
    match GridTerrain::load(path) {
        Ok(terrain) => terrain,
        Err(e) => {
            error!("Failed to load terrain: {}", e);
            error!("Using built-in terrain");
            built_in_terrain()
        }
    }
}

/// Attack something next to the player, or take a random step
async fn simulate_player(map: Arc<GameMap>, player: Arc<Player>) {
    let mut interval = tokio::time::interval(PLAYER_ACTION_INTERVAL);
    loop {
        interval.tick().await;

        if !player.is_alive() {
            info!("Player {} revives", player.name());
            player.revive();
            if let Err(e) = map.move_player(player.id(), Point::new(30, 30)).await {
                debug!("{} could not return to town: {}", player.name(), e);
            }
            continue;
        }

        let reachable = map
            .drops()
            .into_iter()
            .find(|dropped| dropped.position.is_in_range(player.position(), 1));
        if let Some(dropped) = reachable {
            match map.pick_up(dropped.id, &player) {
                Ok(picked) => info!("{} picked up {}x item {}", player.name(), picked.item.quantity, picked.item.item_id),
                Err(e) => debug!("{} could not pick up {}: {}", player.name(), dropped.id, e),
            }
            continue;
        }

        let victim = map
            .npcs_near(player.position(), 1)
            .into_iter()
            .find(|npc| {
                matches!(npc.kind(), ObjectKind::Monster | ObjectKind::Destructible | ObjectKind::SoccerBall)
                    && !npc.is_summoned()
            });
        if let Some(victim) = victim {
            let attacker: Arc<dyn Attacker> = player.clone();
            if let Err(e) = victim.attack_by(attacker, None).await {
                debug!("{} could not attack {}: {}", player.name(), victim.id(), e);
            }
            continue;
        }

        let step = {
            let toward = map
                .npcs_near(player.position(), 8)
                .into_iter()
                .find(|npc| npc.kind() == ObjectKind::Monster && !npc.is_summoned())
                .map(|npc| Direction::between(player.position(), npc.position()))
                .filter(|_| rand::thread_rng().gen_bool(0.7));
            player.position().step(toward.unwrap_or_else(Direction::random))
        };
        if let Some(step) = step.filter(|p| map.terrain().is_walkable(*p)) {
            if let Err(e) = map.move_player(player.id(), step).await {
                debug!("{} could not step to {}: {}", player.name(), step, e);
            }
        }
    }
}

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    let config_path = args.get(1).map(String::as_str).unwrap_or("config.json");
    let world_path = args.get(2).map(String::as_str).unwrap_or("world.json");
    let terrain_path = args.get(3).map(String::as_str).unwrap_or("terrain.json");

    info!("Starting actor simulation...");

    let config = load_config(config_path);
    let duration = Duration::from_secs(config.demo_duration_secs);
    let table = SpawnTable::new(load_world(world_path));
    let terrain = load_terrain(terrain_path);

    let events = Arc::new(WorldEventState::new());
    let services = WorldServices::new(config).with_events(events.clone());
    let map = GameMap::new(MAP_ID, terrain, services);

    let kills = Arc::new(KillCounter::default());
    map.add_kill_listener(kills.clone());
    table.populate(&map).await;

    // Simulated players
    let players = vec![
        Player::new(1, "Aria", Point::new(25, 25), 300),
        Player::new(2, "Borin", Point::new(32, 30), 300),
        Player::new(3, "Cyra", Point::new(36, 22), 300),
    ];
    for player in &players {
        map.add_player(player.clone()).await;
    }

    match table.definition(7) {
        Ok(wolf) => {
            if let Err(e) = map.summon_monster(&players[0], wolf).await {
                error!("Failed to summon: {}", e);
            }
        }
        Err(e) => debug!("No summon available: {}", e),
    }

    match map.create_gate(&players[2], players[2].position(), Point::new(40, 25)) {
        Ok(gate) => {
            if let Err(e) = gate.enter(&players[2]).await {
                debug!("Gate {} could not be entered: {}", gate.id(), e);
            }
        }
        Err(e) => error!("Failed to open gate: {}", e),
    }

    let tasks: Vec<_> = players
        .iter()
        .map(|player| tokio::spawn(simulate_player(map.clone(), player.clone())))
        .collect();

    info!("Simulation running for {:?}", duration);
    tokio::time::sleep(duration / 2).await;

    events.start_event(MAP_ID);
    let invaders = table.start_event(&map).await;
    info!("Event started with {} invaders", invaders);

    tokio::time::sleep(duration - duration / 2).await;
    for task in &tasks {
        task.abort();
    }

    for player in &players {
        info!(
            "{}: health {}, experience {}, money {}, {} items, {} notifications",
            player.name(),
            player.health(),
            player.experience(),
            player.money(),
            player.items().len(),
            player.notifications().len()
        );
    }
    info!(
        "{} kills, {} items on the ground, {} actors alive",
        kills.kills.load(Ordering::Relaxed),
        map.drops().len(),
        map.npcs().iter().filter(|npc| npc.is_alive()).count()
    );

    map.shutdown().await;
    info!("Simulation finished");
}
