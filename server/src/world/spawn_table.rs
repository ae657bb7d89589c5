//! Actor definitions and spawn areas, and spawning actors from them.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use log::{info, warn};
use npc_shared::{ActorDefinition, Direction, IntelligenceKind, LootEntry, ObjectKind, Point, SpawnArea, SpawnTrigger};
use serde::Deserialize;

use crate::entities::NonPlayerCharacter;
use crate::error::{ActorError, LoadError, Result};
use crate::world::GameMap;

/// Static world data as stored on disk
#[derive(Debug, Clone, Deserialize)]
pub struct WorldData {
    pub definitions: Vec<ActorDefinition>,
    pub spawn_areas: Vec<SpawnArea>,
}

impl WorldData {
    /// Load world data from a JSON file and check that every spawn area refers
    /// to a known definition
    pub fn load<P: AsRef<Path>>(path: P) -> std::result::Result<Self, LoadError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let data: WorldData = serde_json::from_str(&content).map_err(|source| LoadError::Parse {
            path: path.display().to_string(),
            source,
        })?;

        if let Some(area) = data
            .spawn_areas
            .iter()
            .find(|area| !data.definitions.iter().any(|d| d.number == area.definition))
        {
            return Err(LoadError::Invalid {
                path: path.display().to_string(),
                reason: format!("spawn area {} refers to unknown definition {}", area.id, area.definition),
            });
        }

        info!(
            "Loaded {} definitions and {} spawn areas from {:?}",
            data.definitions.len(),
            data.spawn_areas.len(),
            path
        );
        Ok(data)
    }

    /// Small world used when no data file is given
    pub fn built_in() -> Self {
        let goblin = ActorDefinition {
            number: 1,
            designation: "Goblin".to_string(),
            kind: ObjectKind::Monster,
            level: 3,
            max_health: 60,
            min_damage: 4,
            max_damage: 9,
            defense: 1,
            attack_range: 1,
            view_range: 6,
            move_range: 3,
            move_delay_ms: 400,
            attack_delay_ms: 1200,
            respawn_delay_ms: 5000,
            drop_count: 2,
            loot_table: vec![
                LootEntry {
                    item_id: 3,
                    drop_chance: 0.5,
                    min_quantity: 1,
                    max_quantity: 1,
                },
                LootEntry {
                    item_id: 1,
                    drop_chance: 0.2,
                    min_quantity: 1,
                    max_quantity: 2,
                },
            ],
            attack_skill: None,
            intelligence: None,
        };

        let guard = ActorDefinition {
            number: 2,
            designation: "Town Guard".to_string(),
            kind: ObjectKind::Guard,
            level: 50,
            max_health: 1000,
            min_damage: 30,
            max_damage: 40,
            defense: 20,
            attack_range: 2,
            view_range: 7,
            move_range: 2,
            drop_count: 0,
            loot_table: Vec::new(),
            ..goblin.clone()
        };

        let spike_trap = ActorDefinition {
            number: 3,
            designation: "Spike Trap".to_string(),
            kind: ObjectKind::Trap,
            level: 10,
            max_health: 1,
            min_damage: 10,
            max_damage: 15,
            defense: 0,
            attack_range: 0,
            view_range: 3,
            move_range: 0,
            attack_delay_ms: 1000,
            drop_count: 0,
            loot_table: Vec::new(),
            intelligence: Some(IntelligenceKind::TrapPressure),
            ..goblin.clone()
        };

        let lance_trap = ActorDefinition {
            number: 4,
            designation: "Lance Trap".to_string(),
            attack_range: 3,
            view_range: 4,
            intelligence: Some(IntelligenceKind::TrapDirectionalArea),
            ..spike_trap.clone()
        };

        let barrel = ActorDefinition {
            number: 5,
            designation: "Barrel".to_string(),
            kind: ObjectKind::Destructible,
            level: 1,
            max_health: 20,
            min_damage: 0,
            max_damage: 0,
            defense: 0,
            attack_range: 0,
            view_range: 0,
            move_range: 0,
            respawn_delay_ms: 15_000,
            ..goblin.clone()
        };

        let ball = ActorDefinition {
            number: 6,
            designation: "Soccer Ball".to_string(),
            kind: ObjectKind::SoccerBall,
            drop_count: 0,
            loot_table: Vec::new(),
            ..barrel.clone()
        };

        let wolf = ActorDefinition {
            number: 7,
            designation: "Spirit Wolf".to_string(),
            level: 8,
            max_health: 120,
            min_damage: 8,
            max_damage: 14,
            view_range: 6,
            move_delay_ms: 300,
            drop_count: 0,
            loot_table: Vec::new(),
            ..goblin.clone()
        };

        let invader = ActorDefinition {
            number: 8,
            designation: "Invader".to_string(),
            level: 12,
            max_health: 90,
            ..goblin.clone()
        };

        let area = |id: u32, definition: u16, from: (u8, u8), to: (u8, u8), quantity: u16, trigger: SpawnTrigger| {
            SpawnArea {
                id,
                map_id: 0,
                definition,
                x1: from.0,
                y1: from.1,
                x2: to.0,
                y2: to.1,
                direction: Direction::Undefined,
                quantity,
                trigger,
                max_health_override: None,
                wave: 0,
            }
        };

        let mut lance_area = SpawnArea::point(4, 0, 4, Point::new(12, 30), Direction::East);
        lance_area.trigger = SpawnTrigger::Automatic;

        Self {
            definitions: vec![goblin, guard, spike_trap, lance_trap, barrel, ball, wolf, invader],
            spawn_areas: vec![
                area(1, 1, (20, 20), (40, 40), 8, SpawnTrigger::Automatic),
                area(2, 2, (5, 5), (8, 8), 1, SpawnTrigger::Automatic),
                area(3, 3, (30, 10), (30, 10), 1, SpawnTrigger::Automatic),
                lance_area,
                area(5, 5, (15, 15), (18, 18), 2, SpawnTrigger::Automatic),
                area(6, 6, (25, 45), (25, 45), 1, SpawnTrigger::Automatic),
                area(7, 8, (40, 20), (50, 30), 4, SpawnTrigger::AutomaticDuringEvent),
            ],
        }
    }
}

/// Definitions by number plus the spawn areas referring to them
#[derive(Debug)]
pub struct SpawnTable {
    definitions: HashMap<u16, Arc<ActorDefinition>>,
    areas: Vec<Arc<SpawnArea>>,
}

impl SpawnTable {
    pub fn new(data: WorldData) -> Self {
        Self {
            definitions: data
                .definitions
                .into_iter()
                .map(|definition| (definition.number, Arc::new(definition)))
                .collect(),
            areas: data.spawn_areas.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn definition(&self, number: u16) -> Result<Arc<ActorDefinition>> {
        self.definitions
            .get(&number)
            .cloned()
            .ok_or(ActorError::UnknownDefinition(number))
    }

    pub fn areas(&self) -> &[Arc<SpawnArea>] {
        &self.areas
    }

    pub fn area(&self, id: u32) -> Result<Arc<SpawnArea>> {
        self.areas
            .iter()
            .find(|area| area.id == id)
            .cloned()
            .ok_or(ActorError::UnknownSpawnArea(id))
    }

    /// Spawn everything that appears at world load
    pub async fn populate(&self, map: &Arc<GameMap>) -> usize {
        let spawned = self
            .spawn_matching(map, |area| {
                matches!(area.trigger, SpawnTrigger::Automatic | SpawnTrigger::Wandering)
            })
            .await;
        info!("Populated map {} with {} actors", map.id(), spawned);
        spawned
    }

    /// Spawn the event actors of the map
    pub async fn start_event(&self, map: &Arc<GameMap>) -> usize {
        self.spawn_matching(map, |area| area.trigger == SpawnTrigger::AutomaticDuringEvent)
            .await
    }

    /// Spawn the actors of one wave
    pub async fn start_wave(&self, map: &Arc<GameMap>, wave: u8) -> usize {
        self.spawn_matching(map, |area| {
            area.trigger == SpawnTrigger::AutomaticDuringWave && area.wave == wave
        })
        .await
    }

    /// Spawn the actors of a manually triggered area
    pub async fn spawn_manual(&self, map: &Arc<GameMap>, area_id: u32) -> Result<Vec<Arc<NonPlayerCharacter>>> {
        let area = self.area(area_id)?;
        let definition = self.definition(area.definition)?;

        let mut spawned = Vec::with_capacity(area.quantity as usize);
        for _ in 0..area.quantity {
            spawned.push(map.spawn_npc(definition.clone(), area.clone()).await?);
        }
        Ok(spawned)
    }

    async fn spawn_matching<F>(&self, map: &Arc<GameMap>, filter: F) -> usize
    where
        F: Fn(&SpawnArea) -> bool,
    {
        let mut spawned = 0;
        for area in self.areas.iter().filter(|area| area.map_id == map.id() && filter(area)) {
            let definition = match self.definition(area.definition) {
                Ok(definition) => definition,
                Err(e) => {
                    warn!("Skipping spawn area {}: {}", area.id, e);
                    continue;
                }
            };

            for _ in 0..area.quantity {
                match map.spawn_npc(definition.clone(), area.clone()).await {
                    Ok(_) => spawned += 1,
                    Err(e) => {
                        warn!("Failed to spawn {} in area {}: {}", definition.designation, area.id, e);
                        break;
                    }
                }
            }
        }
        spawned
    }
}
