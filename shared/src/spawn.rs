//! Spawn area descriptions.
//!
//! A spawn area says where, when and how many instances of one actor
//! definition appear on a map. Areas are created once when the world loads and
//! are shared by every actor spawned from them, across all of its lives.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::geometry::{Direction, Point};

/// When actors of a spawn area appear and whether they come back after dying
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SpawnTrigger {
    /// Spawned at world load and always respawned
    #[default]
    Automatic,
    /// Spawned when the map's event starts, respawned while it runs
    AutomaticDuringEvent,
    /// Spawned when a wave starts, respawned while that wave runs
    AutomaticDuringWave,
    /// Spawned at world load and moved around by an external plugin
    Wandering,
    /// Spawned explicitly; never respawned
    Manual,
}

/// Where and how an actor definition spawns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnArea {
    pub id: u32,
    pub map_id: u16,
    /// Number of the [`ActorDefinition`](crate::ActorDefinition) to spawn
    pub definition: u16,
    pub x1: u8,
    pub y1: u8,
    pub x2: u8,
    pub y2: u8,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default = "default_quantity")]
    pub quantity: u16,
    #[serde(default)]
    pub trigger: SpawnTrigger,
    /// Replaces the definition's max health for actors of this area
    #[serde(default)]
    pub max_health_override: Option<u32>,
    #[serde(default)]
    pub wave: u8,
}

fn default_quantity() -> u16 {
    1
}

impl SpawnArea {
    /// Area covering a single tile
    pub fn point(id: u32, map_id: u16, definition: u16, at: Point, direction: Direction) -> Self {
        Self {
            id,
            map_id,
            definition,
            x1: at.x,
            y1: at.y,
            x2: at.x,
            y2: at.y,
            direction,
            quantity: 1,
            trigger: SpawnTrigger::Manual,
            max_health_override: None,
            wave: 0,
        }
    }

    /// Square area of `radius` tiles around `center`, clamped to the map
    pub fn around(id: u32, map_id: u16, definition: u16, center: Point, radius: u8) -> Self {
        Self {
            id,
            map_id,
            definition,
            x1: center.x.saturating_sub(radius),
            y1: center.y.saturating_sub(radius),
            x2: center.x.saturating_add(radius),
            y2: center.y.saturating_add(radius),
            direction: Direction::Undefined,
            quantity: 1,
            trigger: SpawnTrigger::Manual,
            max_health_override: None,
            wave: 0,
        }
    }

    /// Whether the area describes exactly one tile
    pub fn is_point(&self) -> bool {
        self.x1 == self.x2 && self.y1 == self.y2
    }

    /// Check if a tile is inside the area
    pub fn contains(&self, point: Point) -> bool {
        let (min_x, max_x) = (self.x1.min(self.x2), self.x1.max(self.x2));
        let (min_y, max_y) = (self.y1.min(self.y2), self.y1.max(self.y2));
        (min_x..=max_x).contains(&point.x) && (min_y..=max_y).contains(&point.y)
    }

    /// Get a random tile inside the area
    pub fn random_point(&self) -> Point {
        if self.is_point() {
            return Point::new(self.x1, self.y1);
        }

        let mut rng = rand::thread_rng();
        let x = rng.gen_range(self.x1.min(self.x2)..=self.x1.max(self.x2));
        let y = rng.gen_range(self.y1.min(self.y2)..=self.y1.max(self.y2));
        Point::new(x, y)
    }
}
