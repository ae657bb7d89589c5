//! Map terrain: which tiles can be walked on and which are safe zones.
//!
//! Loaded from a JSON file with one string per row, or built in code from the
//! same row format.

use std::path::Path;

use bitflags::bitflags;
use log::info;
use npc_shared::Point;
use rand::Rng;
use serde::Deserialize;

use crate::error::LoadError;

bitflags! {
    /// Attributes of a single tile
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct TerrainFlags: u8 {
        const BLOCKED   = 1 << 0;
        const SAFE_ZONE = 1 << 1;
    }
}

/// Terrain queries used by spawning, movement and targeting
pub trait Terrain: Send + Sync {
    fn is_walkable(&self, point: Point) -> bool;
    fn is_safe_zone(&self, point: Point) -> bool;

    /// A random walkable tile within `radius` of `point`, if there is one
    fn random_coordinate_near(&self, point: Point, radius: u8) -> Option<Point>;
}

#[derive(Debug, Deserialize)]
struct TerrainFile {
    rows: Vec<String>,
}

/// Tile grid terrain. Tiles outside the grid are blocked.
#[derive(Debug, Clone)]
pub struct GridTerrain {
    width: u16,
    height: u16,
    /// Row-major tile flags
    cells: Vec<TerrainFlags>,
}

/// Random picks before `random_coordinate_near` gives up
const RANDOM_COORDINATE_ATTEMPTS: usize = 20;

impl GridTerrain {
    /// Fully walkable terrain without safe zones
    pub fn open(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            cells: vec![TerrainFlags::empty(); width as usize * height as usize],
        }
    }

    /// Build from rows of `.` (walkable), `#` (blocked) and `S` (safe zone).
    /// Shorter rows are padded with blocked tiles.
    pub fn from_rows<S: AsRef<str>>(rows: &[S]) -> Self {
        let height = rows.len().min(256) as u16;
        let width = rows.iter().map(|r| r.as_ref().chars().count()).max().unwrap_or(0).min(256) as u16;

        let mut terrain = Self {
            width,
            height,
            cells: vec![TerrainFlags::BLOCKED; width as usize * height as usize],
        };
        for (y, row) in rows.iter().take(height as usize).enumerate() {
            for (x, c) in row.as_ref().chars().take(width as usize).enumerate() {
                terrain.cells[y * width as usize + x] = match c {
                    '#' => TerrainFlags::BLOCKED,
                    'S' => TerrainFlags::SAFE_ZONE,
                    _ => TerrainFlags::empty(),
                };
            }
        }
        terrain
    }

    /// Load terrain rows from a JSON file `{ "rows": [...] }`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let file: TerrainFile = serde_json::from_str(&content).map_err(|source| LoadError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        if file.rows.is_empty() {
            return Err(LoadError::Invalid {
                path: path.display().to_string(),
                reason: "terrain has no rows".to_string(),
            });
        }

        let terrain = Self::from_rows(&file.rows);
        info!("Loaded terrain {}x{} from {:?}", terrain.width, terrain.height, path);
        Ok(terrain)
    }

    /// Mark a rectangle as safe zone
    pub fn mark_safe_zone(&mut self, from: Point, to: Point) {
        for y in from.y.min(to.y)..=from.y.max(to.y) {
            for x in from.x.min(to.x)..=from.x.max(to.x) {
                if let Some(index) = self.index(Point::new(x, y)) {
                    self.cells[index].insert(TerrainFlags::SAFE_ZONE);
                }
            }
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn flags(&self, point: Point) -> TerrainFlags {
        self.index(point).map_or(TerrainFlags::BLOCKED, |index| self.cells[index])
    }

    fn index(&self, point: Point) -> Option<usize> {
        let (x, y) = (point.x as u16, point.y as u16);
        (x < self.width && y < self.height).then(|| y as usize * self.width as usize + x as usize)
    }
}

impl Terrain for GridTerrain {
    fn is_walkable(&self, point: Point) -> bool {
        !self.flags(point).contains(TerrainFlags::BLOCKED)
    }

    fn is_safe_zone(&self, point: Point) -> bool {
        self.flags(point).contains(TerrainFlags::SAFE_ZONE)
    }

    fn random_coordinate_near(&self, point: Point, radius: u8) -> Option<Point> {
        let radius = radius as i16;
        let mut rng = rand::thread_rng();
        (0..RANDOM_COORDINATE_ATTEMPTS)
            .filter_map(|_| point.offset(rng.gen_range(-radius..=radius), rng.gen_range(-radius..=radius)))
            .find(|candidate| self.is_walkable(*candidate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_parse_flags() {
        let terrain = GridTerrain::from_rows(&["..#", "SS.", "."]);

        assert_eq!(terrain.width(), 3);
        assert_eq!(terrain.height(), 3);
        assert!(terrain.is_walkable(Point::new(0, 0)));
        assert!(!terrain.is_walkable(Point::new(2, 0)));
        assert!(terrain.is_safe_zone(Point::new(1, 1)));
        assert!(terrain.is_walkable(Point::new(1, 1)));
        // padded and out of bounds tiles are blocked
        assert!(!terrain.is_walkable(Point::new(1, 2)));
        assert!(!terrain.is_walkable(Point::new(10, 10)));
    }

    #[test]
    fn test_random_coordinate_stays_near_and_walkable() {
        let terrain = GridTerrain::from_rows(&["#####", "#...#", "#...#", "#...#", "#####"]);
        let center = Point::new(2, 2);

        for _ in 0..100 {
            let point = terrain.random_coordinate_near(center, 1).unwrap();
            assert!(terrain.is_walkable(point));
            assert!((point.x as i16 - 2).abs() <= 1 && (point.y as i16 - 2).abs() <= 1);
        }
    }

    #[test]
    fn test_no_walkable_coordinate() {
        let terrain = GridTerrain::from_rows(&["###", "###"]);
        assert_eq!(terrain.random_coordinate_near(Point::new(1, 1), 1), None);
    }

    #[test]
    fn test_mark_safe_zone() {
        let mut terrain = GridTerrain::open(10, 10);
        terrain.mark_safe_zone(Point::new(2, 2), Point::new(3, 3));

        assert!(terrain.is_safe_zone(Point::new(3, 2)));
        assert!(!terrain.is_safe_zone(Point::new(4, 4)));
    }
}
