//! Map coordinates and facing directions.
//!
//! Maps are 256x256 tile grids, so coordinates fit in a byte. The y axis grows
//! towards the south.

use std::f64::consts::FRAC_PI_4;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// A tile coordinate on a map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: u8,
    pub y: u8,
}

impl Point {
    pub const fn new(x: u8, y: u8) -> Self {
        Self { x, y }
    }

    /// Euclidean distance between two tiles
    pub fn distance_to(&self, other: Point) -> f64 {
        let dx = other.x as f64 - self.x as f64;
        let dy = other.y as f64 - self.y as f64;
        (dx * dx + dy * dy).sqrt()
    }

    /// Check whether `other` lies within `range` tiles
    pub fn is_in_range(&self, other: Point, range: u8) -> bool {
        self.distance_to(other) <= range as f64
    }

    /// Move by a signed delta, returning `None` when leaving the map
    pub fn offset(&self, dx: i16, dy: i16) -> Option<Point> {
        let x = u8::try_from(self.x as i16 + dx).ok()?;
        let y = u8::try_from(self.y as i16 + dy).ok()?;
        Some(Point { x, y })
    }

    /// One tile step in the given direction
    pub fn step(&self, direction: Direction) -> Option<Point> {
        let (dx, dy) = direction.offset();
        self.offset(dx as i16, dy as i16)
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Facing direction of an actor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Direction {
    /// No configured direction; spawning picks a random one
    #[default]
    Undefined,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
    North,
    NorthEast,
}

impl Direction {
    /// All defined directions, clockwise starting east
    pub const ALL: [Direction; 8] = [
        Direction::East,
        Direction::SouthEast,
        Direction::South,
        Direction::SouthWest,
        Direction::West,
        Direction::NorthWest,
        Direction::North,
        Direction::NorthEast,
    ];

    /// Tile delta of one step in this direction
    pub fn offset(&self) -> (i8, i8) {
        match self {
            Direction::Undefined => (0, 0),
            Direction::East => (1, 0),
            Direction::SouthEast => (1, 1),
            Direction::South => (0, 1),
            Direction::SouthWest => (-1, 1),
            Direction::West => (-1, 0),
            Direction::NorthWest => (-1, -1),
            Direction::North => (0, -1),
            Direction::NorthEast => (1, -1),
        }
    }

    /// Direction from `from` towards `to`, snapped to the nearest octant.
    /// Returns `Undefined` when both points are equal.
    pub fn between(from: Point, to: Point) -> Direction {
        let dx = to.x as f64 - from.x as f64;
        let dy = to.y as f64 - from.y as f64;
        if dx == 0.0 && dy == 0.0 {
            return Direction::Undefined;
        }

        let octant = (dy.atan2(dx) / FRAC_PI_4).round() as i32;
        Direction::ALL[octant.rem_euclid(8) as usize]
    }

    /// A uniformly random defined direction
    pub fn random() -> Direction {
        Direction::ALL[rand::thread_rng().gen_range(0..Direction::ALL.len())]
    }

    /// Resolve `Undefined` to a random direction
    pub fn or_random(self) -> Direction {
        match self {
            Direction::Undefined => Direction::random(),
            defined => defined,
        }
    }
}
