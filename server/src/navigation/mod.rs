//! Pathfinding for walking actors.
//!
//! This module provides:
//! - The `Pathfinder` contract used by movement
//! - An A* implementation over the tile grid

use log::trace;
use npc_shared::Point;

use crate::world::Terrain;

/// Cost of a diagonal step
const DIAGONAL_COST: f64 = std::f64::consts::SQRT_2;

/// The eight neighbouring tile offsets
const DIRECTIONS: [(i16, i16); 8] = [
    (1, 0), (-1, 0), (0, 1), (0, -1),
    (1, 1), (1, -1), (-1, 1), (-1, -1),
];

/// Computes walkable paths between tiles
pub trait Pathfinder: Send + Sync {
    /// Steps from `from` to `to`, excluding `from` and including `to`.
    /// Returns `None` if there is no path.
    fn find_path(&self, terrain: &dyn Terrain, from: Point, to: Point) -> Option<Vec<Point>>;
}

// ============================================================================
// A* Pathfinding
// ============================================================================

/// A node in the pathfinding grid
#[derive(Debug, Clone)]
struct PathNode {
    pos: Point,
    g_cost: f64,
    h_cost: f64,
    parent: Option<usize>,
}

impl PathNode {
    fn f_cost(&self) -> f64 {
        self.g_cost + self.h_cost
    }
}

/// 8-neighbour A* with an iteration budget
#[derive(Debug, Clone)]
pub struct GridPathfinder {
    pub max_iterations: usize,
}

impl Default for GridPathfinder {
    fn default() -> Self {
        Self { max_iterations: 500 }
    }
}

impl GridPathfinder {
    pub fn new(max_iterations: usize) -> Self {
        Self { max_iterations }
    }
}

impl Pathfinder for GridPathfinder {
    fn find_path(&self, terrain: &dyn Terrain, from: Point, to: Point) -> Option<Vec<Point>> {
        if from == to {
            return Some(Vec::new());
        }
        if !terrain.is_walkable(to) {
            return None;
        }

        let mut open_list: Vec<PathNode> = vec![PathNode {
            pos: from,
            g_cost: 0.0,
            h_cost: from.distance_to(to),
            parent: None,
        }];
        let mut closed_list: Vec<PathNode> = Vec::new();
        let mut iterations = 0;

        while !open_list.is_empty() && iterations < self.max_iterations {
            iterations += 1;

            // Find node with lowest f_cost
            let mut best_idx = 0;
            let mut best_f = open_list[0].f_cost();
            for (i, node) in open_list.iter().enumerate().skip(1) {
                if node.f_cost() < best_f {
                    best_f = node.f_cost();
                    best_idx = i;
                }
            }

            let current = open_list.remove(best_idx);
            let current_idx = closed_list.len();

            if current.pos == to {
                let mut path = vec![current.pos];
                let mut trace_node = &current;
                while let Some(parent_idx) = trace_node.parent {
                    trace_node = &closed_list[parent_idx];
                    path.push(trace_node.pos);
                }

                path.reverse();
                path.remove(0); // Remove start position
                trace!("Path {} -> {} found after {} iterations", from, to, iterations);
                return Some(path);
            }

            closed_list.push(current.clone());

            for &(dx, dy) in &DIRECTIONS {
                let Some(neighbor_pos) = current.pos.offset(dx, dy) else {
                    continue;
                };
                if !terrain.is_walkable(neighbor_pos) {
                    continue;
                }
                if closed_list.iter().any(|n| n.pos == neighbor_pos) {
                    continue;
                }

                let move_cost = if dx != 0 && dy != 0 { DIAGONAL_COST } else { 1.0 };
                let g_cost = current.g_cost + move_cost;

                // Check if already in open list with lower cost
                match open_list.iter_mut().find(|n| n.pos == neighbor_pos) {
                    Some(existing) => {
                        if g_cost < existing.g_cost {
                            existing.g_cost = g_cost;
                            existing.parent = Some(current_idx);
                        }
                    }
                    None => open_list.push(PathNode {
                        pos: neighbor_pos,
                        g_cost,
                        h_cost: neighbor_pos.distance_to(to),
                        parent: Some(current_idx),
                    }),
                }
            }
        }

        trace!("No path {} -> {} within {} iterations", from, to, iterations);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::GridTerrain;

    #[test]
    fn test_pathfinding() {
        let terrain = GridTerrain::from_rows(&[
            ".......",
            "...#...",
            "...#...",
            "...#...",
            ".......",
        ]);

        let start = Point::new(1, 2);
        let goal = Point::new(5, 2);

        let path = GridPathfinder::default().find_path(&terrain, start, goal).unwrap();
        assert_eq!(path.last(), Some(&goal));
        assert!(!path.contains(&start));
        assert!(path.iter().all(|p| terrain.is_walkable(*p)));

        // every step moves to a neighbouring tile
        let mut previous = start;
        for step in &path {
            assert!(previous.is_in_range(*step, 1) || previous.distance_to(*step) <= DIAGONAL_COST + 1e-9);
            previous = *step;
        }
    }

    #[test]
    fn test_straight_line() {
        let terrain = GridTerrain::open(10, 10);
        let path = GridPathfinder::default()
            .find_path(&terrain, Point::new(0, 0), Point::new(3, 0))
            .unwrap();
        assert_eq!(path, vec![Point::new(1, 0), Point::new(2, 0), Point::new(3, 0)]);
    }

    #[test]
    fn test_unreachable_goal() {
        let terrain = GridTerrain::from_rows(&["..#..", "..#..", "..#.."]);
        let pathfinder = GridPathfinder::default();

        assert_eq!(pathfinder.find_path(&terrain, Point::new(0, 0), Point::new(4, 0)), None);
        assert_eq!(pathfinder.find_path(&terrain, Point::new(0, 0), Point::new(2, 0)), None);
    }

    #[test]
    fn test_same_tile() {
        let terrain = GridTerrain::open(4, 4);
        let path = GridPathfinder::default().find_path(&terrain, Point::new(1, 1), Point::new(1, 1));
        assert_eq!(path, Some(Vec::new()));
    }
}
