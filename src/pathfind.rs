//! Path planning services
//!
//! Movement asks a `PathPlanner` for a waypoint list once per actor and
//! then follows it. `StraightLinePlanner` is the default; `GridPlanner`
//! runs A* over a uniform grid with blocked cells for worlds that carry
//! obstacles.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use ahash::{AHashMap, AHashSet};

use crate::core::cancel::CancelFlag;
use crate::core::error::{Result, SimError};
use crate::core::types::{Rect, Vec2};

/// A planner turns an origin/destination pair into waypoints. Planners are
/// shared between cloned worlds and must be stateless per call.
pub trait PathPlanner: Send + Sync {
    fn get_path(&self, start: Vec2, end: Vec2, cancel: &CancelFlag) -> Result<Vec<Vec2>>;
}

/// Two waypoints: where you are and where you are going.
#[derive(Debug, Default, Clone, Copy)]
pub struct StraightLinePlanner;

impl PathPlanner for StraightLinePlanner {
    fn get_path(&self, start: Vec2, end: Vec2, _cancel: &CancelFlag) -> Result<Vec<Vec2>> {
        Ok(vec![start, end])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Cell {
    x: i64,
    y: i64,
}

impl Cell {
    fn neighbors(self) -> [Cell; 8] {
        let Cell { x, y } = self;
        [
            Cell { x: x + 1, y },
            Cell { x: x - 1, y },
            Cell { x, y: y + 1 },
            Cell { x, y: y - 1 },
            Cell { x: x + 1, y: y + 1 },
            Cell { x: x + 1, y: y - 1 },
            Cell { x: x - 1, y: y + 1 },
            Cell { x: x - 1, y: y - 1 },
        ]
    }

    fn distance(&self, other: &Cell) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Node in the A* open set
#[derive(Debug, Clone)]
struct PathNode {
    cell: Cell,
    f_cost: f64, // g_cost + heuristic
}

impl PartialEq for PathNode {
    fn eq(&self, other: &Self) -> bool {
        self.cell == other.cell
    }
}

impl Eq for PathNode {}

impl Ord for PathNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap
        other
            .f_cost
            .partial_cmp(&self.f_cost)
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for PathNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A* over a uniform grid laid across the area of operations.
pub struct GridPlanner {
    area: Rect,
    cell_size: f64,
    blocked: AHashSet<Cell>,
}

impl GridPlanner {
    pub fn new(area: Rect, cell_size: f64) -> Self {
        Self {
            area,
            cell_size,
            blocked: AHashSet::new(),
        }
    }

    /// Mark every cell overlapping the circle at `center` as impassable.
    pub fn block_circle(&mut self, center: Vec2, radius: f64) {
        let min = self.to_cell(Vec2::new(center.x - radius, center.y - radius));
        let max = self.to_cell(Vec2::new(center.x + radius, center.y + radius));
        for x in min.x..=max.x {
            for y in min.y..=max.y {
                let cell = Cell { x, y };
                if self.to_point(cell).distance(&center) <= radius + self.cell_size {
                    self.blocked.insert(cell);
                }
            }
        }
    }

    fn to_cell(&self, point: Vec2) -> Cell {
        Cell {
            x: (point.x / self.cell_size).floor() as i64,
            y: (point.y / self.cell_size).floor() as i64,
        }
    }

    fn to_point(&self, cell: Cell) -> Vec2 {
        Vec2::new(
            (cell.x as f64 + 0.5) * self.cell_size,
            (cell.y as f64 + 0.5) * self.cell_size,
        )
    }

    fn in_area(&self, cell: Cell) -> bool {
        let p = self.to_point(cell);
        p.x >= self.area.min.x - self.cell_size
            && p.x <= self.area.max.x + self.cell_size
            && p.y >= self.area.min.y - self.cell_size
            && p.y <= self.area.max.y + self.cell_size
    }

    fn passable(&self, cell: Cell) -> bool {
        self.in_area(cell) && !self.blocked.contains(&cell)
    }
}

impl PathPlanner for GridPlanner {
    fn get_path(&self, start: Vec2, end: Vec2, cancel: &CancelFlag) -> Result<Vec<Vec2>> {
        let start_cell = self.to_cell(start);
        let goal_cell = self.to_cell(end);
        if start_cell == goal_cell {
            return Ok(vec![start, end]);
        }

        let mut open_set = BinaryHeap::new();
        let mut came_from: AHashMap<Cell, Cell> = AHashMap::new();
        let mut g_scores: AHashMap<Cell, f64> = AHashMap::new();

        g_scores.insert(start_cell, 0.0);
        open_set.push(PathNode {
            cell: start_cell,
            f_cost: start_cell.distance(&goal_cell),
        });

        while let Some(current) = open_set.pop() {
            if cancel.is_cancelled() {
                return Err(SimError::PathNotFound("path search cancelled".into()));
            }
            if current.cell == goal_cell {
                let mut cells = vec![current.cell];
                let mut cursor = current.cell;
                while let Some(&prev) = came_from.get(&cursor) {
                    cells.push(prev);
                    cursor = prev;
                }
                cells.reverse();
                let mut path: Vec<Vec2> = cells.into_iter().map(|c| self.to_point(c)).collect();
                // Snap the endpoints to the exact request.
                path[0] = start;
                let last = path.len() - 1;
                path[last] = end;
                return Ok(path);
            }

            let current_g = *g_scores.get(&current.cell).unwrap_or(&f64::INFINITY);

            for neighbor in current.cell.neighbors() {
                if !self.passable(neighbor) {
                    continue;
                }
                let tentative_g = current_g + current.cell.distance(&neighbor);
                let neighbor_g = *g_scores.get(&neighbor).unwrap_or(&f64::INFINITY);
                if tentative_g < neighbor_g {
                    came_from.insert(neighbor, current.cell);
                    g_scores.insert(neighbor, tentative_g);
                    open_set.push(PathNode {
                        cell: neighbor,
                        f_cost: tentative_g + neighbor.distance(&goal_cell),
                    });
                }
            }
        }

        Err(SimError::PathNotFound(format!(
            "no route from ({:.1}, {:.1}) to ({:.1}, {:.1})",
            start.x, start.y, end.x, end.y
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn area() -> Rect {
        Rect {
            min: Vec2::new(-100.0, -100.0),
            max: Vec2::new(100.0, 100.0),
        }
    }

    #[test]
    fn test_straight_line_is_two_points() {
        let p = StraightLinePlanner;
        let path = p
            .get_path(Vec2::ZERO, Vec2::new(10.0, 0.0), &CancelFlag::new())
            .unwrap();
        assert_eq!(path.len(), 2);
        assert_eq!(path[1], Vec2::new(10.0, 0.0));
    }

    #[test]
    fn test_grid_direct_route() {
        let p = GridPlanner::new(area(), 1.0);
        let path = p
            .get_path(Vec2::ZERO, Vec2::new(10.0, 0.0), &CancelFlag::new())
            .unwrap();
        assert_eq!(path.first().copied(), Some(Vec2::ZERO));
        assert_eq!(path.last().copied(), Some(Vec2::new(10.0, 0.0)));
    }

    #[test]
    fn test_grid_routes_around_blocked_circle() {
        let mut p = GridPlanner::new(area(), 1.0);
        p.block_circle(Vec2::new(5.0, 0.0), 3.0);
        let path = p
            .get_path(Vec2::ZERO, Vec2::new(10.0, 0.0), &CancelFlag::new())
            .unwrap();
        // Every interior waypoint clears the obstacle.
        for point in &path[1..path.len() - 1] {
            assert!(point.distance(&Vec2::new(5.0, 0.0)) > 3.0);
        }
    }

    #[test]
    fn test_grid_reports_unreachable_goal() {
        let mut p = GridPlanner::new(area(), 1.0);
        p.block_circle(Vec2::new(50.0, 50.0), 6.0);
        let err = p
            .get_path(Vec2::ZERO, Vec2::new(50.0, 50.0), &CancelFlag::new())
            .unwrap_err();
        assert!(matches!(err, SimError::PathNotFound(_)));
    }

    #[test]
    fn test_cancel_aborts_search() {
        let p = GridPlanner::new(area(), 0.5);
        let cancel = CancelFlag::new();
        cancel.cancel();
        let err = p
            .get_path(Vec2::ZERO, Vec2::new(90.0, 90.0), &cancel)
            .unwrap_err();
        assert!(matches!(err, SimError::PathNotFound(_)));
    }

    #[test]
    fn test_same_cell_start_and_goal() {
        let p = GridPlanner::new(area(), 10.0);
        let path = p
            .get_path(Vec2::new(1.0, 1.0), Vec2::new(2.0, 2.0), &CancelFlag::new())
            .unwrap();
        assert_eq!(path.len(), 2);
    }
}
