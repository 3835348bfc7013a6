//! Polyline path following
//!
//! Agents move toward a destination circle along a precomputed path at
//! `max_speed` world-units-per-hour. An agent that has drifted off its path
//! beyond a small tolerance first paths back onto the nearest point, then
//! resumes along the polyline.

use crate::core::types::{Circle, Vec2};

/// Allowed off-path drift before an agent must path back on.
pub const PATH_DRIFT_TOLERANCE: f64 = 0.1;

/// Result of advancing one agent for one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveOutcome {
    pub position: Vec2,
    pub arrived: bool,
}

/// Closest point on segment `a..b` to `p`.
fn nearest_on_segment(a: Vec2, b: Vec2, p: Vec2) -> Vec2 {
    let ab = b - a;
    let len_sq = ab.dot(&ab);
    if len_sq <= 1e-12 {
        return a;
    }
    let t = ((p - a).dot(&ab) / len_sq).clamp(0.0, 1.0);
    a.lerp(&b, t)
}

/// Nearest point on the polyline and the index of its segment start.
pub fn nearest_point_on_path(path: &[Vec2], position: Vec2) -> Option<(Vec2, usize)> {
    if path.is_empty() {
        return None;
    }
    if path.len() == 1 {
        return Some((path[0], 0));
    }
    let mut best = (path[0], 0usize);
    let mut best_dist = f64::INFINITY;
    for i in 0..path.len() - 1 {
        let candidate = nearest_on_segment(path[i], path[i + 1], position);
        let d = candidate.distance(&position);
        if d < best_dist {
            best_dist = d;
            best = (candidate, i);
        }
    }
    Some(best)
}

/// Advance up to `distance` world units along `path` toward `destination`.
///
/// Stops early on entering the destination circle. With no usable path the
/// agent heads straight for the circle's center.
pub fn advance_along_path(
    position: Vec2,
    path: &[Vec2],
    destination: &Circle,
    distance: f64,
) -> MoveOutcome {
    if destination.contains(position) {
        return MoveOutcome {
            position,
            arrived: true,
        };
    }
    if distance <= 0.0 {
        return MoveOutcome {
            position,
            arrived: false,
        };
    }

    let Some((nearest, segment)) = nearest_point_on_path(path, position) else {
        return advance_straight(position, destination.center, destination, distance);
    };

    let mut pos = position;
    let mut budget = distance;

    // Path back onto the polyline first if we have drifted off it.
    let drift = pos.distance(&nearest);
    if drift > PATH_DRIFT_TOLERANCE {
        if budget <= drift {
            let step = (nearest - pos).normalize() * budget;
            return finish(pos + step, destination);
        }
        budget -= drift;
        pos = nearest;
        if destination.contains(pos) {
            return MoveOutcome {
                position: pos,
                arrived: true,
            };
        }
    } else if drift > 0.0 {
        pos = nearest;
    }

    // Walk forward along the remaining waypoints.
    for waypoint in path.iter().skip(segment + 1) {
        let leg = pos.distance(waypoint);
        if leg >= budget {
            let step = (*waypoint - pos).normalize() * budget;
            return finish(pos + step, destination);
        }
        budget -= leg;
        pos = *waypoint;
        if destination.contains(pos) {
            return MoveOutcome {
                position: pos,
                arrived: true,
            };
        }
    }

    // Path exhausted; close the final gap to the destination center.
    advance_straight(pos, destination.center, destination, budget)
}

fn advance_straight(position: Vec2, toward: Vec2, destination: &Circle, budget: f64) -> MoveOutcome {
    let gap = position.distance(&toward);
    if gap <= budget {
        return MoveOutcome {
            position: toward,
            arrived: destination.contains(toward),
        };
    }
    let step = (toward - position).normalize() * budget;
    finish(position + step, destination)
}

fn finish(position: Vec2, destination: &Circle) -> MoveOutcome {
    MoveOutcome {
        position,
        arrived: destination.contains(position),
    }
}
