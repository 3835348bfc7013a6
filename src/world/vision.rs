//! Perception pass: team-scoped last-known-position observations
//!
//! Each tick, every agent within an opposing observer's visual range gets
//! its observer-team observation refreshed. Observations are stored on the
//! observed agent (one record per observing team) and age out; recency is
//! judged by the caller against the current clock.

use crate::core::types::{Handle, Team, Vec2};
use crate::entity::agent::SimAgent;
use crate::world::WorldState;

/// One observer-team sees target at position, this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sighting {
    pub observer_team: Team,
    pub target: Handle<SimAgent>,
    pub position: Vec2,
}

/// Compute all cross-team sightings for the current tick.
///
/// Only active observers see; inactive targets are still observed (wrecks
/// are visible). Pure read pass; the world applies the results.
pub fn compute_sightings(world: &WorldState) -> Vec<Sighting> {
    let mut sightings = Vec::new();
    for observer in world.agents() {
        if !observer.is_active() {
            continue;
        }
        for target in world.agents() {
            if target.team == observer.team {
                continue;
            }
            if observer.position.distance(&target.position) <= observer.visual_range {
                sightings.push(Sighting {
                    observer_team: observer.team,
                    target: target.handle(),
                    position: target.position,
                });
            }
        }
    }
    sightings
}
