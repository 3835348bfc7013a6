//! Plan scoring
//!
//! The planner emits every plan that satisfies the goal; picking a winner
//! is the caller's business, through a `Scorer`.

use ordered_float::OrderedFloat;

use crate::core::types::Team;
use crate::planner::plan::Plan;
use crate::world::WorldState;

pub trait Scorer: Send + Sync {
    fn evaluate(&self, world: &WorldState) -> f64;
}

/// Friendly remaining strength minus enemy remaining strength, weighted by
/// how quickly the terminal state was reached.
pub struct TeamStrengthScorer {
    pub team: Team,
    /// Penalty per simulated hour spent; zero ignores time entirely.
    pub hours_weight: f64,
}

impl TeamStrengthScorer {
    pub fn new(team: Team) -> Self {
        Self {
            team,
            hours_weight: 0.0,
        }
    }

    fn strength(world: &WorldState, team: Team) -> f64 {
        world
            .agents()
            .filter(|a| a.team == team)
            .map(|a| a.entities.iter().map(|e| e.remaining_health()).sum::<f64>())
            .sum()
    }
}

impl Scorer for TeamStrengthScorer {
    fn evaluate(&self, world: &WorldState) -> f64 {
        let friendly = Self::strength(world, self.team);
        let hostile = Self::strength(world, self.team.opponent());
        let hours = world.elapsed() / crate::core::types::SECONDS_PER_HOUR;
        friendly - hostile - self.hours_weight * hours
    }
}

/// Index and score of the best-scoring plan's terminal state.
pub fn best_plan(plans: &[Plan], scorer: &dyn Scorer) -> Option<(usize, f64)> {
    plans
        .iter()
        .enumerate()
        .max_by_key(|(_, p)| OrderedFloat(scorer.evaluate(&p.terminal)))
        .map(|(i, p)| (i, scorer.evaluate(&p.terminal)))
}
