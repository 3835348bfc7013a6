//! The many-worlds planner
//!
//! Depth-first search over forked world copies, driven by an explicit
//! stack so fork explosions cannot exhaust the call stack. Each popped
//! world is stepped alone until its goal resolves, a budget runs out, or
//! the action tree asks to fork; forks push committed clones back onto
//! the stack. Budgets and cancellation are checked once per step, at loop
//! boundaries, never mid-tick.

pub mod plan;
pub mod scoring;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use rayon::prelude::*;
use tokio::sync::mpsc;

use crate::action::{ActionKey, GoalAction, Status};
use crate::core::cancel::CancelFlag;
use crate::core::config::PlannerConfig;
use crate::core::error::Result;
use crate::htn::Method;
use crate::world::WorldState;

pub use plan::{Plan, PlanChoice};
pub use scoring::{best_plan, Scorer, TeamStrengthScorer};

/// How stepping one branch ended
enum BranchOutcome {
    /// The branch hit a decision point; continue with these clones.
    Forked(Vec<WorldState>),
    /// The goal completed; the terminal world is a plan.
    Solved(WorldState),
    /// Timed out, impossible, or cancelled; drop without emitting.
    Abandoned,
}

#[derive(Clone)]
pub struct ManyWorldsPlanner {
    config: PlannerConfig,
    cancel: CancelFlag,
    created_at: Instant,
}

impl ManyWorldsPlanner {
    pub fn new(config: PlannerConfig, cancel: CancelFlag) -> Self {
        Self {
            config,
            cancel,
            created_at: Instant::now(),
        }
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    fn wall_clock_exhausted(&self) -> bool {
        self.config
            .wall_clock_seconds
            .map(|cap| self.created_at.elapsed().as_secs_f64() > cap)
            .unwrap_or(false)
    }

    /// Prepare the search seed: deep-copy the input, optionally strip
    /// enemy behaviors, and attach the goal wrapper.
    fn seed_world(&self, start: &WorldState, goal: Box<dyn Method>) -> (WorldState, ActionKey, String) {
        let goal_name = goal.name().to_string();
        let mut seed = start.clone_world();
        if self.config.strip_enemy_actions {
            seed.strip_team_actions(seed.friendly_team().opponent());
        }
        let key = seed.attach_action(Box::new(GoalAction::new(goal)));
        (seed, key, goal_name)
    }

    /// Step one branch until it forks, resolves, or is abandoned.
    fn drive_branch(&self, mut world: WorldState, goal_key: ActionKey) -> Result<BranchOutcome> {
        loop {
            if self.cancel.is_cancelled() {
                return Ok(BranchOutcome::Abandoned);
            }
            if self.wall_clock_exhausted() {
                self.log_abandonment(&world, goal_key, "wall-clock budget exhausted");
                return Ok(BranchOutcome::Abandoned);
            }
            if let Some(forks) = world.maybe_fork()? {
                return Ok(BranchOutcome::Forked(forks));
            }
            if world.elapsed() > self.config.max_sim_seconds {
                self.log_abandonment(&world, goal_key, "simulated-time budget exhausted");
                return Ok(BranchOutcome::Abandoned);
            }
            world.step(self.config.seconds_per_step)?;

            let Some(report) = world.action_status(goal_key, false) else {
                tracing::warn!(world = world.uid(), "goal node vanished from branch");
                return Ok(BranchOutcome::Abandoned);
            };
            match report.status {
                Status::InProgress => continue,
                Status::Completed => return Ok(BranchOutcome::Solved(world)),
                Status::Impossible | Status::Undefined => {
                    self.log_abandonment(&world, goal_key, "goal unreachable on this branch");
                    return Ok(BranchOutcome::Abandoned);
                }
            }
        }
    }

    fn log_abandonment(&self, world: &WorldState, goal_key: ActionKey, why: &str) {
        if let Some(report) = world.action_status(goal_key, true) {
            tracing::debug!(
                world = world.uid(),
                sim_seconds = world.elapsed(),
                detail = %report.describe(),
                "branch abandoned: {why}"
            );
        }
    }

    /// Sequential DFS from one seed. `emitted` is shared across workers so
    /// the plan cap holds globally.
    fn explore(
        &self,
        seed: WorldState,
        goal_key: ActionKey,
        goal_name: &str,
        start: &WorldState,
        emitted: &AtomicUsize,
        mut sink: impl FnMut(Plan) -> bool,
    ) -> Result<()> {
        let mut stack = vec![seed];
        while let Some(world) = stack.pop() {
            if self.cancel.is_cancelled() || emitted.load(Ordering::SeqCst) >= self.config.max_plans
            {
                return Ok(());
            }
            match self.drive_branch(world, goal_key)? {
                BranchOutcome::Forked(forks) => stack.extend(forks),
                BranchOutcome::Solved(terminal) => {
                    if emitted.fetch_add(1, Ordering::SeqCst) >= self.config.max_plans {
                        return Ok(());
                    }
                    let plan = Plan::from_terminal(goal_name, start.clone_world(), terminal);
                    tracing::info!(
                        goal = goal_name,
                        sim_seconds = plan.sim_seconds,
                        choices = plan.choices.len(),
                        "plan found"
                    );
                    if !sink(plan) {
                        return Ok(());
                    }
                }
                BranchOutcome::Abandoned => {}
            }
        }
        Ok(())
    }

    /// Run the search to completion and collect every emitted plan.
    pub fn generate_plans(&self, start: &WorldState, goal: Box<dyn Method>) -> Result<Vec<Plan>> {
        let (seed, goal_key, goal_name) = self.seed_world(start, goal);
        let emitted = AtomicUsize::new(0);

        if !self.config.multithread {
            let mut plans = Vec::new();
            self.explore(seed, goal_key, &goal_name, start, &emitted, |plan| {
                plans.push(plan);
                true
            })?;
            return Ok(plans);
        }

        // Multithreaded mode: drive the seed to its first fork on this
        // thread, then hand each branch to a rayon worker. Branches share
        // nothing but the plan counter and the cancel flag.
        let mut pending = vec![seed];
        let mut plans = Vec::new();
        loop {
            if pending.len() > 1 {
                break;
            }
            let Some(world) = pending.pop() else {
                return Ok(plans);
            };
            match self.drive_branch(world, goal_key)? {
                BranchOutcome::Forked(forks) => pending = forks,
                BranchOutcome::Solved(terminal) => {
                    plans.push(Plan::from_terminal(&goal_name, start.clone_world(), terminal));
                    return Ok(plans);
                }
                BranchOutcome::Abandoned => return Ok(plans),
            }
        }

        let branch_inputs: Vec<(WorldState, WorldState)> = pending
            .into_iter()
            .map(|branch| (branch, start.clone_world()))
            .collect();
        let results: Vec<Result<Vec<Plan>>> = branch_inputs
            .into_par_iter()
            .map(|(branch, branch_start)| {
                let mut local = Vec::new();
                self.explore(branch, goal_key, &goal_name, &branch_start, &emitted, |plan| {
                    local.push(plan);
                    true
                })?;
                Ok(local)
            })
            .collect();
        for result in results {
            plans.extend(result?);
        }
        Ok(plans)
    }

    /// Run the search on a blocking worker and stream plans as they are
    /// found. Dropping the receiver stops the search at the next emission.
    pub fn plan_stream(
        &self,
        start: &WorldState,
        goal: Box<dyn Method>,
    ) -> mpsc::Receiver<Plan> {
        let (tx, rx) = mpsc::channel(16);
        let planner = self.clone();
        let (seed, goal_key, goal_name) = self.seed_world(start, goal);
        let start_copy = start.clone_world();
        tokio::task::spawn_blocking(move || {
            let emitted = AtomicUsize::new(0);
            let outcome = planner.explore(seed, goal_key, &goal_name, &start_copy, &emitted, |plan| {
                tx.blocking_send(plan).is_ok()
            });
            if let Err(err) = outcome {
                tracing::error!(%err, "plan search failed");
            }
        });
        rx
    }
}
