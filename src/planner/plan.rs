//! Emitted plans and choice reconstruction
//!
//! A plan pairs the state the search started from with the terminal state
//! that satisfied the goal, plus the decomposition choice every goal node
//! committed to along the way, keyed by method identity.

use ahash::AHashMap;

use crate::action::{Action, GoalAction};
use crate::htn::{ExecMode, MethodId};
use crate::world::WorldState;

/// One committed decomposition in a finished plan
#[derive(Debug, Clone)]
pub struct PlanChoice {
    pub method_name: String,
    pub index: usize,
    pub label: String,
    pub mode: ExecMode,
}

pub struct Plan {
    pub goal_name: String,
    pub start: WorldState,
    pub terminal: WorldState,
    pub sim_seconds: f64,
    pub choices: AHashMap<MethodId, PlanChoice>,
}

impl Plan {
    /// Build a plan from a terminal world by walking its committed action
    /// tree and recording every goal node's choice.
    pub fn from_terminal(goal_name: impl Into<String>, start: WorldState, terminal: WorldState) -> Self {
        let mut choices = AHashMap::new();
        for child in terminal.root().child_actions() {
            collect_choices(child, &mut choices);
        }
        let sim_seconds = terminal.elapsed();
        Self {
            goal_name: goal_name.into(),
            start,
            terminal,
            sim_seconds,
            choices,
        }
    }

    /// Human-readable outline, one line per committed choice.
    pub fn describe(&self) -> String {
        let mut lines: Vec<String> = self
            .choices
            .values()
            .map(|c| {
                format!(
                    "  {} -> [{}] {} ({:?})",
                    c.method_name, c.index, c.label, c.mode
                )
            })
            .collect();
        lines.sort();
        format!(
            "plan for '{}' resolved in {:.0}s simulated, {} choices:\n{}",
            self.goal_name,
            self.sim_seconds,
            self.choices.len(),
            lines.join("\n")
        )
    }
}

/// Walk an action subtree recording the chosen decomposition of every
/// committed goal node.
pub fn collect_choices(action: &dyn Action, out: &mut AHashMap<MethodId, PlanChoice>) {
    if let Some(goal) = action.as_any().downcast_ref::<GoalAction>() {
        if let Some(choice) = goal.chosen() {
            out.insert(
                goal.method_id(),
                PlanChoice {
                    method_name: goal.name().to_string(),
                    index: choice.index,
                    label: choice.label.clone(),
                    mode: choice.mode,
                },
            );
        }
    }
    for child in action.child_actions() {
        collect_choices(child, out);
    }
}
