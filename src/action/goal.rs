//! Goal wrapper: the bridge between methods and the action tree
//!
//! A `GoalAction` carries an undecided method. When asked to fork, it
//! clones the world once per decomposition, relocates itself inside each
//! clone by key, and commits that clone to one choice. Leaf methods skip
//! forking and materialize their concrete action on first execute.

use std::any::Any;

use crate::action::{
    Action, ActionKey, Busy, BusyReport, ParallelAction, SequentialAction, Status, StatusReport,
};
use crate::core::error::{Result, SimError};
use crate::core::types::Handle;
use crate::entity::agent::SimAgent;
use crate::htn::{Decomposition, ExecMode, Method, MethodId};
use crate::world::WorldState;

/// Which decomposition a committed goal picked
#[derive(Debug, Clone)]
pub struct DecompositionChoice {
    pub index: usize,
    pub label: String,
    pub mode: ExecMode,
}

pub struct GoalAction {
    key: ActionKey,
    name: String,
    method: Box<dyn Method>,
    implementation: Option<Box<dyn Action>>,
    chosen: Option<DecompositionChoice>,
}

impl GoalAction {
    pub fn new(method: Box<dyn Method>) -> Self {
        Self {
            key: ActionKey::fresh(),
            name: method.name().to_string(),
            method,
            implementation: None,
            chosen: None,
        }
    }

    pub fn method_id(&self) -> MethodId {
        self.method.id()
    }

    /// The decomposition this goal committed to, if any.
    pub fn chosen(&self) -> Option<&DecompositionChoice> {
        self.chosen.as_ref()
    }

    pub fn implementation(&self) -> Option<&dyn Action> {
        self.implementation.as_deref()
    }

    /// Commit this goal to decomposition `index`, building the nested
    /// action tree with every subtask wrapped in its own goal node.
    fn commit(&mut self, index: usize, decomposition: &Decomposition) {
        let children: Vec<Box<dyn Action>> = decomposition
            .subtasks
            .iter()
            .map(|m| Box::new(GoalAction::new(m.clone_method())) as Box<dyn Action>)
            .collect();
        let label = format!("{}: {}", self.name, decomposition.label);
        self.implementation = Some(match decomposition.mode {
            ExecMode::Sequential => Box::new(SequentialAction::new(label, children)),
            ExecMode::Parallel => Box::new(ParallelAction::new(label, children)),
        });
        self.chosen = Some(DecompositionChoice {
            index,
            label: decomposition.label.clone(),
            mode: decomposition.mode,
        });
        tracing::debug!(goal = %self.name, choice = %index, "goal committed to decomposition");
    }
}

impl Action for GoalAction {
    fn key(&self) -> ActionKey {
        self.key
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn status(&self, world: &WorldState, explain: bool) -> StatusReport {
        match &self.implementation {
            Some(implementation) => implementation.status(world, explain),
            None => {
                if explain {
                    StatusReport::decided(
                        Status::InProgress,
                        self.key,
                        &self.name,
                        "not yet decomposed",
                    )
                } else {
                    StatusReport::plain(Status::InProgress)
                }
            }
        }
    }

    fn is_busy(&self, agent: Handle<SimAgent>, world: &WorldState, explain: bool) -> BusyReport {
        match &self.implementation {
            Some(implementation) => implementation.is_busy(agent, world, explain),
            None => BusyReport::plain(Busy::NotBusy),
        }
    }

    fn execute(&mut self, world: &mut WorldState) -> Result<()> {
        if self.implementation.is_none() && self.method.decompose(world).is_empty() {
            // Leaf method: no branch point, materialize the action in place.
            self.implementation = Some(self.method.action_for_sim(world)?);
        }
        if let Some(implementation) = &mut self.implementation {
            implementation.execute(world)?;
        }
        Ok(())
    }

    fn update_for_external_change(&mut self, world: &WorldState) {
        if let Some(implementation) = &mut self.implementation {
            implementation.update_for_external_change(world);
        }
    }

    fn enumerate_primitives<'a>(&'a self, world: &WorldState, out: &mut Vec<&'a dyn Action>) {
        if let Some(implementation) = &self.implementation {
            implementation.enumerate_primitives(world, out);
        }
    }

    fn maybe_fork_world(&self, world: &WorldState) -> Result<Option<Vec<WorldState>>> {
        if let Some(implementation) = &self.implementation {
            return implementation.maybe_fork_world(world);
        }
        let decompositions = self.method.decompose(world);
        if decompositions.is_empty() {
            return Ok(None);
        }
        // A single choice still forks: the caller owns the branch
        // bookkeeping and the original world stays undecided.
        let mut forks = Vec::with_capacity(decompositions.len());
        for (index, decomposition) in decompositions.iter().enumerate() {
            let mut fork = world.clone_world();
            let node = fork
                .find_action_mut(self.key)
                .ok_or(SimError::ActionNotFound(self.key))?;
            let goal = node
                .as_any_mut()
                .downcast_mut::<GoalAction>()
                .ok_or(SimError::ActionNotFound(self.key))?;
            goal.commit(index, decomposition);
            forks.push(fork);
        }
        Ok(Some(forks))
    }

    fn clone_action(&self) -> Box<dyn Action> {
        Box::new(Self {
            key: self.key,
            name: self.name.clone(),
            method: self.method.clone_method(),
            implementation: self.implementation.clone(),
            chosen: self.chosen.clone(),
        })
    }

    fn find_by_key(&self, key: ActionKey) -> Option<&dyn Action> {
        if key == self.key {
            return Some(self);
        }
        self.implementation.as_ref()?.find_by_key(key)
    }

    fn find_by_key_mut(&mut self, key: ActionKey) -> Option<&mut dyn Action> {
        if key == self.key {
            return Some(self);
        }
        self.implementation.as_mut()?.find_by_key_mut(key)
    }

    fn child_actions(&self) -> Vec<&dyn Action> {
        match &self.implementation {
            Some(implementation) => vec![implementation.as_ref()],
            None => Vec::new(),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
