//! Hierarchical task network methods
//!
//! A method is a task that knows how to decompose itself into alternative
//! plans. Each decomposition is an ordered or concurrent list of
//! sub-methods; a method with no decompositions is a leaf and supplies a
//! concrete action instead. Methods carry a process-unique id that deep
//! copies preserve, mirroring action relocation keys.

pub mod goals;
pub mod registry;

use std::fmt;

use uuid::Uuid;

use crate::action::Action;
use crate::core::error::Result;
use crate::world::WorldState;

pub use goals::{AttackCircleMethod, ClearAllEnemiesMethod, EliminateAgentMethod, NProngsMethod};
pub use registry::{build_goal, GoalKind, GoalParams};

/// Stable identity of a method across deep copies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodId(Uuid);

impl MethodId {
    pub fn fresh() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a decomposition's subtasks are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecMode {
    Sequential,
    Parallel,
}

/// One way of accomplishing a method: a labelled list of sub-methods.
pub struct Decomposition {
    pub label: String,
    pub mode: ExecMode,
    pub subtasks: Vec<Box<dyn Method>>,
}

impl Decomposition {
    pub fn sequential(label: impl Into<String>, subtasks: Vec<Box<dyn Method>>) -> Self {
        Self {
            label: label.into(),
            mode: ExecMode::Sequential,
            subtasks,
        }
    }

    pub fn parallel(label: impl Into<String>, subtasks: Vec<Box<dyn Method>>) -> Self {
        Self {
            label: label.into(),
            mode: ExecMode::Parallel,
            subtasks,
        }
    }
}

impl Clone for Decomposition {
    fn clone(&self) -> Self {
        Self {
            label: self.label.clone(),
            mode: self.mode,
            subtasks: self.subtasks.iter().map(|m| m.clone_method()).collect(),
        }
    }
}

/// A task in the network. Non-leaf methods return one or more
/// decompositions; leaves return none and provide an action.
pub trait Method: Send + Sync {
    fn id(&self) -> MethodId;

    fn name(&self) -> &str;

    /// Alternative ways to accomplish this task in the given world. An
    /// empty list marks a leaf.
    fn decompose(&self, world: &WorldState) -> Vec<Decomposition>;

    /// Concrete action for a leaf method. Non-leaves keep the default.
    fn action_for_sim(&self, _world: &WorldState) -> Result<Box<dyn Action>> {
        Ok(Box::new(crate::action::NoOpAction::new(format!(
            "{} (noop)",
            self.name()
        ))))
    }

    /// Deep copy preserving the method id.
    fn clone_method(&self) -> Box<dyn Method>;
}

impl fmt::Debug for dyn Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("id", &self.id())
            .field("name", &self.name())
            .finish()
    }
}

impl Clone for Box<dyn Method> {
    fn clone(&self) -> Self {
        self.clone_method()
    }
}
