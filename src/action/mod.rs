//! The hierarchical action state machine
//!
//! Four node shapes - primitive, sequential, parallel, goal wrapper - share
//! one protocol: status, busy, execute, external-change refresh, primitive
//! enumeration, world forking, deep copy, and key-based relocation.
//!
//! Every node carries a process-unique random key assigned at construction.
//! Deep copies keep the key, which is what lets the planner re-find "the
//! same logical node" inside a freshly cloned world's tree.

pub mod goal;
pub mod parallel;
pub mod primitives;
pub mod sequential;

use std::any::Any;
use std::fmt;

use uuid::Uuid;

use crate::core::error::Result;
use crate::core::types::Handle;
use crate::entity::agent::SimAgent;
use crate::world::WorldState;

pub use goal::GoalAction;
pub use parallel::ParallelAction;
pub use primitives::{AreaFireAction, AttackAction, MoveAction, NoOpAction};
pub use sequential::SequentialAction;

/// Process-unique relocation key for an action node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActionKey(Uuid);

impl ActionKey {
    pub fn fresh() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ActionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of an action node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    InProgress,
    Completed,
    Impossible,
    Undefined,
}

impl Status {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Status::InProgress)
    }
}

/// Status plus optional diagnosis: a reason string and the leaf node that
/// decided the status.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub status: Status,
    pub reason: Option<String>,
    pub decided_by: Option<(ActionKey, String)>,
}

impl StatusReport {
    pub fn plain(status: Status) -> Self {
        Self {
            status,
            reason: None,
            decided_by: None,
        }
    }

    pub fn decided(status: Status, key: ActionKey, name: &str, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: Some(reason.into()),
            decided_by: Some((key, name.to_string())),
        }
    }

    pub fn describe(&self) -> String {
        match (&self.reason, &self.decided_by) {
            (Some(reason), Some((_, name))) => format!("{:?} at '{}': {}", self.status, name, reason),
            (Some(reason), None) => format!("{:?}: {}", self.status, reason),
            _ => format!("{:?}", self.status),
        }
    }
}

/// Whether a given agent is tied up by an action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Busy {
    NotBusy,
    /// The agent itself still has work to do here.
    PersonallyBusy,
    /// The agent's part is done but the action holds it for others.
    WaitingForOther,
}

#[derive(Debug, Clone)]
pub struct BusyReport {
    pub busy: Busy,
    pub reason: Option<String>,
}

impl BusyReport {
    pub fn plain(busy: Busy) -> Self {
        Self { busy, reason: None }
    }

    pub fn explained(busy: Busy, reason: impl Into<String>) -> Self {
        Self {
            busy,
            reason: Some(reason.into()),
        }
    }
}

/// The uniform action protocol
pub trait Action: Send + Sync {
    fn key(&self) -> ActionKey;

    fn name(&self) -> &str;

    /// Current status against a world. `explain` asks for a reason and the
    /// deciding leaf; callers on hot paths pass `false`.
    fn status(&self, world: &WorldState, explain: bool) -> StatusReport;

    fn is_busy(&self, agent: Handle<SimAgent>, world: &WorldState, explain: bool) -> BusyReport;

    /// Apply one tick's worth of effect. Safe to call every tick while the
    /// action is in progress.
    fn execute(&mut self, world: &mut WorldState) -> Result<()>;

    /// Re-synchronize cached sub-status after the world changed outside
    /// this action's control.
    fn update_for_external_change(&mut self, world: &WorldState);

    /// Collect the primitive actions currently relevant at this node.
    fn enumerate_primitives<'a>(&'a self, world: &WorldState, out: &mut Vec<&'a dyn Action>);

    /// Offer a branch point: clones of `world`, each committed to one
    /// decomposition choice. `None` when this subtree has nothing to fork.
    fn maybe_fork_world(&self, world: &WorldState) -> Result<Option<Vec<WorldState>>>;

    /// Independent deep copy. Composite nodes recursively clone children;
    /// relocation keys are preserved.
    fn clone_action(&self) -> Box<dyn Action>;

    /// Locate this node or a descendant by relocation key.
    fn find_by_key(&self, key: ActionKey) -> Option<&dyn Action>;

    fn find_by_key_mut(&mut self, key: ActionKey) -> Option<&mut dyn Action>;

    /// Direct child nodes, for tree walks. Primitives have none.
    fn child_actions(&self) -> Vec<&dyn Action> {
        Vec::new()
    }

    /// Acting agents, for primitives; composites report none directly.
    fn actors(&self) -> &[Handle<SimAgent>] {
        &[]
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl Clone for Box<dyn Action> {
    fn clone(&self) -> Self {
        self.clone_action()
    }
}
