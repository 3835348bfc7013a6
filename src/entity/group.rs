//! Ordered, duplicate-free collections of agent handles
//!
//! Groups are treated as immutable after construction; the world state keys
//! member caches by the group's id.

use crate::core::types::{Handle, SimId};
use crate::entity::agent::SimAgent;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SimGroup {
    pub id: SimId,
    members: Vec<Handle<SimAgent>>,
}

impl SimGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from handles, dropping duplicates while preserving order.
    pub fn from_handles(handles: impl IntoIterator<Item = Handle<SimAgent>>) -> Self {
        let mut group = Self::new();
        for h in handles {
            group.push(h);
        }
        group
    }

    /// Append a member; duplicates are ignored.
    pub fn push(&mut self, handle: Handle<SimAgent>) {
        if !self.members.contains(&handle) {
            self.members.push(handle);
        }
    }

    pub fn members(&self) -> &[Handle<SimAgent>] {
        &self.members
    }

    pub fn contains(&self, handle: Handle<SimAgent>) -> bool {
        self.members.contains(&handle)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Handle<SimAgent>> + '_ {
        self.members.iter().copied()
    }
}
