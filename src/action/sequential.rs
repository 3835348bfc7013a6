//! Sequential composite: an ordered queue with a completed-count cursor
//!
//! The composite's status is the status of the action at the cursor, with
//! one twist: a freshly completed step still reports `InProgress` for the
//! composite until the next status check, after the cursor has advanced.
//! The cursor only moves inside `update_for_external_change`.

use std::any::Any;

use crate::action::{Action, ActionKey, Busy, BusyReport, Status, StatusReport};
use crate::core::error::Result;
use crate::core::types::Handle;
use crate::entity::agent::SimAgent;
use crate::world::WorldState;

pub struct SequentialAction {
    key: ActionKey,
    name: String,
    queue: Vec<Box<dyn Action>>,
    completed: usize,
}

impl SequentialAction {
    pub fn new(name: impl Into<String>, queue: Vec<Box<dyn Action>>) -> Self {
        Self {
            key: ActionKey::fresh(),
            name: name.into(),
            queue,
            completed: 0,
        }
    }

    pub fn completed_count(&self) -> usize {
        self.completed
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    fn current(&self) -> Option<&dyn Action> {
        self.queue.get(self.completed).map(|b| b.as_ref())
    }
}

impl Action for SequentialAction {
    fn key(&self) -> ActionKey {
        self.key
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn status(&self, world: &WorldState, explain: bool) -> StatusReport {
        let Some(current) = self.current() else {
            return StatusReport::plain(Status::Completed);
        };
        let report = current.status(world, explain);
        if report.status == Status::Completed {
            // Step finished but the cursor has not advanced yet; the whole
            // sequence must not look done after its first step.
            let mut report = report;
            report.status = Status::InProgress;
            if explain {
                report.reason = Some(format!(
                    "step {}/{} finished, awaiting advance",
                    self.completed + 1,
                    self.queue.len()
                ));
            }
            return report;
        }
        report
    }

    fn is_busy(&self, agent: Handle<SimAgent>, world: &WorldState, explain: bool) -> BusyReport {
        match self.current() {
            Some(current) => current.is_busy(agent, world, explain),
            None => BusyReport::plain(Busy::NotBusy),
        }
    }

    fn execute(&mut self, world: &mut WorldState) -> Result<()> {
        if let Some(current) = self.queue.get_mut(self.completed) {
            current.execute(world)?;
        }
        Ok(())
    }

    fn update_for_external_change(&mut self, world: &WorldState) {
        if let Some(current) = self.queue.get_mut(self.completed) {
            current.update_for_external_change(world);
        }
        while self.completed < self.queue.len() {
            if self.queue[self.completed].status(world, false).status != Status::Completed {
                break;
            }
            self.completed += 1;
            if let Some(next) = self.queue.get_mut(self.completed) {
                next.update_for_external_change(world);
            }
        }
    }

    fn enumerate_primitives<'a>(&'a self, world: &WorldState, out: &mut Vec<&'a dyn Action>) {
        if let Some(current) = self.current() {
            current.enumerate_primitives(world, out);
        }
    }

    fn maybe_fork_world(&self, world: &WorldState) -> Result<Option<Vec<WorldState>>> {
        match self.current() {
            Some(current) => current.maybe_fork_world(world),
            None => Ok(None),
        }
    }

    fn clone_action(&self) -> Box<dyn Action> {
        Box::new(Self {
            key: self.key,
            name: self.name.clone(),
            queue: self.queue.clone(),
            completed: self.completed,
        })
    }

    fn find_by_key(&self, key: ActionKey) -> Option<&dyn Action> {
        if key == self.key {
            return Some(self);
        }
        self.queue.iter().find_map(|child| child.find_by_key(key))
    }

    fn find_by_key_mut(&mut self, key: ActionKey) -> Option<&mut dyn Action> {
        if key == self.key {
            return Some(self);
        }
        self.queue
            .iter_mut()
            .find_map(|child| child.find_by_key_mut(key))
    }

    fn child_actions(&self) -> Vec<&dyn Action> {
        self.queue.iter().map(|b| b.as_ref()).collect()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::primitives::NoOpAction;
    use crate::core::types::{Rect, Team};

    fn world() -> WorldState {
        WorldState::new(Rect::default(), Team::Red, Some(1))
    }

    fn two_noops() -> SequentialAction {
        SequentialAction::new(
            "two steps",
            vec![
                Box::new(NoOpAction::new("first")) as Box<dyn Action>,
                Box::new(NoOpAction::new("second")),
            ],
        )
    }

    #[test]
    fn test_fresh_completion_still_reports_in_progress() {
        let w = world();
        let seq = two_noops();
        // Both children are instantly Completed, but the cursor has not
        // advanced: the composite must still be InProgress.
        assert_eq!(seq.status(&w, false).status, Status::InProgress);
    }

    #[test]
    fn test_completes_only_after_update_then_second_check() {
        let w = world();
        let mut seq = two_noops();
        assert_eq!(seq.status(&w, false).status, Status::InProgress);
        seq.update_for_external_change(&w);
        assert_eq!(seq.status(&w, false).status, Status::Completed);
        assert_eq!(seq.completed_count(), 2);
    }

    #[test]
    fn test_cursor_monotone_and_bounded() {
        let w = world();
        let mut seq = two_noops();
        let mut last = seq.completed_count();
        for _ in 0..5 {
            seq.update_for_external_change(&w);
            let now = seq.completed_count();
            assert!(now >= last);
            assert!(now <= seq.len());
            last = now;
        }
    }

    #[test]
    fn test_empty_sequence_is_completed() {
        let w = world();
        let seq = SequentialAction::new("empty", vec![]);
        assert_eq!(seq.status(&w, false).status, Status::Completed);
    }

    #[test]
    fn test_clone_preserves_key_and_cursor() {
        let w = world();
        let mut seq = two_noops();
        seq.update_for_external_change(&w);
        let copy = seq.clone_action();
        assert_eq!(copy.key(), seq.key());
        assert!(copy.find_by_key(seq.key()).is_some());
    }

    #[test]
    fn test_find_by_key_reaches_children() {
        let seq = two_noops();
        let child_key = seq.child_actions()[1].key();
        assert_eq!(seq.find_by_key(child_key).unwrap().name(), "second");
    }
}
