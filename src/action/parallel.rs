//! Parallel composite: entries with frozen last-known statuses
//!
//! Aggregation priority: any `Impossible`/`Undefined` entry decides the
//! composite; else any `InProgress` entry keeps it in progress; else all
//! entries are `Completed` and so is the composite. Only entries whose
//! cached status is still `InProgress` are executed, forked, or refreshed;
//! the rest stay frozen until explicitly culled.

use std::any::Any;

use crate::action::{Action, ActionKey, Busy, BusyReport, Status, StatusReport};
use crate::core::error::Result;
use crate::core::types::Handle;
use crate::entity::agent::SimAgent;
use crate::world::WorldState;

struct ParallelEntry {
    action: Box<dyn Action>,
    last_status: Status,
}

pub struct ParallelAction {
    key: ActionKey,
    name: String,
    entries: Vec<ParallelEntry>,
}

impl ParallelAction {
    pub fn new(name: impl Into<String>, actions: Vec<Box<dyn Action>>) -> Self {
        Self {
            key: ActionKey::fresh(),
            name: name.into(),
            entries: actions
                .into_iter()
                .map(|action| ParallelEntry {
                    action,
                    last_status: Status::InProgress,
                })
                .collect(),
        }
    }

    pub fn push(&mut self, action: Box<dyn Action>) {
        self.entries.push(ParallelEntry {
            action,
            last_status: Status::InProgress,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry_actions(&self) -> impl Iterator<Item = &dyn Action> {
        self.entries.iter().map(|e| e.action.as_ref())
    }

    pub fn entry_statuses(&self) -> impl Iterator<Item = Status> + '_ {
        self.entries.iter().map(|e| e.last_status)
    }

    /// Keep only entries whose mask slot is true.
    pub fn retain_by_mask(&mut self, mask: &[bool]) {
        let mut index = 0;
        self.entries.retain(|_| {
            let keep = mask.get(index).copied().unwrap_or(true);
            index += 1;
            keep
        });
    }

    /// Drop entries that have finished (completed or failed). Frozen
    /// entries persist until this is called.
    pub fn cull_finished(&mut self) {
        self.entries
            .retain(|e| e.last_status == Status::InProgress);
    }

    pub fn deep_clone(&self) -> ParallelAction {
        ParallelAction {
            key: self.key,
            name: self.name.clone(),
            entries: self
                .entries
                .iter()
                .map(|e| ParallelEntry {
                    action: e.action.clone_action(),
                    last_status: e.last_status,
                })
                .collect(),
        }
    }

    fn live_status(&self, entry: &ParallelEntry, world: &WorldState, explain: bool) -> StatusReport {
        if entry.last_status == Status::InProgress {
            entry.action.status(world, explain)
        } else {
            StatusReport::plain(entry.last_status)
        }
    }
}

impl Action for ParallelAction {
    fn key(&self) -> ActionKey {
        self.key
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn status(&self, world: &WorldState, explain: bool) -> StatusReport {
        let mut in_progress: Option<StatusReport> = None;
        for entry in &self.entries {
            let report = self.live_status(entry, world, explain);
            match report.status {
                Status::Impossible | Status::Undefined => return report,
                Status::InProgress => {
                    if in_progress.is_none() {
                        in_progress = Some(report);
                    }
                }
                Status::Completed => {}
            }
        }
        in_progress.unwrap_or_else(|| StatusReport::plain(Status::Completed))
    }

    fn is_busy(&self, agent: Handle<SimAgent>, world: &WorldState, explain: bool) -> BusyReport {
        let mut waiting: Option<BusyReport> = None;
        for entry in &self.entries {
            if entry.last_status != Status::InProgress {
                continue;
            }
            let report = entry.action.is_busy(agent, world, explain);
            match report.busy {
                Busy::PersonallyBusy => return report,
                Busy::WaitingForOther => {
                    if waiting.is_none() {
                        waiting = Some(report);
                    }
                }
                Busy::NotBusy => {}
            }
        }
        waiting.unwrap_or_else(|| BusyReport::plain(Busy::NotBusy))
    }

    fn execute(&mut self, world: &mut WorldState) -> Result<()> {
        for entry in &mut self.entries {
            if entry.last_status == Status::InProgress {
                entry.action.execute(world)?;
            }
        }
        Ok(())
    }

    fn update_for_external_change(&mut self, world: &WorldState) {
        for entry in &mut self.entries {
            if entry.last_status != Status::InProgress {
                continue;
            }
            entry.action.update_for_external_change(world);
            entry.last_status = entry.action.status(world, false).status;
        }
    }

    fn enumerate_primitives<'a>(&'a self, world: &WorldState, out: &mut Vec<&'a dyn Action>) {
        for entry in &self.entries {
            if entry.last_status == Status::InProgress {
                entry.action.enumerate_primitives(world, out);
            }
        }
    }

    fn maybe_fork_world(&self, world: &WorldState) -> Result<Option<Vec<WorldState>>> {
        // First discovered fork request wins the tick.
        for entry in &self.entries {
            if entry.last_status != Status::InProgress {
                continue;
            }
            if let Some(forks) = entry.action.maybe_fork_world(world)? {
                return Ok(Some(forks));
            }
        }
        Ok(None)
    }

    fn clone_action(&self) -> Box<dyn Action> {
        Box::new(self.deep_clone())
    }

    fn find_by_key(&self, key: ActionKey) -> Option<&dyn Action> {
        if key == self.key {
            return Some(self);
        }
        self.entries
            .iter()
            .find_map(|e| e.action.find_by_key(key))
    }

    fn find_by_key_mut(&mut self, key: ActionKey) -> Option<&mut dyn Action> {
        if key == self.key {
            return Some(self);
        }
        self.entries
            .iter_mut()
            .find_map(|e| e.action.find_by_key_mut(key))
    }

    fn child_actions(&self) -> Vec<&dyn Action> {
        self.entries.iter().map(|e| e.action.as_ref()).collect()
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

    /// Test double with a fixed status.
    struct FixedAction {
        key: ActionKey,
        name: String,
        status: Status,
        busy: Busy,
    }

    impl FixedAction {
        fn new(status: Status) -> Self {
            Self {
                key: ActionKey::fresh(),
                name: format!("fixed {:?}", status),
                status,
                busy: Busy::NotBusy,
            }
        }

        fn busy(status: Status, busy: Busy) -> Self {
            let mut a = Self::new(status);
            a.busy = busy;
            a
        }
    }

    impl Action for FixedAction {
        fn key(&self) -> ActionKey {
            self.key
        }
        fn name(&self) -> &str {
            &self.name
        }
        fn status(&self, _world: &WorldState, _explain: bool) -> StatusReport {
            StatusReport::plain(self.status)
        }
        fn is_busy(
            &self,
            _agent: Handle<SimAgent>,
            _world: &WorldState,
            _explain: bool,
        ) -> BusyReport {
            BusyReport::plain(self.busy)
        }
        fn execute(&mut self, _world: &mut WorldState) -> Result<()> {
            Ok(())
        }
        fn update_for_external_change(&mut self, _world: &WorldState) {}
        fn enumerate_primitives<'a>(&'a self, _world: &WorldState, out: &mut Vec<&'a dyn Action>) {
            out.push(self);
        }
        fn maybe_fork_world(&self, _world: &WorldState) -> Result<Option<Vec<WorldState>>> {
            Ok(None)
        }
        fn clone_action(&self) -> Box<dyn Action> {
            Box::new(FixedAction {
                key: self.key,
                name: self.name.clone(),
                status: self.status,
                busy: self.busy,
            })
        }
        fn find_by_key(&self, key: ActionKey) -> Option<&dyn Action> {
            (key == self.key).then_some(self as &dyn Action)
        }
        fn find_by_key_mut(&mut self, key: ActionKey) -> Option<&mut dyn Action> {
            (key == self.key).then_some(self as &mut dyn Action)
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    fn parallel_of(statuses: &[Status]) -> ParallelAction {
        ParallelAction::new(
            "test",
            statuses
                .iter()
                .map(|s| Box::new(FixedAction::new(*s)) as Box<dyn Action>)
                .collect(),
        )
    }

    #[test]
    fn test_impossible_dominates_in_any_order() {
        let w = world();
        for statuses in [
            [Status::Impossible, Status::InProgress, Status::Completed],
            [Status::Completed, Status::Impossible, Status::InProgress],
            [Status::InProgress, Status::Completed, Status::Impossible],
        ] {
            let p = parallel_of(&statuses);
            assert_eq!(p.status(&w, false).status, Status::Impossible);
        }
    }

    #[test]
    fn test_undefined_dominates_like_impossible() {
        let w = world();
        let p = parallel_of(&[Status::Completed, Status::Undefined]);
        assert_eq!(p.status(&w, false).status, Status::Undefined);
    }

    #[test]
    fn test_in_progress_beats_completed() {
        let w = world();
        let p = parallel_of(&[Status::InProgress, Status::Completed]);
        assert_eq!(p.status(&w, false).status, Status::InProgress);
        let p = parallel_of(&[Status::Completed, Status::InProgress]);
        assert_eq!(p.status(&w, false).status, Status::InProgress);
    }

    #[test]
    fn test_all_completed_is_completed() {
        let w = world();
        let p = parallel_of(&[Status::Completed, Status::Completed]);
        assert_eq!(p.status(&w, false).status, Status::Completed);
    }

    #[test]
    fn test_empty_parallel_is_completed() {
        let w = world();
        let p = ParallelAction::new("empty", vec![]);
        assert_eq!(p.status(&w, false).status, Status::Completed);
    }

    #[test]
    fn test_finished_entries_freeze_until_culled() {
        let w = world();
        let mut p = ParallelAction::new(
            "mixed",
            vec![
                Box::new(NoOpAction::new("done")) as Box<dyn Action>,
                Box::new(FixedAction::new(Status::InProgress)),
            ],
        );
        p.update_for_external_change(&w);
        let statuses: Vec<Status> = p.entry_statuses().collect();
        assert_eq!(statuses, vec![Status::Completed, Status::InProgress]);

        p.cull_finished();
        assert_eq!(p.len(), 1);
    }

    #[test]
    fn test_busy_prefers_personally_busy() {
        let w = world();
        let agent = Handle::new(crate::core::types::SimId(1));
        let p = ParallelAction::new(
            "busy",
            vec![
                Box::new(FixedAction::busy(Status::InProgress, Busy::WaitingForOther))
                    as Box<dyn Action>,
                Box::new(FixedAction::busy(Status::InProgress, Busy::PersonallyBusy)),
            ],
        );
        assert_eq!(p.is_busy(agent, &w, false).busy, Busy::PersonallyBusy);
    }

    #[test]
    fn test_retain_by_mask() {
        let mut p = parallel_of(&[Status::InProgress, Status::InProgress, Status::InProgress]);
        p.retain_by_mask(&[true, false, true]);
        assert_eq!(p.len(), 2);
    }
}
