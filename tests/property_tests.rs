//! Property-based tests for the simulation invariants

use std::sync::Arc;

use proptest::prelude::*;

use std::any::Any;

use manyworlds::action::{
    Action, ActionKey, Busy, BusyReport, NoOpAction, ParallelAction, SequentialAction, Status,
    StatusReport,
};
use manyworlds::combat::direct_fire;
use manyworlds::core::error::Result as SimResult;
use manyworlds::core::types::{Handle, Rect, Team, Vec2};
use manyworlds::entity::agent::{EntityTypeData, SimAgent, SimEntity};
use manyworlds::entity::weapons::{UnitClass, Weapon};
use manyworlds::world::WorldState;

/// Leaf that always reports one fixed status.
#[derive(Clone)]
struct FixedStatus {
    key: ActionKey,
    status: Status,
}

impl FixedStatus {
    fn new(status: Status) -> Self {
        Self {
            key: ActionKey::fresh(),
            status,
        }
    }
}

impl Action for FixedStatus {
    fn key(&self) -> ActionKey {
        self.key
    }

    fn name(&self) -> &str {
        "fixed"
    }

    fn status(&self, _world: &WorldState, _explain: bool) -> StatusReport {
        StatusReport::plain(self.status)
    }

    fn is_busy(&self, _agent: Handle<SimAgent>, _world: &WorldState, _explain: bool) -> BusyReport {
        BusyReport::plain(Busy::NotBusy)
    }

    fn execute(&mut self, _world: &mut WorldState) -> SimResult<()> {
        Ok(())
    }

    fn update_for_external_change(&mut self, _world: &WorldState) {}

    fn enumerate_primitives<'a>(&'a self, _world: &WorldState, out: &mut Vec<&'a dyn Action>) {
        out.push(self);
    }

    fn maybe_fork_world(&self, _world: &WorldState) -> SimResult<Option<Vec<WorldState>>> {
        Ok(None)
    }

    fn clone_action(&self) -> Box<dyn Action> {
        Box::new(self.clone())
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

fn status_strategy() -> impl Strategy<Value = Status> {
    prop_oneof![
        Just(Status::InProgress),
        Just(Status::Completed),
        Just(Status::Impossible),
        Just(Status::Undefined),
    ]
}

fn shooter_type(dps: f64) -> Arc<EntityTypeData> {
    Arc::new(EntityTypeData {
        name: "shooters".into(),
        class: UnitClass::Infantry,
        max_health_per_unit: 10.0,
        speed: 5.0,
        weapons: vec![Weapon::new("gun", 0.0, 100.0).with_dps(UnitClass::Infantry, dps)],
    })
}

fn soft_type(health: f64) -> Arc<EntityTypeData> {
    Arc::new(EntityTypeData {
        name: "targets".into(),
        class: UnitClass::Infantry,
        max_health_per_unit: health,
        speed: 5.0,
        weapons: vec![],
    })
}

proptest! {
    /// Mutating a clone never changes any observable of the original.
    #[test]
    fn prop_clone_isolation(
        positions in prop::collection::vec((-500.0..500.0f64, -500.0..500.0f64), 1..8),
        shove in -100.0..100.0f64,
    ) {
        let mut w = WorldState::new(Rect::default(), Team::Red, Some(1));
        for (i, (x, y)) in positions.iter().enumerate() {
            let team = if i % 2 == 0 { Team::Red } else { Team::Blue };
            w.add(
                SimAgent::new(format!("a{i}"), team, Vec2::new(*x, *y))
                    .with_entity(SimEntity::new(1, soft_type(10.0))),
            )
            .unwrap();
        }

        let mut copy = w.clone_world();
        let handles: Vec<_> = copy.agents().map(|a| a.handle()).collect();
        for h in handles {
            let agent = copy.get_mut(h).unwrap();
            agent.position = agent.position + Vec2::new(shove, shove);
            agent.entities[0].apply_damage(3.0);
        }

        for (agent, (x, y)) in w.agents().zip(positions.iter()) {
            prop_assert_eq!(agent.position, Vec2::new(*x, *y));
            prop_assert_eq!(agent.entities[0].damage, 0.0);
        }
    }

    /// Total damage from one direct-fire tick never exceeds the acting
    /// dps times shooters times dt, and never exceeds target max health.
    #[test]
    fn prop_direct_fire_energy_conservation(
        dps in 0.1..50.0f64,
        dt in 0.01..20.0f64,
        shooters in 1u32..5,
        target_health in 1.0..200.0f64,
    ) {
        let mut w = WorldState::new(Rect::default(), Team::Red, Some(1));
        let a = w
            .add(
                SimAgent::new("a", Team::Red, Vec2::ZERO)
                    .with_visual_range(50.0)
                    .with_entity(SimEntity::new(shooters, shooter_type(dps))),
            )
            .unwrap();
        let b = w
            .add(
                SimAgent::new("b", Team::Blue, Vec2::new(10.0, 0.0))
                    .with_visual_range(50.0)
                    .with_entity(SimEntity::new(1, soft_type(target_health))),
            )
            .unwrap();

        w.step(1.0).unwrap();
        direct_fire(&mut w, a, b, dt).unwrap();

        let dealt = w.get(b).unwrap().entities[0].damage;
        let budget = dps * shooters as f64 * dt;
        prop_assert!(dealt <= budget + 1e-6);
        prop_assert!(dealt <= target_health + 1e-6);
    }

    /// A sequential composite's completed-count is non-decreasing and
    /// never exceeds its queue length, no matter how often it refreshes.
    #[test]
    fn prop_sequential_cursor_monotone(
        steps in 1usize..6,
        refreshes in 1usize..10,
    ) {
        let w = WorldState::new(Rect::default(), Team::Red, Some(1));
        let queue: Vec<Box<dyn Action>> = (0..steps)
            .map(|i| Box::new(NoOpAction::new(format!("s{i}"))) as Box<dyn Action>)
            .collect();
        let mut seq = SequentialAction::new("queue", queue);

        let mut last = seq.completed_count();
        for _ in 0..refreshes {
            seq.update_for_external_change(&w);
            let now = seq.completed_count();
            prop_assert!(now >= last);
            prop_assert!(now <= steps);
            last = now;
        }
        prop_assert_eq!(seq.status(&w, false).status, Status::Completed);
    }

    /// A parallel composite's status obeys the priority rule for any mix
    /// and order of child statuses: the first failure decides, any
    /// remaining work keeps it in progress, otherwise it is complete.
    #[test]
    fn prop_parallel_aggregation_priority(
        statuses in prop::collection::vec(status_strategy(), 0..12),
    ) {
        let w = WorldState::new(Rect::default(), Team::Red, Some(1));
        let children: Vec<Box<dyn Action>> = statuses
            .iter()
            .map(|s| Box::new(FixedStatus::new(*s)) as Box<dyn Action>)
            .collect();
        let par = ParallelAction::new("mixed", children);

        let got = par.status(&w, false).status;
        let first_failure = statuses
            .iter()
            .find(|s| matches!(s, Status::Impossible | Status::Undefined));
        let expected = match first_failure {
            Some(s) => *s,
            None if statuses.contains(&Status::InProgress) => Status::InProgress,
            None => Status::Completed,
        };
        prop_assert_eq!(got, expected);
    }

    /// Stepping a world twice by `dt` always advances the clock by
    /// exactly `2 * dt`, independent of content.
    #[test]
    fn prop_clock_advances_exactly(dt in 0.1..100.0f64) {
        let mut w = WorldState::new(Rect::default(), Team::Red, Some(1));
        w.step(dt).unwrap();
        w.step(dt).unwrap();
        prop_assert!((w.elapsed() - 2.0 * dt).abs() < 1e-9);
        prop_assert!((w.since_last_step() - dt).abs() < 1e-9);
    }
}
