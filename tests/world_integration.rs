//! World-state integration tests
//!
//! End-to-end checks of cloning, handle lookup, stepping, vision, and
//! action stripping against fully built worlds.

use std::sync::Arc;

use manyworlds::action::{
    Action, AttackAction, MoveAction, ParallelAction, SequentialAction, Status,
};
use manyworlds::core::types::{Circle, Rect, Team, Vec2};
use manyworlds::entity::agent::{EntityTypeData, SimAgent, SimEntity};
use manyworlds::entity::weapons::{UnitClass, Weapon};
use manyworlds::world::WorldState;

fn rifle_type() -> Arc<EntityTypeData> {
    Arc::new(EntityTypeData {
        name: "rifle squad".into(),
        class: UnitClass::Infantry,
        max_health_per_unit: 10.0,
        speed: 3600.0,
        weapons: vec![Weapon::new("rifle", 0.0, 5.0).with_dps(UnitClass::Infantry, 10.0)],
    })
}

fn unarmed_type() -> Arc<EntityTypeData> {
    Arc::new(EntityTypeData {
        name: "supply column".into(),
        class: UnitClass::Infantry,
        max_health_per_unit: 10.0,
        speed: 20.0,
        weapons: vec![],
    })
}

fn contested_world() -> WorldState {
    let mut w = WorldState::new(Rect::default(), Team::Red, Some(99));
    w.add(
        SimAgent::new("red", Team::Red, Vec2::ZERO)
            .with_visual_range(100.0)
            .with_max_speed(3600.0)
            .with_entity(SimEntity::new(2, rifle_type())),
    )
    .unwrap();
    w.add(
        SimAgent::new("blue", Team::Blue, Vec2::new(40.0, 0.0))
            .with_visual_range(100.0)
            .with_entity(SimEntity::new(1, unarmed_type())),
    )
    .unwrap();
    w
}

#[test]
fn test_clone_isolation_under_stepping() {
    let mut original = contested_world();
    original.step(1.0).unwrap();

    let mut copy = original.clone_world();
    assert_ne!(copy.uid(), original.uid());

    let before: Vec<(String, Vec2, f64)> = original
        .agents()
        .map(|a| (a.name.clone(), a.position, a.entities[0].damage))
        .collect();

    // Hammer the copy: move everyone, damage everyone, advance the clock.
    let handles: Vec<_> = copy.agents().map(|a| a.handle()).collect();
    for h in handles {
        let agent = copy.get_mut(h).unwrap();
        agent.position = agent.position + Vec2::new(500.0, 500.0);
        agent.entities[0].apply_damage(5.0);
    }
    copy.step(10.0).unwrap();

    let after: Vec<(String, Vec2, f64)> = original
        .agents()
        .map(|a| (a.name.clone(), a.position, a.entities[0].damage))
        .collect();
    assert_eq!(before, after);
}

#[test]
fn test_handle_round_trip() {
    let mut w = WorldState::new(Rect::default(), Team::Red, None);
    let h = w
        .add(SimAgent::new("fresh", Team::Red, Vec2::new(3.0, 4.0)))
        .unwrap();
    let agent = w.get(h).unwrap();
    assert_eq!(agent.name, "fresh");
    assert_eq!(agent.position, Vec2::new(3.0, 4.0));
    assert_eq!(agent.handle(), h);
}

#[test]
fn test_step_records_cross_team_observations() {
    let mut w = contested_world();
    w.step(1.0).unwrap();

    let blue = w.agents().find(|a| a.name == "blue").unwrap();
    let obs = blue.observation_by(Team::Red).unwrap();
    assert_eq!(obs.position, Vec2::new(40.0, 0.0));
    assert_eq!(obs.observed_at, w.elapsed());

    let red = w.agents().find(|a| a.name == "red").unwrap();
    assert!(red.observation_by(Team::Blue).is_some());
}

#[test]
fn test_attached_actions_drive_agents_through_steps() {
    let mut w = contested_world();
    let red = w.agents().find(|a| a.name == "red").unwrap().handle();
    let blue = w.agents().find(|a| a.name == "blue").unwrap().handle();

    let key = w.attach_action(Box::new(SequentialAction::new(
        "close and destroy",
        vec![
            Box::new(MoveAction::new(
                "close",
                vec![red],
                Circle::new(Vec2::new(40.0, 0.0), 4.0),
            )) as Box<dyn Action>,
            Box::new(AttackAction::new("destroy", vec![red], blue)),
        ],
    )));

    for _ in 0..120 {
        w.step(1.0).unwrap();
        if w.action_status(key, false).unwrap().status == Status::Completed {
            break;
        }
    }

    assert_eq!(
        w.action_status(key, false).unwrap().status,
        Status::Completed
    );
    assert!(!w.get(blue).unwrap().is_active());
}

#[test]
fn test_strip_team_actions_removes_only_enemy_behaviors() {
    let mut w = contested_world();
    let red = w.agents().find(|a| a.name == "red").unwrap().handle();
    let blue = w.agents().find(|a| a.name == "blue").unwrap().handle();

    w.attach_action(Box::new(MoveAction::new(
        "red orders",
        vec![red],
        Circle::new(Vec2::new(10.0, 0.0), 1.0),
    )));
    w.attach_action(Box::new(MoveAction::new(
        "blue orders",
        vec![blue],
        Circle::new(Vec2::new(-10.0, 0.0), 1.0),
    )));
    assert_eq!(w.root().len(), 2);

    w.strip_team_actions(Team::Blue);
    assert_eq!(w.root().len(), 1);
    assert_eq!(w.root().entry_actions().next().unwrap().name(), "red orders");
}

#[test]
fn test_cloned_world_preserves_action_tree_keys() {
    let mut w = contested_world();
    let red = w.agents().find(|a| a.name == "red").unwrap().handle();
    let key = w.attach_action(Box::new(ParallelAction::new(
        "orders",
        vec![Box::new(MoveAction::new(
            "patrol",
            vec![red],
            Circle::new(Vec2::new(5.0, 5.0), 1.0),
        )) as Box<dyn Action>],
    )));

    let copy = w.clone_world();
    let relocated = copy.find_action(key).unwrap();
    assert_eq!(relocated.name(), "orders");
    assert_eq!(relocated.child_actions().len(), 1);
}
