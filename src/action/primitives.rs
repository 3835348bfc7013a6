//! Atomic actions: move, direct attack, area fire, no-op
//!
//! Primitives own their actor handles and hold no nested action state, so
//! their deep copies are plain value copies. A primitive is busy for an
//! agent iff the agent is in its actor set and the action is in progress.

use std::any::Any;

use ahash::AHashMap;

use crate::action::{Action, ActionKey, Busy, BusyReport, Status, StatusReport};
use crate::combat;
use crate::core::cancel::CancelFlag;
use crate::core::error::Result;
use crate::core::types::{Circle, Handle, SimId, Vec2, SECONDS_PER_HOUR};
use crate::entity::agent::SimAgent;
use crate::world::movement::advance_along_path;
use crate::world::WorldState;

/// Instantly completed leaf; the fallback for methods with nothing to do.
#[derive(Clone)]
pub struct NoOpAction {
    key: ActionKey,
    name: String,
}

impl NoOpAction {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            key: ActionKey::fresh(),
            name: name.into(),
        }
    }
}

impl Action for NoOpAction {
    fn key(&self) -> ActionKey {
        self.key
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn status(&self, _world: &WorldState, explain: bool) -> StatusReport {
        if explain {
            StatusReport::decided(Status::Completed, self.key, &self.name, "nothing to do")
        } else {
            StatusReport::plain(Status::Completed)
        }
    }

    fn is_busy(&self, _agent: Handle<SimAgent>, _world: &WorldState, _explain: bool) -> BusyReport {
        BusyReport::plain(Busy::NotBusy)
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

/// Move a set of agents into a destination circle along service-provided
/// paths. Paths are computed lazily per actor and cached on the action.
#[derive(Clone)]
pub struct MoveAction {
    key: ActionKey,
    name: String,
    actors: Vec<Handle<SimAgent>>,
    destination: Circle,
    paths: AHashMap<SimId, Vec<Vec2>>,
    intent_drawn: bool,
}

impl MoveAction {
    pub fn new(
        name: impl Into<String>,
        actors: Vec<Handle<SimAgent>>,
        destination: Circle,
    ) -> Self {
        Self {
            key: ActionKey::fresh(),
            name: name.into(),
            actors,
            destination,
            paths: AHashMap::new(),
            intent_drawn: false,
        }
    }

    pub fn destination(&self) -> Circle {
        self.destination
    }

    fn active_actors<'w>(&self, world: &'w WorldState) -> Vec<&'w SimAgent> {
        self.actors
            .iter()
            .filter_map(|h| world.get_opt(*h))
            .filter(|a| a.is_active())
            .collect()
    }
}

impl Action for MoveAction {
    fn key(&self) -> ActionKey {
        self.key
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn status(&self, world: &WorldState, explain: bool) -> StatusReport {
        let active = self.active_actors(world);
        if active.is_empty() {
            return StatusReport::decided(
                Status::Impossible,
                self.key,
                &self.name,
                "no live actors to move",
            );
        }
        let arrived = active
            .iter()
            .filter(|a| self.destination.contains(a.position))
            .count();
        if arrived == active.len() {
            return if explain {
                StatusReport::decided(Status::Completed, self.key, &self.name, "all actors arrived")
            } else {
                StatusReport::plain(Status::Completed)
            };
        }
        if explain {
            StatusReport::decided(
                Status::InProgress,
                self.key,
                &self.name,
                format!("{}/{} actors arrived", arrived, active.len()),
            )
        } else {
            StatusReport::plain(Status::InProgress)
        }
    }

    fn is_busy(&self, agent: Handle<SimAgent>, world: &WorldState, explain: bool) -> BusyReport {
        if !self.actors.contains(&agent) {
            return BusyReport::plain(Busy::NotBusy);
        }
        if self.status(world, false).status != Status::InProgress {
            return BusyReport::plain(Busy::NotBusy);
        }
        let Some(actor) = world.get_opt(agent).filter(|a| a.is_active()) else {
            return BusyReport::plain(Busy::NotBusy);
        };
        if self.destination.contains(actor.position) {
            if explain {
                BusyReport::explained(Busy::WaitingForOther, "arrived, holding for the rest")
            } else {
                BusyReport::plain(Busy::WaitingForOther)
            }
        } else {
            BusyReport::plain(Busy::PersonallyBusy)
        }
    }

    fn execute(&mut self, world: &mut WorldState) -> Result<()> {
        let hours = world.since_last_step() / SECONDS_PER_HOUR;
        let actors = self.actors.clone();
        for handle in actors {
            let Some(agent) = world.get_opt(handle) else {
                continue;
            };
            if !agent.is_active() || self.destination.contains(agent.position) {
                continue;
            }
            let position = agent.position;
            let speed = agent.max_speed;
            let team = agent.team;

            if !self.paths.contains_key(&handle.id()) {
                let planner = std::sync::Arc::clone(&world.services().path_planner);
                let path = match planner.get_path(position, self.destination.center, &CancelFlag::new())
                {
                    Ok(path) => path,
                    Err(err) => {
                        tracing::warn!(actor = %handle.id(), %err, "path service failed; going direct");
                        vec![position, self.destination.center]
                    }
                };
                if !self.intent_drawn {
                    world.services().drawer.draw_path(team, &path);
                    world.services().drawer.draw_circle(team, &self.destination);
                    self.intent_drawn = true;
                }
                self.paths.insert(handle.id(), path);
            }

            let path = &self.paths[&handle.id()];
            let outcome = advance_along_path(position, path, &self.destination, speed * hours);
            let moved = outcome.position - position;
            let agent = world.get_mut(handle)?;
            agent.position = outcome.position;
            if moved.length() > 1e-9 {
                agent.heading = moved.heading();
            }
        }
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
        Box::new(self.clone())
    }

    fn find_by_key(&self, key: ActionKey) -> Option<&dyn Action> {
        (key == self.key).then_some(self as &dyn Action)
    }

    fn find_by_key_mut(&mut self, key: ActionKey) -> Option<&mut dyn Action> {
        (key == self.key).then_some(self as &mut dyn Action)
    }

    fn actors(&self) -> &[Handle<SimAgent>] {
        &self.actors
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Direct-fire a target agent every tick until it stops being active.
#[derive(Clone)]
pub struct AttackAction {
    key: ActionKey,
    name: String,
    actors: Vec<Handle<SimAgent>>,
    target: Handle<SimAgent>,
}

impl AttackAction {
    pub fn new(
        name: impl Into<String>,
        actors: Vec<Handle<SimAgent>>,
        target: Handle<SimAgent>,
    ) -> Self {
        Self {
            key: ActionKey::fresh(),
            name: name.into(),
            actors,
            target,
        }
    }

    pub fn target(&self) -> Handle<SimAgent> {
        self.target
    }
}

impl Action for AttackAction {
    fn key(&self) -> ActionKey {
        self.key
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn status(&self, world: &WorldState, explain: bool) -> StatusReport {
        match world.get_opt(self.target) {
            None => StatusReport::decided(
                Status::Completed,
                self.key,
                &self.name,
                "target no longer exists",
            ),
            Some(target) if !target.is_active() => {
                if explain {
                    StatusReport::decided(Status::Completed, self.key, &self.name, "target destroyed")
                } else {
                    StatusReport::plain(Status::Completed)
                }
            }
            Some(_) => {
                let any_active = self
                    .actors
                    .iter()
                    .filter_map(|h| world.get_opt(*h))
                    .any(|a| a.is_active() && a.can_fire());
                if !any_active {
                    StatusReport::decided(
                        Status::Impossible,
                        self.key,
                        &self.name,
                        "no live shooters left",
                    )
                } else if explain {
                    StatusReport::decided(Status::InProgress, self.key, &self.name, "target still active")
                } else {
                    StatusReport::plain(Status::InProgress)
                }
            }
        }
    }

    fn is_busy(&self, agent: Handle<SimAgent>, world: &WorldState, explain: bool) -> BusyReport {
        if !self.actors.contains(&agent) {
            return BusyReport::plain(Busy::NotBusy);
        }
        if self.status(world, false).status != Status::InProgress {
            return BusyReport::plain(Busy::NotBusy);
        }
        match world.get_opt(agent) {
            Some(a) if a.is_active() && a.can_fire() => {
                if explain {
                    BusyReport::explained(Busy::PersonallyBusy, "engaging target")
                } else {
                    BusyReport::plain(Busy::PersonallyBusy)
                }
            }
            Some(a) if a.is_active() => BusyReport::plain(Busy::WaitingForOther),
            _ => BusyReport::plain(Busy::NotBusy),
        }
    }

    fn execute(&mut self, world: &mut WorldState) -> Result<()> {
        let dt = world.since_last_step();
        if dt <= 0.0 {
            return Ok(());
        }
        let actors = self.actors.clone();
        for handle in actors {
            let alive = world
                .get_opt(handle)
                .map(|a| a.is_active() && a.can_fire())
                .unwrap_or(false);
            if !alive {
                continue;
            }
            if world.get_opt(self.target).map(SimAgent::is_active) != Some(true) {
                break;
            }
            combat::direct_fire(world, handle, self.target, dt)?;
        }
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
        Box::new(self.clone())
    }

    fn find_by_key(&self, key: ActionKey) -> Option<&dyn Action> {
        (key == self.key).then_some(self as &dyn Action)
    }

    fn find_by_key_mut(&mut self, key: ActionKey) -> Option<&mut dyn Action> {
        (key == self.key).then_some(self as &mut dyn Action)
    }

    fn actors(&self) -> &[Handle<SimAgent>] {
        &self.actors
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Blind area bombardment of a circle with every splash-capable weapon the
/// actors carry, until no active enemy remains inside.
#[derive(Clone)]
pub struct AreaFireAction {
    key: ActionKey,
    name: String,
    actors: Vec<Handle<SimAgent>>,
    target: Circle,
    intent_drawn: bool,
}

impl AreaFireAction {
    pub fn new(name: impl Into<String>, actors: Vec<Handle<SimAgent>>, target: Circle) -> Self {
        Self {
            key: ActionKey::fresh(),
            name: name.into(),
            actors,
            target,
            intent_drawn: false,
        }
    }

    fn has_area_weapons(&self, world: &WorldState) -> bool {
        self.actors
            .iter()
            .filter_map(|h| world.get_opt(*h))
            .filter(|a| a.is_active())
            .flat_map(|a| a.entities.iter())
            .filter(|e| e.is_active())
            .flat_map(|e| e.type_data.weapons.iter())
            .any(|w| w.splash_radius.is_some())
    }

    fn enemies_remain(&self, world: &WorldState) -> bool {
        let Some(team) = self
            .actors
            .iter()
            .filter_map(|h| world.get_opt(*h))
            .map(|a| a.team)
            .next()
        else {
            return false;
        };
        world
            .agents()
            .any(|a| a.team != team && a.is_active() && self.target.contains(a.position))
    }
}

impl Action for AreaFireAction {
    fn key(&self) -> ActionKey {
        self.key
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn status(&self, world: &WorldState, explain: bool) -> StatusReport {
        let any_active = self
            .actors
            .iter()
            .filter_map(|h| world.get_opt(*h))
            .any(SimAgent::is_active);
        if !any_active {
            return StatusReport::decided(Status::Impossible, self.key, &self.name, "no live actors");
        }
        if !self.has_area_weapons(world) {
            return StatusReport::decided(
                Status::Impossible,
                self.key,
                &self.name,
                "no area weapons available",
            );
        }
        if !self.enemies_remain(world) {
            return StatusReport::plain(Status::Completed);
        }
        if explain {
            StatusReport::decided(Status::InProgress, self.key, &self.name, "enemies remain in zone")
        } else {
            StatusReport::plain(Status::InProgress)
        }
    }

    fn is_busy(&self, agent: Handle<SimAgent>, world: &WorldState, _explain: bool) -> BusyReport {
        if !self.actors.contains(&agent) {
            return BusyReport::plain(Busy::NotBusy);
        }
        if self.status(world, false).status == Status::InProgress {
            BusyReport::plain(Busy::PersonallyBusy)
        } else {
            BusyReport::plain(Busy::NotBusy)
        }
    }

    fn execute(&mut self, world: &mut WorldState) -> Result<()> {
        let dt = world.since_last_step();
        if dt <= 0.0 {
            return Ok(());
        }
        let actors = self.actors.clone();
        for handle in actors {
            let Some(agent) = world.get_opt(handle) else {
                continue;
            };
            if !agent.is_active() {
                continue;
            }
            let team = agent.team;
            let distance = agent.position.distance(&self.target.center);
            // Snapshot the firing solutions before mutating the world.
            let volleys: Vec<(crate::entity::weapons::Weapon, u32)> = agent
                .entities
                .iter()
                .filter(|e| e.is_active())
                .filter_map(|e| {
                    e.type_data
                        .weapons
                        .iter()
                        .find(|w| w.splash_radius.is_some() && w.in_range(distance))
                        .map(|w| (w.clone(), e.active_count()))
                })
                .collect();

            if !self.intent_drawn && !volleys.is_empty() {
                world.services().drawer.draw_circle(team, &self.target);
                self.intent_drawn = true;
            }
            for (weapon, shooters) in volleys {
                let radius = weapon.splash_radius.unwrap_or(0.0);
                combat::area_damage(world, self.target.center, radius, &weapon, shooters, dt)?;
            }
        }
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
        Box::new(self.clone())
    }

    fn find_by_key(&self, key: ActionKey) -> Option<&dyn Action> {
        (key == self.key).then_some(self as &dyn Action)
    }

    fn find_by_key_mut(&mut self, key: ActionKey) -> Option<&mut dyn Action> {
        (key == self.key).then_some(self as &mut dyn Action)
    }

    fn actors(&self) -> &[Handle<SimAgent>] {
        &self.actors
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
