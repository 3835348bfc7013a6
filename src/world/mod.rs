//! World state: the complete, independently cloneable simulation snapshot
//!
//! A `WorldState` owns an id-indexed table of entities, the simulated clock,
//! the root action tree, and a deterministic RNG. Cloning produces a
//! structurally identical but reference-disjoint copy; only immutable
//! configuration (entity type data, shared services) is shared.

pub mod movement;
pub mod vision;

use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ahash::AHashMap;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::action::parallel::ParallelAction;
use crate::action::{Action, ActionKey, StatusReport};
use crate::core::error::{Result, SimError};
use crate::core::types::{Handle, Rect, SimId, Team};
use crate::draw::{IntentDrawer, NullDrawer};
use crate::entity::agent::SimAgent;
use crate::entity::group::SimGroup;
use crate::pathfind::{PathPlanner, StraightLinePlanner};

/// Hard cap on entity-table growth. Purely a bug-detection tripwire for
/// runaway id allocation, not a normal operating limit.
pub const MAX_ENTITY_SLOTS: usize = 2000;

static NEXT_WORLD_UID: AtomicU64 = AtomicU64::new(1);

fn fresh_world_uid() -> u64 {
    NEXT_WORLD_UID.fetch_add(1, Ordering::Relaxed)
}

/// Everything stored in the entity table
#[derive(Debug, Clone, PartialEq)]
pub enum SimObject {
    Agent(SimAgent),
    Group(SimGroup),
}

impl SimObject {
    pub fn id(&self) -> SimId {
        match self {
            SimObject::Agent(a) => a.id,
            SimObject::Group(g) => g.id,
        }
    }

    fn assign_id(&mut self, id: SimId) {
        match self {
            SimObject::Agent(a) => a.id = id,
            SimObject::Group(g) => g.id = id,
        }
    }
}

/// Types that can live in a world state's entity table
pub trait WorldEntity: Sized {
    fn kind_name() -> &'static str;
    fn entity_id(&self) -> SimId;
    fn into_object(self) -> SimObject;
    fn from_object(obj: &SimObject) -> Option<&Self>;
    fn from_object_mut(obj: &mut SimObject) -> Option<&mut Self>;
}

impl WorldEntity for SimAgent {
    fn kind_name() -> &'static str {
        "agent"
    }
    fn entity_id(&self) -> SimId {
        self.id
    }
    fn into_object(self) -> SimObject {
        SimObject::Agent(self)
    }
    fn from_object(obj: &SimObject) -> Option<&Self> {
        match obj {
            SimObject::Agent(a) => Some(a),
            _ => None,
        }
    }
    fn from_object_mut(obj: &mut SimObject) -> Option<&mut Self> {
        match obj {
            SimObject::Agent(a) => Some(a),
            _ => None,
        }
    }
}

impl WorldEntity for SimGroup {
    fn kind_name() -> &'static str {
        "group"
    }
    fn entity_id(&self) -> SimId {
        self.id
    }
    fn into_object(self) -> SimObject {
        SimObject::Group(self)
    }
    fn from_object(obj: &SimObject) -> Option<&Self> {
        match obj {
            SimObject::Group(g) => Some(g),
            _ => None,
        }
    }
    fn from_object_mut(obj: &mut SimObject) -> Option<&mut Self> {
        match obj {
            SimObject::Group(g) => Some(g),
            _ => None,
        }
    }
}

/// External predicate evaluated during `step`; a firing check raises the
/// world's replan flag for the caller to poll.
pub trait ReplanCheck: Send + Sync {
    fn name(&self) -> &str;
    fn should_replan(&self, world: &WorldState) -> bool;
}

/// Read-only collaborators shared (not cloned) across world-state copies.
pub struct SharedServices {
    pub path_planner: Arc<dyn PathPlanner>,
    pub drawer: Arc<dyn IntentDrawer>,
    pub replan_checks: Vec<Arc<dyn ReplanCheck>>,
}

impl Default for SharedServices {
    fn default() -> Self {
        Self {
            path_planner: Arc::new(StraightLinePlanner),
            drawer: Arc::new(NullDrawer),
            replan_checks: Vec::new(),
        }
    }
}

/// The full simulation snapshot
pub struct WorldState {
    uid: u64,
    /// Slot `i` holds the entity with id `i`, or nothing. Slot 0 unused.
    slots: Vec<Option<SimObject>>,
    next_id: u32,
    elapsed: f64,
    since_last_step: f64,
    area: Rect,
    friendly_team: Team,
    rng: ChaCha8Rng,
    /// Root composite; executed every step. Detached only while stepping.
    root: Option<Box<ParallelAction>>,
    shared: Arc<SharedServices>,
    replan_requested: bool,
    team_cache: RefCell<AHashMap<Team, Arc<Vec<Handle<SimAgent>>>>>,
    group_cache: RefCell<AHashMap<SimId, Arc<Vec<Handle<SimAgent>>>>>,
}

impl WorldState {
    pub fn new(area: Rect, friendly_team: Team, seed: Option<u64>) -> Self {
        Self {
            uid: fresh_world_uid(),
            slots: vec![None],
            next_id: 1,
            elapsed: 0.0,
            since_last_step: 0.0,
            area,
            friendly_team,
            rng: ChaCha8Rng::seed_from_u64(seed.unwrap_or(0)),
            root: Some(Box::new(ParallelAction::new("root", Vec::new()))),
            shared: Arc::new(SharedServices::default()),
            replan_requested: false,
            team_cache: RefCell::new(AHashMap::new()),
            group_cache: RefCell::new(AHashMap::new()),
        }
    }

    /// Unique identifier distinguishing this copy from its fork lineage.
    pub fn uid(&self) -> u64 {
        self.uid
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn since_last_step(&self) -> f64 {
        self.since_last_step
    }

    pub fn area(&self) -> Rect {
        self.area
    }

    pub fn friendly_team(&self) -> Team {
        self.friendly_team
    }

    pub fn rng_mut(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    pub fn services(&self) -> &SharedServices {
        &self.shared
    }

    pub fn set_services(&mut self, services: Arc<SharedServices>) {
        self.shared = services;
    }

    pub fn replan_requested(&self) -> bool {
        self.replan_requested
    }

    pub fn clear_replan_request(&mut self) {
        self.replan_requested = false;
    }

    // ---- entity table ------------------------------------------------

    /// Resolve a handle or fail with `HandleNotFound`.
    pub fn get<T: WorldEntity>(&self, handle: Handle<T>) -> Result<&T> {
        self.get_opt(handle)
            .ok_or(SimError::HandleNotFound(handle.id()))
    }

    /// Resolve a handle, non-failing.
    pub fn get_opt<T: WorldEntity>(&self, handle: Handle<T>) -> Option<&T> {
        if !handle.is_valid() {
            return None;
        }
        self.slots
            .get(handle.id().index())?
            .as_ref()
            .and_then(T::from_object)
    }

    /// Mutable resolution. Invalidates derived caches, since the caller may
    /// change anything membership-relevant (team, damage, position).
    pub fn get_mut<T: WorldEntity>(&mut self, handle: Handle<T>) -> Result<&mut T> {
        self.invalidate_caches();
        if !handle.is_valid() {
            return Err(SimError::HandleNotFound(handle.id()));
        }
        self.slots
            .get_mut(handle.id().index())
            .and_then(Option::as_mut)
            .and_then(T::from_object_mut)
            .ok_or(SimError::HandleNotFound(handle.id()))
    }

    /// Insert an entity, assigning the next unused id if it has none.
    ///
    /// Re-adding an already-present equal entity is a warned no-op;
    /// a different entity at an occupied slot is a fatal id collision.
    pub fn add<T: WorldEntity>(&mut self, entity: T) -> Result<Handle<T>> {
        self.invalidate_caches();
        let mut obj = entity.into_object();
        let id = if obj.id().is_valid() {
            obj.id()
        } else {
            let id = SimId(self.next_id);
            obj.assign_id(id);
            id
        };

        let index = id.index();
        if index >= MAX_ENTITY_SLOTS {
            return Err(SimError::CapacityExceeded {
                id,
                cap: MAX_ENTITY_SLOTS,
            });
        }
        if index >= self.slots.len() {
            self.slots.resize_with(index + 1, || None);
        }

        match &self.slots[index] {
            Some(existing) if *existing == obj => {
                tracing::warn!(id = %id, "re-adding an identical entity; ignored");
            }
            Some(_) => return Err(SimError::IdCollision(id)),
            None => self.slots[index] = Some(obj),
        }

        if id.0 >= self.next_id {
            self.next_id = id.0 + 1;
        }
        Ok(Handle::new(id))
    }

    /// Null the slot. The id is never reclaimed.
    pub fn remove<T: WorldEntity>(&mut self, handle: Handle<T>) -> bool {
        self.invalidate_caches();
        let index = handle.id().index();
        if !handle.is_valid() || index >= self.slots.len() {
            return false;
        }
        match &self.slots[index] {
            Some(obj) if T::from_object(obj).is_some() => {
                self.slots[index] = None;
                true
            }
            _ => false,
        }
    }

    pub fn agents(&self) -> impl Iterator<Item = &SimAgent> {
        self.slots.iter().filter_map(|slot| match slot {
            Some(SimObject::Agent(a)) => Some(a),
            _ => None,
        })
    }

    /// Live agents of a team, cached lazily; invalidated by any mutation
    /// that could change membership.
    pub fn agents_on_team(&self, team: Team) -> Arc<Vec<Handle<SimAgent>>> {
        if let Some(cached) = self.team_cache.borrow().get(&team) {
            return Arc::clone(cached);
        }
        let roster: Arc<Vec<Handle<SimAgent>>> = Arc::new(
            self.agents()
                .filter(|a| a.team == team)
                .map(SimAgent::handle)
                .collect(),
        );
        self.team_cache
            .borrow_mut()
            .insert(team, Arc::clone(&roster));
        roster
    }

    /// Active (still fighting) agents of a team.
    pub fn active_agents_on_team(&self, team: Team) -> Vec<Handle<SimAgent>> {
        self.agents_on_team(team)
            .iter()
            .copied()
            .filter(|h| self.get_opt(*h).map(SimAgent::is_active).unwrap_or(false))
            .collect()
    }

    /// Active members of a group, cached by group id.
    pub fn active_group_members(
        &self,
        handle: Handle<SimGroup>,
    ) -> Result<Arc<Vec<Handle<SimAgent>>>> {
        if let Some(cached) = self.group_cache.borrow().get(&handle.id()) {
            return Ok(Arc::clone(cached));
        }
        let group = self.get(handle)?;
        let members: Arc<Vec<Handle<SimAgent>>> = Arc::new(
            group
                .iter()
                .filter(|h| self.get_opt(*h).map(SimAgent::is_active).unwrap_or(false))
                .collect(),
        );
        self.group_cache
            .borrow_mut()
            .insert(handle.id(), Arc::clone(&members));
        Ok(members)
    }

    fn invalidate_caches(&mut self) {
        self.team_cache.get_mut().clear();
        self.group_cache.get_mut().clear();
    }

    // ---- action tree -------------------------------------------------

    pub fn root(&self) -> &ParallelAction {
        self.root.as_ref().expect("root action detached mid-step")
    }

    pub fn root_mut(&mut self) -> &mut ParallelAction {
        self.root.as_mut().expect("root action detached mid-step")
    }

    /// Attach a behavior to the root composite; returns its key.
    pub fn attach_action(&mut self, action: Box<dyn Action>) -> ActionKey {
        let key = action.key();
        self.root_mut().push(action);
        key
    }

    /// Locate a node anywhere in the tree by its relocation key.
    pub fn find_action(&self, key: ActionKey) -> Option<&dyn Action> {
        self.root().find_by_key(key)
    }

    pub fn find_action_mut(&mut self, key: ActionKey) -> Option<&mut dyn Action> {
        self.root
            .as_mut()
            .expect("root action detached mid-step")
            .find_by_key_mut(key)
    }

    /// Status of a node located by key, with explanation.
    pub fn action_status(&self, key: ActionKey, explain: bool) -> Option<StatusReport> {
        self.find_action(key).map(|a| a.status(self, explain))
    }

    /// Remove root behaviors whose primitives involve any agent of `team`.
    pub fn strip_team_actions(&mut self, team: Team) {
        let mask: Vec<bool> = {
            let root = self.root.as_ref().expect("root action detached mid-step");
            root.entry_actions()
                .map(|action| {
                    let mut prims: Vec<&dyn Action> = Vec::new();
                    action.enumerate_primitives(self, &mut prims);
                    !prims.iter().any(|p| {
                        p.actors().iter().any(|h| {
                            self.get_opt(*h).map(|a| a.team == team).unwrap_or(false)
                        })
                    })
                })
                .collect()
        };
        self.root_mut().retain_by_mask(&mask);
    }

    // ---- simulation --------------------------------------------------

    /// Advance the clock, run perception, evaluate replan checks, then
    /// execute and refresh the root action tree for this tick.
    pub fn step(&mut self, seconds: f64) -> Result<()> {
        self.since_last_step = seconds;
        self.elapsed += seconds;

        let sightings = vision::compute_sightings(self);
        let now = self.elapsed;
        for sighting in sightings {
            // Direct slot write: observations never change team membership,
            // so the derived caches stay valid.
            if let Some(Some(SimObject::Agent(agent))) =
                self.slots.get_mut(sighting.target.id().index())
            {
                agent.record_observation(sighting.observer_team, sighting.position, now);
            }
        }

        let checks = Arc::clone(&self.shared);
        for check in &checks.replan_checks {
            if check.should_replan(self) {
                tracing::debug!(check = check.name(), "replan requested");
                self.replan_requested = true;
            }
        }

        let mut root = match self.root.take() {
            Some(root) => root,
            None => return Ok(()),
        };
        let result = root.execute(self);
        root.update_for_external_change(self);
        self.root = Some(root);
        result
    }

    /// Ask the action tree for a branch point. At most one node forks per
    /// tick: the first discovered fork request wins, and the rest re-check
    /// on the next tick of each resulting branch.
    pub fn maybe_fork(&self) -> Result<Option<Vec<WorldState>>> {
        match &self.root {
            Some(root) => root.maybe_fork_world(self),
            None => Ok(None),
        }
    }

    /// Deep, reference-disjoint duplicate. Entities and the action tree are
    /// cloned independently; derived caches start empty; the copy gets a
    /// fresh world uid so fork lineage stays distinguishable.
    pub fn clone_world(&self) -> WorldState {
        WorldState {
            uid: fresh_world_uid(),
            slots: self.slots.clone(),
            next_id: self.next_id,
            elapsed: self.elapsed,
            since_last_step: self.since_last_step,
            area: self.area,
            friendly_team: self.friendly_team,
            rng: self.rng.clone(),
            root: self.root.as_ref().map(|r| Box::new(r.deep_clone())),
            shared: Arc::clone(&self.shared),
            replan_requested: self.replan_requested,
            team_cache: RefCell::new(AHashMap::new()),
            group_cache: RefCell::new(AHashMap::new()),
        }
    }
}
