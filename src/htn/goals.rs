//! The built-in goal methods
//!
//! `ClearAllEnemiesMethod` is the recursive workhorse: each decomposition
//! picks a different enemy to eliminate first, then recurses on the rest.
//! `AttackCircleMethod` and `NProngsMethod` layer maneuver choices on top.
//! Small leaf methods at the bottom turn into concrete move/attack/area
//! actions when their goal node executes.

use crate::action::{
    Action, AreaFireAction, AttackAction, MoveAction, NoOpAction, ParallelAction, SequentialAction,
};
use crate::core::error::Result;
use crate::core::types::{Circle, Handle, Team, Vec2};
use crate::entity::agent::SimAgent;
use crate::htn::{Decomposition, Method, MethodId};
use crate::world::WorldState;

/// Engagement circles hug the target slightly inside weapon range so drift
/// and discrete ticks cannot strand actors at the boundary.
const ENGAGE_RANGE_FRACTION: f64 = 0.9;

/// Fallback engagement radius when no actor carries a ranged weapon.
const FALLBACK_ENGAGE_RADIUS: f64 = 1.0;

/// Window (simulated seconds) within which a cached enemy sighting is
/// trusted when siting an engagement circle. Older sightings fall back to
/// ground truth, which the planning simulation can see anyway.
const OBSERVATION_TRUST_WINDOW: f64 = 30.0;

fn longest_common_range(world: &WorldState, actors: &[Handle<SimAgent>]) -> f64 {
    actors
        .iter()
        .filter_map(|h| world.get_opt(*h))
        .filter(|a| a.is_active())
        .filter_map(|a| {
            a.entities
                .iter()
                .filter(|e| e.is_active())
                .flat_map(|e| e.type_data.weapons.iter())
                .filter(|w| !w.dps.is_empty())
                .map(|w| w.max_range)
                .fold(None, |acc: Option<f64>, r| {
                    Some(acc.map_or(r, |a| a.max(r)))
                })
        })
        .fold(None, |acc: Option<f64>, r| Some(acc.map_or(r, |a| a.min(r))))
        .unwrap_or(FALLBACK_ENGAGE_RADIUS)
}

/// All index combinations of size `k` from `0..n`, in lexicographic order.
pub(crate) fn combinations(n: usize, k: usize) -> Vec<Vec<usize>> {
    if k > n {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut current = Vec::with_capacity(k);
    fn recurse(start: usize, n: usize, k: usize, current: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
        if current.len() == k {
            out.push(current.clone());
            return;
        }
        for i in start..n {
            current.push(i);
            recurse(i + 1, n, k, current, out);
            current.pop();
        }
    }
    recurse(0, n, k, &mut current, &mut out);
    out
}

/// Destroy every active enemy of `team`, one at a time. Each decomposition
/// commits to a different elimination order head; the tail recurses.
pub struct ClearAllEnemiesMethod {
    id: MethodId,
    team: Team,
    actors: Vec<Handle<SimAgent>>,
}

impl ClearAllEnemiesMethod {
    pub fn new(team: Team, actors: Vec<Handle<SimAgent>>) -> Self {
        Self {
            id: MethodId::fresh(),
            team,
            actors,
        }
    }
}

impl Method for ClearAllEnemiesMethod {
    fn id(&self) -> MethodId {
        self.id
    }

    fn name(&self) -> &str {
        "clear all enemies"
    }

    fn decompose(&self, world: &WorldState) -> Vec<Decomposition> {
        world
            .active_agents_on_team(self.team.opponent())
            .into_iter()
            .filter_map(|h| world.get_opt(h))
            .map(|enemy| {
                Decomposition::sequential(
                    format!("eliminate {} first", enemy.name),
                    vec![
                        Box::new(EliminateAgentMethod::new(
                            self.actors.clone(),
                            enemy.handle(),
                        )) as Box<dyn Method>,
                        Box::new(ClearAllEnemiesMethod::new(self.team, self.actors.clone())),
                    ],
                )
            })
            .collect()
    }

    fn action_for_sim(&self, _world: &WorldState) -> Result<Box<dyn Action>> {
        // Leaf only when no enemies remain.
        Ok(Box::new(NoOpAction::new("area clear")))
    }

    fn clone_method(&self) -> Box<dyn Method> {
        Box::new(Self {
            id: self.id,
            team: self.team,
            actors: self.actors.clone(),
        })
    }
}

/// Close to weapon range with a named enemy and destroy it. Leaf.
pub struct EliminateAgentMethod {
    id: MethodId,
    actors: Vec<Handle<SimAgent>>,
    target: Handle<SimAgent>,
}

impl EliminateAgentMethod {
    pub fn new(actors: Vec<Handle<SimAgent>>, target: Handle<SimAgent>) -> Self {
        Self {
            id: MethodId::fresh(),
            actors,
            target,
        }
    }
}

impl Method for EliminateAgentMethod {
    fn id(&self) -> MethodId {
        self.id
    }

    fn name(&self) -> &str {
        "eliminate agent"
    }

    fn decompose(&self, _world: &WorldState) -> Vec<Decomposition> {
        Vec::new()
    }

    fn action_for_sim(&self, world: &WorldState) -> Result<Box<dyn Action>> {
        let Some(target) = world.get_opt(self.target).filter(|t| t.is_active()) else {
            return Ok(Box::new(NoOpAction::new("target already gone")));
        };
        let attacker_team = self
            .actors
            .iter()
            .filter_map(|h| world.get_opt(*h))
            .map(|a| a.team)
            .next();
        let aim_point = attacker_team
            .and_then(|team| {
                target.observed_position(team, world.elapsed(), OBSERVATION_TRUST_WINDOW)
            })
            .unwrap_or(target.position);
        let radius = longest_common_range(world, &self.actors) * ENGAGE_RANGE_FRACTION;
        let engage = Circle::new(aim_point, radius.max(FALLBACK_ENGAGE_RADIUS));
        let name = format!("eliminate {}", target.name);
        Ok(Box::new(SequentialAction::new(
            name.clone(),
            vec![
                Box::new(MoveAction::new(
                    format!("{}: close", name),
                    self.actors.clone(),
                    engage,
                )) as Box<dyn Action>,
                Box::new(AttackAction::new(
                    format!("{}: fire", name),
                    self.actors.clone(),
                    self.target,
                )),
            ],
        )))
    }

    fn clone_method(&self) -> Box<dyn Method> {
        Box::new(Self {
            id: self.id,
            actors: self.actors.clone(),
            target: self.target,
        })
    }
}

/// Walk a set of actors into a destination circle. Leaf.
pub struct MoveToZoneMethod {
    id: MethodId,
    actors: Vec<Handle<SimAgent>>,
    zone: Circle,
}

impl MoveToZoneMethod {
    pub fn new(actors: Vec<Handle<SimAgent>>, zone: Circle) -> Self {
        Self {
            id: MethodId::fresh(),
            actors,
            zone,
        }
    }
}

impl Method for MoveToZoneMethod {
    fn id(&self) -> MethodId {
        self.id
    }

    fn name(&self) -> &str {
        "move to zone"
    }

    fn decompose(&self, _world: &WorldState) -> Vec<Decomposition> {
        Vec::new()
    }

    fn action_for_sim(&self, _world: &WorldState) -> Result<Box<dyn Action>> {
        Ok(Box::new(MoveAction::new(
            "advance to zone",
            self.actors.clone(),
            self.zone,
        )))
    }

    fn clone_method(&self) -> Box<dyn Method> {
        Box::new(Self {
            id: self.id,
            actors: self.actors.clone(),
            zone: self.zone,
        })
    }
}

/// Suppress a zone with area weapons until nothing active remains inside.
/// Leaf; branches that lack splash weapons die at the action's status.
pub struct BarrageMethod {
    id: MethodId,
    actors: Vec<Handle<SimAgent>>,
    zone: Circle,
}

impl BarrageMethod {
    pub fn new(actors: Vec<Handle<SimAgent>>, zone: Circle) -> Self {
        Self {
            id: MethodId::fresh(),
            actors,
            zone,
        }
    }
}

impl Method for BarrageMethod {
    fn id(&self) -> MethodId {
        self.id
    }

    fn name(&self) -> &str {
        "barrage zone"
    }

    fn decompose(&self, _world: &WorldState) -> Vec<Decomposition> {
        Vec::new()
    }

    fn action_for_sim(&self, _world: &WorldState) -> Result<Box<dyn Action>> {
        Ok(Box::new(AreaFireAction::new(
            "barrage",
            self.actors.clone(),
            self.zone,
        )))
    }

    fn clone_method(&self) -> Box<dyn Method> {
        Box::new(Self {
            id: self.id,
            actors: self.actors.clone(),
            zone: self.zone,
        })
    }
}

/// Concurrent multi-column advance: each group walks its own chain of
/// circles. Leaf that materializes a parallel-of-sequences action.
pub struct SplitAdvanceMethod {
    id: MethodId,
    routes: Vec<(Vec<Handle<SimAgent>>, Vec<Circle>)>,
}

impl SplitAdvanceMethod {
    pub fn new(routes: Vec<(Vec<Handle<SimAgent>>, Vec<Circle>)>) -> Self {
        Self {
            id: MethodId::fresh(),
            routes,
        }
    }
}

impl Method for SplitAdvanceMethod {
    fn id(&self) -> MethodId {
        self.id
    }

    fn name(&self) -> &str {
        "split advance"
    }

    fn decompose(&self, _world: &WorldState) -> Vec<Decomposition> {
        Vec::new()
    }

    fn action_for_sim(&self, _world: &WorldState) -> Result<Box<dyn Action>> {
        let columns: Vec<Box<dyn Action>> = self
            .routes
            .iter()
            .enumerate()
            .map(|(i, (actors, legs))| {
                let moves: Vec<Box<dyn Action>> = legs
                    .iter()
                    .enumerate()
                    .map(|(leg, circle)| {
                        Box::new(MoveAction::new(
                            format!("column {} leg {}", i + 1, leg + 1),
                            actors.clone(),
                            *circle,
                        )) as Box<dyn Action>
                    })
                    .collect();
                Box::new(SequentialAction::new(format!("column {}", i + 1), moves))
                    as Box<dyn Action>
            })
            .collect();
        Ok(Box::new(ParallelAction::new("split advance", columns)))
    }

    fn clone_method(&self) -> Box<dyn Method> {
        Box::new(Self {
            id: self.id,
            routes: self.routes.clone(),
        })
    }
}

/// Take a circle and destroy everything hostile inside and around it.
pub struct AttackCircleMethod {
    id: MethodId,
    team: Team,
    actors: Vec<Handle<SimAgent>>,
    zone: Circle,
}

impl AttackCircleMethod {
    pub fn new(team: Team, actors: Vec<Handle<SimAgent>>, zone: Circle) -> Self {
        Self {
            id: MethodId::fresh(),
            team,
            actors,
            zone,
        }
    }

    fn flank_points(&self) -> (Circle, Circle) {
        let offset = Vec2::new(0.0, self.zone.radius * 2.0);
        (
            Circle::new(self.zone.center + offset, self.zone.radius),
            Circle::new(self.zone.center - offset, self.zone.radius),
        )
    }
}

impl Method for AttackCircleMethod {
    fn id(&self) -> MethodId {
        self.id
    }

    fn name(&self) -> &str {
        "attack circle"
    }

    fn decompose(&self, _world: &WorldState) -> Vec<Decomposition> {
        let mut out = vec![Decomposition::sequential(
            "massed assault",
            vec![
                Box::new(MoveToZoneMethod::new(self.actors.clone(), self.zone))
                    as Box<dyn Method>,
                Box::new(ClearAllEnemiesMethod::new(self.team, self.actors.clone())),
            ],
        )];

        if self.actors.len() >= 2 {
            let mid = self.actors.len() / 2;
            let (north, south) = self.flank_points();
            out.push(Decomposition::sequential(
                "pincer from the flanks",
                vec![
                    Box::new(SplitAdvanceMethod::new(vec![
                        (self.actors[..mid].to_vec(), vec![north, self.zone]),
                        (self.actors[mid..].to_vec(), vec![south, self.zone]),
                    ])) as Box<dyn Method>,
                    Box::new(ClearAllEnemiesMethod::new(self.team, self.actors.clone())),
                ],
            ));
        }

        out.push(Decomposition::sequential(
            "barrage then assault",
            vec![
                Box::new(BarrageMethod::new(self.actors.clone(), self.zone)) as Box<dyn Method>,
                Box::new(MoveToZoneMethod::new(self.actors.clone(), self.zone)),
                Box::new(ClearAllEnemiesMethod::new(self.team, self.actors.clone())),
            ],
        ));

        out
    }

    fn clone_method(&self) -> Box<dyn Method> {
        Box::new(Self {
            id: self.id,
            team: self.team,
            actors: self.actors.clone(),
            zone: self.zone,
        })
    }
}

/// Converge on a target zone along `num_prongs` distinct waypoint routes.
/// One decomposition per waypoint combination.
pub struct NProngsMethod {
    id: MethodId,
    team: Team,
    actors: Vec<Handle<SimAgent>>,
    target: Circle,
    waypoint_options: Vec<Vec2>,
    num_prongs: usize,
}

/// Prong waypoint circles get a fixed radius; arriving "at" a waypoint
/// means being within it.
const WAYPOINT_RADIUS: f64 = 5.0;

impl NProngsMethod {
    pub fn new(
        team: Team,
        actors: Vec<Handle<SimAgent>>,
        target: Circle,
        waypoint_options: Vec<Vec2>,
        num_prongs: usize,
    ) -> Self {
        Self {
            id: MethodId::fresh(),
            team,
            actors,
            target,
            waypoint_options,
            num_prongs,
        }
    }

    fn prong_routes(&self, picked: &[usize]) -> Vec<(Vec<Handle<SimAgent>>, Vec<Circle>)> {
        let mut groups: Vec<Vec<Handle<SimAgent>>> = vec![Vec::new(); self.num_prongs];
        for (i, actor) in self.actors.iter().enumerate() {
            groups[i % self.num_prongs].push(*actor);
        }
        picked
            .iter()
            .zip(groups)
            .filter(|(_, group)| !group.is_empty())
            .map(|(&w, group)| {
                let waypoint = Circle::new(self.waypoint_options[w], WAYPOINT_RADIUS);
                (group, vec![waypoint, self.target])
            })
            .collect()
    }
}

impl Method for NProngsMethod {
    fn id(&self) -> MethodId {
        self.id
    }

    fn name(&self) -> &str {
        "n-pronged attack"
    }

    fn decompose(&self, _world: &WorldState) -> Vec<Decomposition> {
        combinations(self.waypoint_options.len(), self.num_prongs)
            .into_iter()
            .map(|picked| {
                let labels: Vec<String> = picked.iter().map(|w| format!("w{}", w)).collect();
                Decomposition::sequential(
                    format!("prongs via {}", labels.join("+")),
                    vec![
                        Box::new(SplitAdvanceMethod::new(self.prong_routes(&picked)))
                            as Box<dyn Method>,
                        Box::new(ClearAllEnemiesMethod::new(self.team, self.actors.clone())),
                    ],
                )
            })
            .collect()
    }

    fn clone_method(&self) -> Box<dyn Method> {
        Box::new(Self {
            id: self.id,
            team: self.team,
            actors: self.actors.clone(),
            target: self.target,
            waypoint_options: self.waypoint_options.clone(),
            num_prongs: self.num_prongs,
        })
    }
}
