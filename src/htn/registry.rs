//! Goal catalog: named goal kinds and their parameter validation
//!
//! Scenario files name a goal kind plus parameters; `build_goal` validates
//! them up front and produces the root method. Bad parameters fail here,
//! before any world is cloned or stepped.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::core::error::{Result, SimError};
use crate::core::types::{Circle, Handle, Team, Vec2};
use crate::entity::agent::SimAgent;
use crate::htn::{AttackCircleMethod, ClearAllEnemiesMethod, Method, NProngsMethod};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalKind {
    ClearAllEnemies,
    AttackCircle,
    NProngs,
}

/// Parameters as they arrive from a scenario file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalParams {
    pub kind: GoalKind,
    #[serde(default)]
    pub target_circle: Option<Circle>,
    #[serde(default)]
    pub waypoint_options: Vec<Vec2>,
    #[serde(default)]
    pub num_prongs: Option<usize>,
}

/// Static descriptor for one goal kind.
pub struct GoalDescriptor {
    pub kind: GoalKind,
    pub name: &'static str,
    pub summary: &'static str,
}

static CATALOG: OnceLock<Vec<GoalDescriptor>> = OnceLock::new();

pub fn goal_catalog() -> &'static [GoalDescriptor] {
    CATALOG.get_or_init(|| {
        vec![
            GoalDescriptor {
                kind: GoalKind::ClearAllEnemies,
                name: "clear_all_enemies",
                summary: "destroy every active enemy agent, branching on elimination order",
            },
            GoalDescriptor {
                kind: GoalKind::AttackCircle,
                name: "attack_circle",
                summary: "seize a circle: massed, pincer, or barrage-led assault",
            },
            GoalDescriptor {
                kind: GoalKind::NProngs,
                name: "n_prongs",
                summary: "converge on a circle along N distinct waypoint routes",
            },
        ]
    })
}

/// Validate `params` and build the root method for `team`'s `actors`.
pub fn build_goal(
    team: Team,
    actors: Vec<Handle<SimAgent>>,
    params: &GoalParams,
) -> Result<Box<dyn Method>> {
    if actors.is_empty() {
        return Err(SimError::GoalConfiguration(
            "goal requires at least one actor".into(),
        ));
    }
    match params.kind {
        GoalKind::ClearAllEnemies => Ok(Box::new(ClearAllEnemiesMethod::new(team, actors))),
        GoalKind::AttackCircle => {
            let zone = params.target_circle.ok_or_else(|| {
                SimError::GoalConfiguration("attack_circle requires target_circle".into())
            })?;
            Ok(Box::new(AttackCircleMethod::new(team, actors, zone)))
        }
        GoalKind::NProngs => {
            let zone = params.target_circle.ok_or_else(|| {
                SimError::GoalConfiguration("n_prongs requires target_circle".into())
            })?;
            let prongs = params.num_prongs.ok_or_else(|| {
                SimError::GoalConfiguration("n_prongs requires num_prongs".into())
            })?;
            if prongs == 0 {
                return Err(SimError::GoalConfiguration(
                    "num_prongs must be at least 1".into(),
                ));
            }
            if params.waypoint_options.len() < prongs {
                return Err(SimError::GoalConfiguration(format!(
                    "{} waypoint options cannot support {} prongs",
                    params.waypoint_options.len(),
                    prongs
                )));
            }
            Ok(Box::new(NProngsMethod::new(
                team,
                actors,
                zone,
                params.waypoint_options.clone(),
                prongs,
            )))
        }
    }
}
