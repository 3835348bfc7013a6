//! Load scenarios from JSON files
//!
//! A scenario file lists agent records (team, position, sub-entities with
//! their weapons) plus the friendly team, an optional seed, and an
//! optional goal section. Loading produces a ready world with an empty
//! action tree and the handles of the friendly agents the goal will task.

use std::path::Path;
use std::sync::Arc;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::core::error::Result;
use crate::core::types::{Handle, Rect, Team, Vec2};
use crate::entity::agent::{EntityTypeData, SimAgent, SimEntity};
use crate::entity::weapons::{UnitClass, Weapon};
use crate::htn::GoalParams;
use crate::world::WorldState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeaponRecord {
    pub name: String,
    #[serde(default)]
    pub min_range: f64,
    pub max_range: f64,
    #[serde(default)]
    pub splash_radius: Option<f64>,
    /// Damage per second against each target class.
    pub dps: AHashMap<UnitClass, f64>,
}

impl WeaponRecord {
    fn build(&self) -> Weapon {
        let mut weapon = Weapon::new(&self.name, self.min_range, self.max_range);
        if let Some(radius) = self.splash_radius {
            weapon = weapon.with_splash(radius);
        }
        for (&class, &dps) in &self.dps {
            weapon = weapon.with_dps(class, dps);
        }
        weapon
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubEntityRecord {
    /// Type label, reused across agents for shared immutable type data.
    pub type_name: String,
    pub class: UnitClass,
    pub count: u32,
    pub health_per_unit: f64,
    pub speed: f64,
    #[serde(default)]
    pub weapons: Vec<WeaponRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRecord {
    pub name: String,
    pub team: Team,
    pub position: Vec2,
    #[serde(default)]
    pub heading: f64,
    pub visual_range: f64,
    pub max_speed: f64,
    pub entities: Vec<SubEntityRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioFile {
    #[serde(default)]
    pub name: Option<String>,
    pub friendly_team: Team,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub area: Option<Rect>,
    pub agents: Vec<AgentRecord>,
    #[serde(default)]
    pub goal: Option<GoalParams>,
}

/// A loaded scenario: the world plus the friendly handles a goal would
/// task and the goal section, if the file carried one.
pub struct Scenario {
    pub world: WorldState,
    pub friendly_agents: Vec<Handle<SimAgent>>,
    pub goal: Option<GoalParams>,
}

pub fn load_from_json(json: &str) -> Result<Scenario> {
    let file: ScenarioFile = serde_json::from_str(json)?;
    build_world(&file)
}

pub fn load_from_file(path: &Path) -> Result<Scenario> {
    let content = std::fs::read_to_string(path)?;
    load_from_json(&content)
}

pub fn build_world(file: &ScenarioFile) -> Result<Scenario> {
    let area = file.area.unwrap_or_default();
    let mut world = WorldState::new(area, file.friendly_team, file.seed);

    // Agents sharing a type label share one immutable type-data block.
    let mut type_cache: AHashMap<String, Arc<EntityTypeData>> = AHashMap::new();

    let mut friendly_agents = Vec::new();
    for record in &file.agents {
        let mut agent = SimAgent::new(&record.name, record.team, record.position)
            .with_visual_range(record.visual_range)
            .with_max_speed(record.max_speed);
        agent.heading = record.heading;

        for sub in &record.entities {
            let type_data = type_cache
                .entry(sub.type_name.clone())
                .or_insert_with(|| {
                    Arc::new(EntityTypeData {
                        name: sub.type_name.clone(),
                        class: sub.class,
                        max_health_per_unit: sub.health_per_unit,
                        speed: sub.speed,
                        weapons: sub.weapons.iter().map(WeaponRecord::build).collect(),
                    })
                })
                .clone();
            agent = agent.with_entity(SimEntity::new(sub.count, type_data));
        }

        let handle = world.add(agent)?;
        if record.team == file.friendly_team {
            friendly_agents.push(handle);
        }
    }

    tracing::info!(
        scenario = file.name.as_deref().unwrap_or("unnamed"),
        agents = file.agents.len(),
        friendly = friendly_agents.len(),
        "scenario loaded"
    );

    Ok(Scenario {
        world,
        friendly_agents,
        goal: file.goal.clone(),
    })
}
