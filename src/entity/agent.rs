//! Agents and their counted sub-entities
//!
//! A `SimAgent` is a positioned group of `SimEntity` blocks; each block is a
//! count of identical units pooling accumulated damage and sharing immutable
//! type data.

use std::sync::Arc;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::core::types::{Handle, SimId, Team, Vec2};
use crate::entity::weapons::{UnitClass, Weapon};

/// Shared, immutable per-type data for a sub-entity block.
///
/// Held behind an `Arc`: world-state clones share it, which is safe because
/// nothing ever mutates it after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityTypeData {
    pub name: String,
    pub class: UnitClass,
    pub max_health_per_unit: f64,
    /// World units per hour.
    pub speed: f64,
    pub weapons: Vec<Weapon>,
}

/// A block of identical units pooling damage
#[derive(Debug, Clone, PartialEq)]
pub struct SimEntity {
    pub count: u32,
    /// Accumulated damage across the whole block, clamped to total health.
    pub damage: f64,
    pub type_data: Arc<EntityTypeData>,
}

impl SimEntity {
    pub fn new(count: u32, type_data: Arc<EntityTypeData>) -> Self {
        Self {
            count,
            damage: 0.0,
            type_data,
        }
    }

    pub fn max_total_health(&self) -> f64 {
        self.count as f64 * self.type_data.max_health_per_unit
    }

    pub fn remaining_health(&self) -> f64 {
        (self.max_total_health() - self.damage).max(0.0)
    }

    /// Active iff `count * maxHealthPerUnit > damage`.
    pub fn is_active(&self) -> bool {
        self.max_total_health() > self.damage
    }

    /// Units still standing, given pooled damage.
    pub fn active_count(&self) -> u32 {
        let per_unit = self.type_data.max_health_per_unit;
        if per_unit <= 0.0 {
            return 0;
        }
        let destroyed = (self.damage / per_unit).floor() as u32;
        self.count.saturating_sub(destroyed)
    }

    pub fn can_fire(&self) -> bool {
        self.is_active() && !self.type_data.weapons.is_empty()
    }

    /// Apply damage, clamped so accumulated damage never exceeds the
    /// block's total health.
    pub fn apply_damage(&mut self, amount: f64) {
        self.damage = (self.damage + amount.max(0.0)).min(self.max_total_health());
    }
}

/// A team-scoped last-known-position record
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub position: Vec2,
    /// Simulated-seconds timestamp when the observation was made.
    pub observed_at: f64,
}

/// A positioned combat agent: an ordered list of sub-entity blocks
#[derive(Debug, Clone, PartialEq)]
pub struct SimAgent {
    pub id: SimId,
    pub name: String,
    pub team: Team,
    pub position: Vec2,
    /// Facing in radians.
    pub heading: f64,
    pub visual_range: f64,
    /// World units per hour.
    pub max_speed: f64,
    pub entities: Vec<SimEntity>,
    /// Where each observing team last saw this agent.
    observed_by: AHashMap<Team, Observation>,
}

impl SimAgent {
    pub fn new(name: impl Into<String>, team: Team, position: Vec2) -> Self {
        Self {
            id: SimId::INVALID,
            name: name.into(),
            team,
            position,
            heading: 0.0,
            visual_range: 10.0,
            max_speed: 10.0,
            entities: Vec::new(),
            observed_by: AHashMap::new(),
        }
    }

    pub fn with_visual_range(mut self, range: f64) -> Self {
        self.visual_range = range;
        self
    }

    pub fn with_max_speed(mut self, speed: f64) -> Self {
        self.max_speed = speed;
        self
    }

    pub fn with_entity(mut self, entity: SimEntity) -> Self {
        self.entities.push(entity);
        self
    }

    pub fn handle(&self) -> Handle<SimAgent> {
        Handle::new(self.id)
    }

    /// Active iff any sub-entity is active. Derived, never stored.
    pub fn is_active(&self) -> bool {
        self.entities.iter().any(SimEntity::is_active)
    }

    /// Can-fire iff any sub-entity can fire. Derived, never stored.
    pub fn can_fire(&self) -> bool {
        self.entities.iter().any(SimEntity::can_fire)
    }

    pub fn total_remaining_health(&self) -> f64 {
        self.entities.iter().map(SimEntity::remaining_health).sum()
    }

    pub fn total_active_count(&self) -> u32 {
        self.entities.iter().map(SimEntity::active_count).sum()
    }

    /// Record that `by` saw this agent at `position` at time `at`.
    pub fn record_observation(&mut self, by: Team, position: Vec2, at: f64) {
        self.observed_by.insert(
            by,
            Observation {
                position,
                observed_at: at,
            },
        );
    }

    pub fn observation_by(&self, team: Team) -> Option<&Observation> {
        self.observed_by.get(&team)
    }

    /// Cached position as seen by `team`, usable only within `max_age`
    /// simulated seconds of `now`.
    pub fn observed_position(&self, team: Team, now: f64, max_age: f64) -> Option<Vec2> {
        let obs = self.observed_by.get(&team)?;
        if now - obs.observed_at <= max_age {
            Some(obs.position)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn infantry_type() -> Arc<EntityTypeData> {
        Arc::new(EntityTypeData {
            name: "rifle squad".into(),
            class: UnitClass::Infantry,
            max_health_per_unit: 10.0,
            speed: 5.0,
            weapons: vec![Weapon::new("rifle", 0.0, 2.0).with_dps(UnitClass::Infantry, 5.0)],
        })
    }

    fn unarmed_type() -> Arc<EntityTypeData> {
        Arc::new(EntityTypeData {
            name: "truck".into(),
            class: UnitClass::Recon,
            max_health_per_unit: 4.0,
            speed: 40.0,
            weapons: vec![],
        })
    }

    #[test]
    fn test_entity_active_boundary() {
        let mut e = SimEntity::new(3, infantry_type());
        assert!(e.is_active());
        e.apply_damage(29.9);
        assert!(e.is_active());
        e.apply_damage(0.1);
        assert!(!e.is_active());
    }

    #[test]
    fn test_damage_clamped_to_total_health() {
        let mut e = SimEntity::new(2, infantry_type());
        e.apply_damage(1000.0);
        assert_eq!(e.damage, 20.0);
        assert_eq!(e.remaining_health(), 0.0);
    }

    #[test]
    fn test_negative_damage_ignored() {
        let mut e = SimEntity::new(2, infantry_type());
        e.apply_damage(-5.0);
        assert_eq!(e.damage, 0.0);
    }

    #[test]
    fn test_active_count_from_pooled_damage() {
        let mut e = SimEntity::new(4, infantry_type());
        assert_eq!(e.active_count(), 4);
        e.apply_damage(10.0);
        assert_eq!(e.active_count(), 3);
        e.apply_damage(5.0); // 15 total: one destroyed, one wounded
        assert_eq!(e.active_count(), 3);
        e.apply_damage(25.0);
        assert_eq!(e.active_count(), 0);
    }

    #[test]
    fn test_agent_derived_flags() {
        let mut agent = SimAgent::new("A", Team::Red, Vec2::ZERO)
            .with_entity(SimEntity::new(1, infantry_type()))
            .with_entity(SimEntity::new(1, unarmed_type()));
        assert!(agent.is_active());
        assert!(agent.can_fire());

        // Destroy the armed block; agent stays active but cannot fire.
        agent.entities[0].apply_damage(10.0);
        assert!(agent.is_active());
        assert!(!agent.can_fire());

        agent.entities[1].apply_damage(4.0);
        assert!(!agent.is_active());
    }

    #[test]
    fn test_observation_aging() {
        let mut agent = SimAgent::new("B", Team::Blue, Vec2::new(3.0, 0.0));
        agent.record_observation(Team::Red, agent.position, 100.0);

        assert_eq!(
            agent.observed_position(Team::Red, 100.0, 0.0),
            Some(Vec2::new(3.0, 0.0))
        );
        assert_eq!(agent.observed_position(Team::Red, 105.0, 10.0), Some(Vec2::new(3.0, 0.0)));
        assert_eq!(agent.observed_position(Team::Red, 120.0, 10.0), None);
        // Other team has no observation at all.
        assert_eq!(agent.observed_position(Team::Blue, 100.0, 10.0), None);
    }
}
