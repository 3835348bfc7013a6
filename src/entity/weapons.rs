//! Weapon and damage-profile value data
//!
//! Weapons are immutable: a damage-per-second table keyed by target class,
//! a usable range band, and an optional splash radius. Outcomes come from
//! table lookups, not modifiers.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// Target classification used by damage tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitClass {
    Infantry,
    Armor,
    Artillery,
    Recon,
}

/// Immutable weapon value data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weapon {
    pub name: String,
    /// Below this distance the weapon cannot be brought to bear.
    pub min_range: f64,
    pub max_range: f64,
    /// Some = area weapon; fires blind at a point with this blast radius.
    pub splash_radius: Option<f64>,
    /// Damage per second against each target class. Absent class = 0.
    pub dps: AHashMap<UnitClass, f64>,
}

impl Weapon {
    pub fn new(name: impl Into<String>, min_range: f64, max_range: f64) -> Self {
        Self {
            name: name.into(),
            min_range,
            max_range,
            splash_radius: None,
            dps: AHashMap::new(),
        }
    }

    pub fn with_dps(mut self, class: UnitClass, dps: f64) -> Self {
        self.dps.insert(class, dps);
        self
    }

    pub fn with_splash(mut self, radius: f64) -> Self {
        self.splash_radius = Some(radius);
        self
    }

    /// Range gating: usable iff `min_range <= d <= max_range`.
    pub fn in_range(&self, distance: f64) -> bool {
        self.min_range <= distance && distance <= self.max_range
    }

    pub fn dps_against(&self, class: UnitClass) -> f64 {
        self.dps.get(&class).copied().unwrap_or(0.0)
    }
}

/// Pick the usable weapon with the highest damage-per-second against the
/// target class. Ties break by encounter order (first found wins).
pub fn best_weapon<'a>(
    weapons: &'a [Weapon],
    distance: f64,
    target: UnitClass,
) -> Option<(&'a Weapon, f64)> {
    let mut best: Option<(&Weapon, f64)> = None;
    for weapon in weapons {
        if !weapon.in_range(distance) {
            continue;
        }
        let dps = weapon.dps_against(target);
        if dps <= 0.0 {
            continue;
        }
        match best {
            Some((_, best_dps)) if dps <= best_dps => {}
            _ => best = Some((weapon, dps)),
        }
    }
    best
}
