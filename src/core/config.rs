//! Planner configuration with documented constants
//!
//! All tunable search parameters are collected here with explanations of
//! their purpose and how they interact with each other.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::Result;

/// Configuration for the many-worlds planner
///
/// These values bound the branching search; none of them changes what a
/// plan means, only how much of the future gets explored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Simulated seconds advanced per tick of a branch.
    ///
    /// Smaller steps give finer fork timing at the cost of more ticks per
    /// branch. Fork discovery and budget checks happen once per step.
    pub seconds_per_step: f64,

    /// Stop the search after this many completed plans have been emitted.
    pub max_plans: usize,

    /// Per-branch simulated-time cap, in simulated seconds.
    ///
    /// A branch whose goal is still in progress past this horizon is
    /// abandoned (only that branch - the search continues).
    pub max_sim_seconds: f64,

    /// Optional wall-clock cap in real seconds, measured from planner
    /// creation. `None` means unbounded.
    pub wall_clock_seconds: Option<f64>,

    /// Step independent branches on rayon worker threads.
    ///
    /// Only moves where a branch runs; each branch is still stepped by a
    /// single thread and shares nothing after its fork point.
    pub multithread: bool,

    /// Remove enemy-team behaviors from the root action tree before
    /// planning, so plans never rely on scripted enemy cooperation.
    pub strip_enemy_actions: bool,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            seconds_per_step: 1.0,
            max_plans: 32,
            max_sim_seconds: 4.0 * 3600.0,
            wall_clock_seconds: None,
            multithread: false,
            strip_enemy_actions: true,
        }
    }
}

impl PlannerConfig {
    /// Load a config from a TOML string. Missing fields keep defaults.
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load a config from a TOML file on disk.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_sane() {
        let cfg = PlannerConfig::default();
        assert!(cfg.seconds_per_step > 0.0);
        assert!(cfg.max_plans > 0);
        assert!(cfg.max_sim_seconds > cfg.seconds_per_step);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let cfg = PlannerConfig::from_toml("max_plans = 4\nmultithread = true\n").unwrap();
        assert_eq!(cfg.max_plans, 4);
        assert!(cfg.multithread);
        assert_eq!(cfg.seconds_per_step, PlannerConfig::default().seconds_per_step);
    }

    #[test]
    fn test_bad_toml_is_an_error() {
        assert!(PlannerConfig::from_toml("max_plans = \"lots\"").is_err());
    }
}
