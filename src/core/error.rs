use thiserror::Error;

use crate::action::ActionKey;
use crate::core::types::SimId;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("handle {0} has no live entity of the expected kind")]
    HandleNotFound(SimId),

    #[error("id collision: slot {0} already holds a different live entity")]
    IdCollision(SimId),

    #[error("entity table would exceed the hard cap of {cap} slots (requested id {id})")]
    CapacityExceeded { id: SimId, cap: usize },

    #[error("goal configuration: {0}")]
    GoalConfiguration(String),

    #[error("action {0} not found in cloned world state")]
    ActionNotFound(ActionKey),

    #[error("no path found: {0}")]
    PathNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, SimError>;
