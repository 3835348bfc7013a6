pub mod agent;
pub mod group;
pub mod weapons;

pub use agent::{EntityTypeData, Observation, SimAgent, SimEntity};
pub use group::SimGroup;
pub use weapons::{best_weapon, UnitClass, Weapon};
