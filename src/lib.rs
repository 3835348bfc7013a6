//! Manyworlds - deterministic branching combat simulation and planner
//!
//! A world state that can be duplicated completely and cheaply, a
//! hierarchical action state machine that drives agents through it, and a
//! planner that explores alternative futures by forking world copies at
//! decision points.

pub mod action;
pub mod combat;
pub mod core;
pub mod draw;
pub mod entity;
pub mod htn;
pub mod pathfind;
pub mod planner;
pub mod scenario;
pub mod world;
