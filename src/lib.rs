//! Dredge: trajectory extraction and crafting-chain visualization for MineRL
//! demonstrations.
//!
//! Episodes recorded as a numeric `.npz` archive plus a video are aligned
//! into `(observation, action, reward, next_observation, done)` sequences,
//! with observations and actions rebuilt into the nested layout of the task
//! schema. Symbolic crafting chains are drawn as colored Graphviz graphs.

pub mod chain;
pub mod config;
pub mod error;
pub mod schema;
pub mod trajectory;
