//! World facts and engine-facing facades shared by the HTN planner.
//!
//! Perception writes into a [`WorldState`]; the planner only reads it while searching and lets
//! task hooks mutate it while a plan executes.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod math;
pub mod querier;
pub mod tick;
pub mod world;

pub use math::Vec3;
pub use querier::{RelativeRotation, StaticQuerier, WorldQuerier};
pub use tick::TickContext;
pub use world::{ConsumableKey, Fact, FactKey, Facts, State, WorldState};
