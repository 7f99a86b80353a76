//! Scenario testing with mandatory oracles.

mod builder;
pub mod oracle;
mod step;
mod world;

pub use builder::{RunnableScenario, Scenario};
pub use step::{Knob, Step};
pub use world::World;

/// Verifies the final [`World`] of a scenario.
pub type OracleFn = Box<dyn FnOnce(&World) -> Result<(), String>>;
