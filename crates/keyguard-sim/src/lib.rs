//! Script-driven keyguard simulator.
//!
//! Reads a line-oriented event script, replays it against a real mediator
//! wired to the harness doubles, and logs what the host saw.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod runner;
pub mod script;

pub use runner::{RunError, Runner, Summary};
pub use script::{Line, ScriptError, parse_line};
