//! Deterministic test harness for the keyguard mediator.
//!
//! Recording doubles for every collaborator, a manually driven clock and
//! alarm scheduler, and a [`TestBed`] that runs a real mediator (with its real
//! executor thread) against them. Time only moves when a test says so.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod clock;
pub mod platform;
pub mod scenario;
pub mod scheduler;
pub mod testbed;

pub use clock::ManualClock;
pub use platform::{
    Effect, FakePlatform, FakeRenderer, Knobs, RecordingExitCallback, RecordingShowCallback,
    RendererKnobs, SimSlot,
};
pub use scheduler::ManualScheduler;
pub use testbed::{EXIT_FADE, TestBed, TestBedBuilder};
