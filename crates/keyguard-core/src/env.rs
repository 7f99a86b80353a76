//! Environment abstraction.
//!
//! The mediator never reads the system clock directly. Production code uses
//! [`SystemClock`]; tests substitute a manually advanced clock so that
//! delayed-show alarms and hide animation timings are deterministic.

use std::time::Instant;

/// Source of monotonic time.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> Instant;
}

/// Wall clock backed by [`Instant::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}
