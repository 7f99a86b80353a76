//! Lock-later delay.
//!
//! When the screen turns off because of a timeout (or the power button with
//! instant lock disabled), the lock surface is armed after a grace period so
//! the user can turn the screen straight back on without unlocking.

use std::time::Duration;

/// Settings the grace period is derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockTimeouts {
    /// Screen-off timeout from display settings.
    pub display_timeout: Duration,
    /// "Lock after" delay from security settings.
    pub lock_after: Duration,
    /// Administrator maximum time to lock, if a policy is in force.
    pub max_time_to_lock: Option<Duration>,
}

/// Grace period before locking.
///
/// Returns `None` when the device must lock immediately.
pub fn delayed_lock_after(timeouts: &LockTimeouts) -> Option<Duration> {
    let delay = match timeouts.max_time_to_lock {
        Some(limit) if !limit.is_zero() => {
            // Don't go beyond the policy limit, measured from last user activity.
            let remaining = limit.checked_sub(timeouts.display_timeout)?;
            remaining.min(timeouts.lock_after)
        },
        _ => timeouts.lock_after,
    };

    (!delay.is_zero()).then_some(delay)
}
