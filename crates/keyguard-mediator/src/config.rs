//! Mediator configuration.

use std::time::Duration;

/// Tunables for the mediator.
///
/// Policy-derived values (screen-off timeout, lock-after delay) are read from
/// the [`crate::PolicySource`] on every use; the defaults here only apply when
/// the policy source has no value.
#[derive(Debug, Clone)]
pub struct MediatorConfig {
    /// How long a re-enabling `set_keyguard_enabled(true)` blocks waiting for
    /// the renderer to report the surface drawn.
    pub done_drawing_timeout: Duration,
    /// Screen-off timeout used when display settings have none.
    pub default_display_timeout: Duration,
    /// Lock-after delay used when security settings have none.
    pub default_lock_after: Duration,
    /// The in-progress power-off flag clears itself after this long.
    pub ipo_shutdown_clear_delay: Duration,
    /// Delay before closing system dialogs once the surface is shown.
    pub close_dialogs_delay: Duration,
    /// Start offset of the local hide animation used when the window manager
    /// does not drive the exit transition.
    pub hide_start_offset: Duration,
    /// Duration of the local hide animation.
    pub hide_fade_duration: Duration,
    /// An absent or permanently disabled SIM forces the lock surface.
    pub require_sim: bool,
    /// Network (ME) SIM locks are honoured.
    pub me_lock_supported: bool,
    /// Name of the executor thread.
    pub executor_thread_name: String,
}

impl Default for MediatorConfig {
    fn default() -> Self {
        Self {
            done_drawing_timeout: Duration::from_millis(2000),
            default_display_timeout: Duration::from_secs(30),
            default_lock_after: Duration::from_secs(5),
            ipo_shutdown_clear_delay: Duration::from_secs(4),
            close_dialogs_delay: Duration::from_millis(500),
            hide_start_offset: Duration::ZERO,
            hide_fade_duration: Duration::from_millis(300),
            require_sim: false,
            me_lock_supported: true,
            executor_thread_name: "keyguard-ui".to_string(),
        }
    }
}
