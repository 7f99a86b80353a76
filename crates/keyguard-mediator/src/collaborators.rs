//! Collaborator capability traits.
//!
//! The mediator owns no platform services itself. Everything it talks to is
//! handed in at construction as a trait object, so production wires real
//! services and tests wire recording doubles.
//!
//! Side-effecting methods return [`CollaboratorResult`]; the mediator logs and
//! swallows failures. Queries are infallible and must be cheap: they are
//! called while the session lock is held.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use keyguard_core::{
    BlockingDialog, Clock, CollaboratorError, ShowOptions, SimCondition, StatusBarFlags,
    SubscriptionId, UserId,
};

/// Result of a side-effecting collaborator call.
pub type CollaboratorResult = Result<(), CollaboratorError>;

/// Callback run by the renderer when its pre-hide animation finishes.
pub type AnimationDone = Box<dyn FnOnce() + Send>;

/// Callback run by a scheduler when an alarm fires; receives the alarm token.
pub type AlarmFn = Box<dyn FnOnce(u64) + Send>;

/// Why the screen turned off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenOffReason {
    /// Device administrator locked the device.
    Admin,
    /// User pressed the power button.
    User,
    /// Screen-off timeout elapsed.
    Timeout,
    /// Proximity sensor turned the screen off during a call.
    ProximitySensor,
}

/// Feedback sounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sound {
    /// Lock surface shown.
    Locked,
    /// Lock surface dismissed.
    Unlocked,
    /// Trust agent kept the device unlocked.
    Trusted,
}

/// Caller waiting for the result of a verify-unlock request.
pub trait ExitCallback: Send {
    /// Deliver the verification result.
    fn on_exit_result(&self, success: bool) -> CollaboratorResult;
}

/// Caller waiting for the lock surface to be drawn after screen-on.
pub trait ShowCallback: Send {
    /// The lock surface (or nothing) is ready to be displayed.
    fn on_shown(&self) -> CollaboratorResult;
}

/// The lock surface renderer.
///
/// Owned exclusively by the executor thread, hence `&mut self` and no
/// internal locking.
pub trait Renderer: Send {
    /// Bring up the lock surface.
    fn show(&mut self, options: Option<&ShowOptions>) -> CollaboratorResult;

    /// Take down the lock surface, animating from `start` over `fade`.
    fn hide(&mut self, start: Instant, fade: Duration) -> CollaboratorResult;

    /// Re-assert the current security policy without a show/hide transition.
    fn reset(&mut self) -> CollaboratorResult;

    /// Present the security challenge for a verify-unlock request.
    fn verify_unlock(&mut self) -> CollaboratorResult;

    /// Dismiss the lock surface, going through the bouncer if needed.
    fn dismiss(&mut self, authenticated: bool) -> CollaboratorResult;

    /// Screen went off.
    fn on_screen_turned_off(&mut self) -> CollaboratorResult;

    /// Screen came on; `callback` fires once the surface is drawn.
    fn on_screen_turned_on(&mut self, callback: Box<dyn ShowCallback>) -> CollaboratorResult;

    /// Another surface covers (or uncovers) the lock surface.
    fn set_occluded(&mut self, occluded: bool) -> CollaboratorResult;

    /// Run the pre-hide animation; `on_done` fires when it completes.
    fn start_pre_hide_animation(&mut self, on_done: Option<AnimationDone>) -> CollaboratorResult;

    /// The activity behind the lock surface finished drawing.
    fn on_activity_drawn(&mut self) -> CollaboratorResult;

    /// Whether the surface is up.
    fn is_showing(&self) -> bool;

    /// Whether the security challenge is up.
    fn is_bouncer_showing(&self) -> bool;

    /// Hint for the window manager's going-away transition.
    fn should_disable_window_animations_for_unlock(&self) -> bool {
        false
    }

    /// Hint for the window manager's going-away transition.
    fn is_going_to_notification_shade(&self) -> bool {
        false
    }
}

/// Callbacks delivered by the [`UpdateMonitor`].
///
/// Every method has an empty default so implementors only override what
/// they care about.
#[allow(unused_variables)]
pub trait UpdateMonitorCallback: Send + Sync {
    /// A user switch is starting.
    fn on_user_switching(&self, user: UserId) {}
    /// A user switch finished.
    fn on_user_switch_complete(&self, user: UserId) {}
    /// A user was removed.
    fn on_user_removed(&self, user: UserId) {}
    /// A user's name or avatar changed.
    fn on_user_info_changed(&self, user: UserId) {}
    /// Call state changed; `idle` is true when no call is active.
    fn on_phone_state_changed(&self, idle: bool) {}
    /// Lock screen clock visibility changed.
    fn on_clock_visibility_changed(&self) {}
    /// Setup wizard completed.
    fn on_device_provisioned(&self) {}
    /// A subscription's SIM condition changed.
    fn on_sim_state_changed(&self, subscription: SubscriptionId, condition: SimCondition) {}
    /// A biometric matched for `user`.
    fn on_biometric_recognized(&self, user: UserId) {}
    /// Dock state changed; `desk` is true when docked to a desk dock.
    fn on_dock_status_changed(&self, desk: bool) {}
}

/// Handle identifying a registered [`UpdateMonitorCallback`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(pub u64);

/// Telephony, provisioning and biometric status source.
pub trait UpdateMonitor: Send + Sync {
    /// Register for status callbacks.
    fn register_callback(&self, callback: Arc<dyn UpdateMonitorCallback>) -> CallbackId;
    /// Stop delivering callbacks to `id`.
    fn remove_callback(&self, id: CallbackId);

    /// Setup wizard has completed.
    fn is_device_provisioned(&self) -> bool;
    /// Active subscriptions.
    fn subscriptions(&self) -> Vec<SubscriptionId>;
    /// Current condition of a subscription's SIM.
    fn sim_condition(&self, subscription: SubscriptionId) -> SimCondition;
    /// Whether a subscription's SIM needs its PIN or PUK.
    fn is_sim_pin_secure(&self, subscription: SubscriptionId) -> bool;
    /// Whether any SIM needs its PIN or PUK.
    fn is_any_sim_pin_secure(&self) -> bool {
        self.subscriptions().into_iter().any(|sub| self.is_sim_pin_secure(sub))
    }
    /// Remaining PUK attempts, if known.
    fn puk_retries(&self, subscription: SubscriptionId) -> Option<u32>;
    /// Remaining ME unlock attempts, if known.
    fn me_retries(&self, subscription: SubscriptionId) -> Option<u32>;
    /// Record that the PIN/PUK/ME surface was dismissed for a subscription.
    fn set_pin_dismiss_flag(&self, subscription: SubscriptionId, dismissed: bool);

    /// Reset failed unlock attempt counters.
    fn clear_failed_unlock_attempts(&self);
    /// Forget any pending biometric match.
    fn clear_biometric_recognized(&self);
    /// Allow (or suppress) alternate unlock methods.
    fn set_alternate_unlock_enabled(&self, enabled: bool);

    /// Forward a screen-off notification to other listeners.
    fn dispatch_screen_turned_off(&self, reason: ScreenOffReason);
    /// Forward a screen-on notification to other listeners.
    fn dispatch_screen_turned_on(&self);
    /// Forward boot completion to other listeners.
    fn dispatch_boot_completed(&self);
}

/// Security and lock settings.
pub trait PolicySource: Send + Sync {
    /// A secure credential (PIN, pattern, password) is configured.
    fn is_secure(&self) -> bool;
    /// The power button locks instantly.
    fn power_button_instantly_locks(&self) -> bool;
    /// The user chose "None" or an administrator disabled the lock screen.
    fn is_lock_screen_disabled(&self) -> bool;
    /// Storage was just decrypted with the lock credential.
    fn just_decrypted(&self) -> bool;
    /// Administrator maximum time to lock.
    fn max_time_to_lock(&self) -> Option<Duration>;
    /// Screen-off timeout from display settings.
    fn screen_off_timeout(&self) -> Option<Duration>;
    /// "Lock after" delay from security settings.
    fn lock_after_timeout(&self) -> Option<Duration>;
    /// Lock and unlock sounds are enabled.
    fn lock_sounds_enabled(&self) -> bool;
    /// Airplane mode is on.
    fn is_airplane_mode_on(&self) -> bool;
    /// Face or voice unlock is the selected method and is available.
    fn weak_unlock_selected(&self) -> bool;
    /// Forget any lockout deadline left by failed attempts before a restart.
    fn reset_lockout_deadline(&self);
    /// A lock-screen extension wants search disabled while shown.
    fn search_disabled_on_lock_screen(&self) -> bool {
        false
    }
    /// Whether `user` is a guest.
    fn is_guest_user(&self, user: UserId) -> bool;
    /// Switch the credential store to `user`.
    fn set_current_user(&self, user: UserId);
    /// Drop stored credentials for a removed user.
    fn remove_user(&self, user: UserId);
}

/// Exact alarms.
pub trait AlarmScheduler: Send + Sync {
    /// Run `fire(token)` at `deadline`.
    ///
    /// Alarms are never cancelled explicitly: the receiver compares the token
    /// with its current sequence and ignores stale ones. `fire` must not run
    /// before `schedule_exact` returns; it is called with the session lock
    /// held.
    fn schedule_exact(&self, deadline: Instant, token: u64, fire: AlarmFn);
}

/// Process-wide broadcasts.
pub trait Broadcaster: Send + Sync {
    /// The user is present (lock surface dismissed).
    fn send_user_present(&self, user: UserId) -> CollaboratorResult;
}

/// Status-bar feature control.
pub trait StatusBar: Send + Sync {
    /// Disable exactly these features.
    fn disable(&self, flags: StatusBarFlags) -> CollaboratorResult;
}

/// Audio feedback.
pub trait SoundPlayer: Send + Sync {
    /// Play a feedback sound.
    fn play(&self, sound: Sound) -> CollaboratorResult;
}

/// Power management.
pub trait PowerManager: Send + Sync {
    /// Whether the screen is on.
    fn is_screen_on(&self) -> bool;
    /// Acquire the non-reference-counted "show keyguard" wake lock.
    fn acquire_wake_lock(&self);
    /// Release the "show keyguard" wake lock.
    fn release_wake_lock(&self);
    /// Poke user activity so the screen stays on.
    fn user_activity(&self);
}

/// Blocking system dialogs for terminal SIM failures.
pub trait DialogManager: Send + Sync {
    /// Queue a blocking dialog.
    fn request_show(&self, dialog: BlockingDialog) -> CollaboratorResult;
}

/// Activity manager hooks.
pub trait ActivityManager: Send + Sync {
    /// Tell the activity manager whether the lock screen is shown.
    fn set_lock_screen_shown(&self, shown: bool) -> CollaboratorResult;
    /// Close system dialogs.
    fn close_system_dialogs(&self, reason: &str) -> CollaboratorResult;
}

/// Window manager hooks.
pub trait WindowManager: Send + Sync {
    /// Begin the keyguard exit transition. The window manager answers with
    /// `start_keyguard_exit_animation` on the mediator.
    fn keyguard_going_away(
        &self,
        disable_window_animations: bool,
        going_to_notification_shade: bool,
    ) -> CollaboratorResult;
}

/// Anti-theft lock.
pub trait AntiTheft: Send + Sync {
    /// The anti-theft lock is engaged.
    fn is_locked(&self) -> bool;
    /// Extra status-bar flags while engaged.
    fn hidden_status_bar_flags(&self) -> StatusBarFlags {
        StatusBarFlags::empty()
    }
}

/// Power-off alarm boot.
pub trait PowerOffAlarm: Send + Sync {
    /// The device booted only to ring an alarm.
    fn is_alarm_boot(&self) -> bool;
    /// Start the alarm UI in place of the lock sound.
    fn start_alarm(&self) -> CollaboratorResult;
}

/// Per-user caches held by other components (avatars and the like).
pub trait UserCache: Send + Sync {
    /// Drop everything cached for `user`.
    fn clear(&self, user: UserId);
}

/// Everything the mediator is constructed with.
pub struct Collaborators {
    /// Lock surface renderer. Moved onto the executor thread.
    pub renderer: Box<dyn Renderer>,
    /// Telephony/provisioning status.
    pub update_monitor: Arc<dyn UpdateMonitor>,
    /// Lock settings.
    pub policy: Arc<dyn PolicySource>,
    /// Exact alarms.
    pub scheduler: Arc<dyn AlarmScheduler>,
    /// Monotonic time.
    pub clock: Arc<dyn Clock>,
    /// Broadcasts.
    pub broadcaster: Arc<dyn Broadcaster>,
    /// Status bar.
    pub status_bar: Arc<dyn StatusBar>,
    /// Feedback sounds.
    pub sounds: Arc<dyn SoundPlayer>,
    /// Wake lock and user activity.
    pub power: Arc<dyn PowerManager>,
    /// SIM dialogs.
    pub dialogs: Arc<dyn DialogManager>,
    /// Activity manager.
    pub activity_manager: Arc<dyn ActivityManager>,
    /// Window manager.
    pub window_manager: Arc<dyn WindowManager>,
    /// Anti-theft lock.
    pub anti_theft: Arc<dyn AntiTheft>,
    /// Power-off alarm.
    pub power_off_alarm: Arc<dyn PowerOffAlarm>,
    /// Per-user caches.
    pub user_cache: Arc<dyn UserCache>,
}

/// Shared collaborators: everything except the executor-owned renderer.
pub(crate) struct Services {
    pub(crate) update_monitor: Arc<dyn UpdateMonitor>,
    pub(crate) policy: Arc<dyn PolicySource>,
    pub(crate) scheduler: Arc<dyn AlarmScheduler>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) broadcaster: Arc<dyn Broadcaster>,
    pub(crate) status_bar: Arc<dyn StatusBar>,
    pub(crate) sounds: Arc<dyn SoundPlayer>,
    pub(crate) power: Arc<dyn PowerManager>,
    pub(crate) dialogs: Arc<dyn DialogManager>,
    pub(crate) activity_manager: Arc<dyn ActivityManager>,
    pub(crate) window_manager: Arc<dyn WindowManager>,
    pub(crate) anti_theft: Arc<dyn AntiTheft>,
    pub(crate) power_off_alarm: Arc<dyn PowerOffAlarm>,
    pub(crate) user_cache: Arc<dyn UserCache>,
}

impl Collaborators {
    pub(crate) fn split(self) -> (Box<dyn Renderer>, Services) {
        let Self {
            renderer,
            update_monitor,
            policy,
            scheduler,
            clock,
            broadcaster,
            status_bar,
            sounds,
            power,
            dialogs,
            activity_manager,
            window_manager,
            anti_theft,
            power_off_alarm,
            user_cache,
        } = self;

        let services = Services {
            update_monitor,
            policy,
            scheduler,
            clock,
            broadcaster,
            status_bar,
            sounds,
            power,
            dialogs,
            activity_manager,
            window_manager,
            anti_theft,
            power_off_alarm,
            user_cache,
        };

        (renderer, services)
    }
}

/// Log and swallow a collaborator failure.
pub(crate) fn log_failure(operation: &'static str, result: CollaboratorResult) {
    if let Err(err) = result {
        tracing::warn!(operation, error = %err, "collaborator call failed");
    }
}
