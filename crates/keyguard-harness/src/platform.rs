//! Recording fake platform.
//!
//! [`FakePlatform`] implements every shared collaborator trait against one
//! set of [`Knobs`] and appends an [`Effect`] to a single ordered log for
//! every side effect, so tests can assert both on what happened and on the
//! order it happened in. [`FakeRenderer`] logs into the same list.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Arc, OnceLock},
    time::{Duration, Instant},
};

use keyguard_core::{
    BlockingDialog, CollaboratorError, ShowOptions, SimCondition, StatusBarFlags, SubscriptionId,
    SurfaceVariant, UserId,
};
use keyguard_mediator::{
    ActivityManager, AnimationDone, AntiTheft, Broadcaster, CallbackId, CollaboratorResult,
    DialogManager, ExitCallback, Mediator, PolicySource, PowerManager, PowerOffAlarm, Renderer,
    ScreenOffReason, ShowCallback, Sound, SoundPlayer, StatusBar, UpdateMonitor,
    UpdateMonitorCallback, UserCache, WindowManager,
};
use parking_lot::Mutex;

/// One observable side effect, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Renderer brought the surface up.
    Show(Option<SurfaceVariant>),
    /// Renderer took the surface down.
    Hide {
        /// Animation length.
        fade: Duration,
    },
    /// Renderer reset.
    Reset,
    /// Renderer presented the verify-unlock challenge.
    VerifyUnlock,
    /// Renderer dismissed.
    Dismiss(bool),
    /// Renderer told the screen went off.
    RendererScreenOff,
    /// Renderer told the screen came on.
    RendererScreenOn,
    /// Renderer occlusion changed.
    Occluded(bool),
    /// Renderer started its pre-hide animation.
    PreHideAnimation,
    /// Renderer told the activity behind it drew.
    ActivityDrawn,

    /// Show wake lock acquired.
    WakeLockAcquired,
    /// Show wake lock released.
    WakeLockReleased,
    /// User activity poked.
    UserActivity,
    /// Sound played.
    Sound(Sound),
    /// Status bar flags applied.
    StatusBar(StatusBarFlags),
    /// Lock-screen-shown flag reported to the activity manager.
    LockScreenShown(bool),
    /// System dialogs closed.
    CloseSystemDialogs,
    /// Window manager asked to begin the exit transition.
    KeyguardGoingAway,
    /// User-present broadcast sent.
    UserPresent(UserId),
    /// Blocking SIM dialog requested.
    Dialog(BlockingDialog),
    /// Power-off alarm UI started.
    StartAlarm,
    /// Per-subscription PIN dismiss flag written.
    PinDismissFlag(SubscriptionId, bool),
    /// Failed unlock attempts cleared.
    ClearFailedAttempts,
    /// Biometric match cleared.
    ClearBiometric,
    /// Alternate unlock toggled.
    AlternateUnlock(bool),
    /// Lockout deadline from earlier failed attempts cleared.
    LockoutDeadlineReset,
    /// Screen-off forwarded to other listeners.
    DispatchScreenOff(ScreenOffReason),
    /// Screen-on forwarded to other listeners.
    DispatchScreenOn,
    /// Boot completion forwarded to other listeners.
    DispatchBootCompleted,
    /// Per-user cache cleared.
    CacheCleared(UserId),
    /// Credential store switched user.
    PolicyUser(UserId),
    /// Credential store dropped a user.
    PolicyUserRemoved(UserId),
    /// A verify-unlock result was delivered.
    ExitResult(bool),
    /// A screen-on show callback fired.
    Shown,
}

/// One SIM slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimSlot {
    /// Reported condition.
    pub condition: SimCondition,
    /// PIN or PUK required.
    pub pin_secure: bool,
    /// Remaining PUK attempts.
    pub puk_retries: Option<u32>,
    /// Remaining ME attempts.
    pub me_retries: Option<u32>,
}

impl SimSlot {
    /// A slot in `condition`, PIN-secure when it needs a PIN or PUK.
    pub fn new(condition: SimCondition) -> Self {
        let pin_secure = matches!(condition, SimCondition::PinRequired | SimCondition::PukRequired);
        Self { condition, pin_secure, puk_retries: None, me_retries: None }
    }
}

/// Renderer behaviour.
#[derive(Debug, Clone)]
pub struct RendererKnobs {
    /// Report "done drawing" as soon as the surface is shown.
    pub auto_done_drawing: bool,
    /// Finish the pre-hide animation immediately.
    pub auto_pre_hide: bool,
    /// Fire screen-on show callbacks immediately.
    pub auto_shown: bool,
    /// The security challenge is up.
    pub bouncer_showing: bool,
    /// `show` fails with a remote error.
    pub fail_show: bool,
}

impl Default for RendererKnobs {
    fn default() -> Self {
        Self {
            auto_done_drawing: true,
            auto_pre_hide: true,
            auto_shown: true,
            bouncer_showing: false,
            fail_show: false,
        }
    }
}

/// Everything the fake collaborators answer queries with.
#[derive(Debug, Clone)]
pub struct Knobs {
    /// Setup wizard completed.
    pub provisioned: bool,
    /// Secure credential configured.
    pub secure: bool,
    /// Power button locks instantly.
    pub instant_lock: bool,
    /// Lock screen set to "None" or disabled by an administrator.
    pub lock_screen_disabled: bool,
    /// Storage just decrypted.
    pub just_decrypted: bool,
    /// Lock sounds enabled.
    pub lock_sounds: bool,
    /// Airplane mode on.
    pub airplane_mode: bool,
    /// Face or voice unlock is the selected method.
    pub weak_unlock: bool,
    /// Booted only to ring an alarm.
    pub alarm_boot: bool,
    /// Anti-theft lock engaged.
    pub anti_theft: bool,
    /// Extra status-bar flags while anti-theft is engaged.
    pub anti_theft_flags: StatusBarFlags,
    /// A lock-screen extension disables search.
    pub search_disabled: bool,
    /// Screen on at start.
    pub screen_on: bool,
    /// Administrator maximum time to lock.
    pub max_time_to_lock: Option<Duration>,
    /// Screen-off timeout.
    pub screen_off_timeout: Option<Duration>,
    /// Lock-after delay.
    pub lock_after: Option<Duration>,
    /// Guest users.
    pub guests: BTreeSet<UserId>,
    /// SIM slots by subscription.
    pub sims: BTreeMap<SubscriptionId, SimSlot>,
    /// The window manager answers "going away" with the exit animation.
    pub auto_exit_animation: bool,
    /// `broadcaster.send_user_present` fails.
    pub fail_broadcast: bool,
    /// Renderer behaviour.
    pub renderer: RendererKnobs,
}

impl Default for Knobs {
    fn default() -> Self {
        Self {
            provisioned: true,
            secure: true,
            instant_lock: true,
            lock_screen_disabled: false,
            just_decrypted: false,
            lock_sounds: true,
            airplane_mode: false,
            weak_unlock: false,
            alarm_boot: false,
            anti_theft: false,
            anti_theft_flags: StatusBarFlags::empty(),
            search_disabled: false,
            screen_on: true,
            max_time_to_lock: None,
            screen_off_timeout: Some(Duration::from_secs(30)),
            lock_after: Some(Duration::from_secs(5)),
            guests: BTreeSet::new(),
            sims: BTreeMap::new(),
            auto_exit_animation: true,
            fail_broadcast: false,
            renderer: RendererKnobs::default(),
        }
    }
}

#[derive(Default)]
struct Shared {
    effects: Vec<Effect>,
    callbacks: Vec<(CallbackId, Arc<dyn UpdateMonitorCallback>)>,
    next_callback: u64,
    wake_lock_held: bool,
    going_away_pending: bool,
    pre_hide: Option<AnimationDone>,
    show_callback: Option<Box<dyn ShowCallback>>,
    renderer_showing: bool,
}

/// Recording implementation of every shared collaborator.
pub struct FakePlatform {
    knobs: Mutex<Knobs>,
    shared: Mutex<Shared>,
}

impl FakePlatform {
    /// Platform answering with `knobs`.
    pub fn new(knobs: Knobs) -> Arc<Self> {
        Arc::new(Self { knobs: Mutex::new(knobs), shared: Mutex::new(Shared::default()) })
    }

    /// Copy of the current knobs.
    pub fn knobs(&self) -> Knobs {
        self.knobs.lock().clone()
    }

    /// Change knobs in place.
    pub fn update(&self, f: impl FnOnce(&mut Knobs)) {
        f(&mut self.knobs.lock());
    }

    /// Insert or replace a SIM slot.
    pub fn set_sim(&self, subscription: SubscriptionId, slot: SimSlot) {
        self.knobs.lock().sims.insert(subscription, slot);
    }

    /// Append an effect.
    pub fn record(&self, effect: Effect) {
        tracing::trace!(?effect, "effect");
        self.shared.lock().effects.push(effect);
    }

    /// Every effect so far.
    pub fn effects(&self) -> Vec<Effect> {
        self.shared.lock().effects.clone()
    }

    /// Every effect so far, clearing the log.
    pub fn take_effects(&self) -> Vec<Effect> {
        std::mem::take(&mut self.shared.lock().effects)
    }

    /// Number of logged effects matching `pred`.
    pub fn count(&self, pred: impl Fn(&Effect) -> bool) -> usize {
        self.shared.lock().effects.iter().filter(|e| pred(e)).count()
    }

    /// Whether `effect` was logged.
    pub fn saw(&self, effect: &Effect) -> bool {
        self.shared.lock().effects.contains(effect)
    }

    /// Index of the first logged `effect`.
    pub fn position(&self, effect: &Effect) -> Option<usize> {
        self.shared.lock().effects.iter().position(|e| e == effect)
    }

    /// Number of renderer `Show` effects.
    pub fn shows(&self) -> usize {
        self.count(|e| matches!(e, Effect::Show(_)))
    }

    /// Number of renderer `Hide` effects.
    pub fn hides(&self) -> usize {
        self.count(|e| matches!(e, Effect::Hide { .. }))
    }

    /// Last status-bar flags applied.
    pub fn status_bar(&self) -> Option<StatusBarFlags> {
        self.shared.lock().effects.iter().rev().find_map(|e| match e {
            Effect::StatusBar(flags) => Some(*flags),
            _ => None,
        })
    }

    /// The show wake lock is currently held.
    pub fn wake_lock_held(&self) -> bool {
        self.shared.lock().wake_lock_held
    }

    /// Whether the fake renderer's surface is up.
    pub fn renderer_showing(&self) -> bool {
        self.shared.lock().renderer_showing
    }

    /// Registered update-monitor callbacks.
    pub fn registered_callbacks(&self) -> usize {
        self.shared.lock().callbacks.len()
    }

    /// Deliver an update-monitor event to every registered callback.
    ///
    /// Called without any internal lock held.
    pub fn notify(&self, f: impl Fn(&dyn UpdateMonitorCallback)) {
        let callbacks: Vec<_> =
            self.shared.lock().callbacks.iter().map(|(_, cb)| Arc::clone(cb)).collect();
        for callback in callbacks {
            f(callback.as_ref());
        }
    }

    /// Complete a pre-hide animation the renderer left running.
    pub fn finish_pre_hide_animation(&self) -> bool {
        let pending = self.shared.lock().pre_hide.take();
        match pending {
            Some(done) => {
                done();
                true
            },
            None => false,
        }
    }

    /// Take the pending "going away" request, if the window manager has one.
    pub fn take_going_away(&self) -> bool {
        std::mem::take(&mut self.shared.lock().going_away_pending)
    }

    /// Fire a show callback the renderer is holding.
    pub fn finish_screen_on(&self) -> bool {
        let pending = self.shared.lock().show_callback.take();
        match pending {
            Some(callback) => {
                let _ = callback.on_shown();
                true
            },
            None => false,
        }
    }

    fn remote_result(&self, fail: bool, what: &str) -> CollaboratorResult {
        if fail { Err(CollaboratorError::Remote(format!("{what} failed"))) } else { Ok(()) }
    }
}

impl UpdateMonitor for FakePlatform {
    fn register_callback(&self, callback: Arc<dyn UpdateMonitorCallback>) -> CallbackId {
        let mut shared = self.shared.lock();
        shared.next_callback += 1;
        let id = CallbackId(shared.next_callback);
        shared.callbacks.push((id, callback));
        id
    }

    fn remove_callback(&self, id: CallbackId) {
        self.shared.lock().callbacks.retain(|(cb_id, _)| *cb_id != id);
    }

    fn is_device_provisioned(&self) -> bool {
        self.knobs.lock().provisioned
    }

    fn subscriptions(&self) -> Vec<SubscriptionId> {
        self.knobs.lock().sims.keys().copied().collect()
    }

    fn sim_condition(&self, subscription: SubscriptionId) -> SimCondition {
        self.knobs.lock().sims.get(&subscription).map_or(SimCondition::Absent, |s| s.condition)
    }

    fn is_sim_pin_secure(&self, subscription: SubscriptionId) -> bool {
        self.knobs.lock().sims.get(&subscription).is_some_and(|s| s.pin_secure)
    }

    fn puk_retries(&self, subscription: SubscriptionId) -> Option<u32> {
        self.knobs.lock().sims.get(&subscription).and_then(|s| s.puk_retries)
    }

    fn me_retries(&self, subscription: SubscriptionId) -> Option<u32> {
        self.knobs.lock().sims.get(&subscription).and_then(|s| s.me_retries)
    }

    fn set_pin_dismiss_flag(&self, subscription: SubscriptionId, dismissed: bool) {
        self.record(Effect::PinDismissFlag(subscription, dismissed));
    }

    fn clear_failed_unlock_attempts(&self) {
        self.record(Effect::ClearFailedAttempts);
    }

    fn clear_biometric_recognized(&self) {
        self.record(Effect::ClearBiometric);
    }

    fn set_alternate_unlock_enabled(&self, enabled: bool) {
        self.record(Effect::AlternateUnlock(enabled));
    }

    fn dispatch_screen_turned_off(&self, reason: ScreenOffReason) {
        self.record(Effect::DispatchScreenOff(reason));
    }

    fn dispatch_screen_turned_on(&self) {
        self.record(Effect::DispatchScreenOn);
    }

    fn dispatch_boot_completed(&self) {
        self.record(Effect::DispatchBootCompleted);
    }
}

impl PolicySource for FakePlatform {
    fn is_secure(&self) -> bool {
        self.knobs.lock().secure
    }

    fn power_button_instantly_locks(&self) -> bool {
        self.knobs.lock().instant_lock
    }

    fn is_lock_screen_disabled(&self) -> bool {
        self.knobs.lock().lock_screen_disabled
    }

    fn just_decrypted(&self) -> bool {
        self.knobs.lock().just_decrypted
    }

    fn max_time_to_lock(&self) -> Option<Duration> {
        self.knobs.lock().max_time_to_lock
    }

    fn screen_off_timeout(&self) -> Option<Duration> {
        self.knobs.lock().screen_off_timeout
    }

    fn lock_after_timeout(&self) -> Option<Duration> {
        self.knobs.lock().lock_after
    }

    fn lock_sounds_enabled(&self) -> bool {
        self.knobs.lock().lock_sounds
    }

    fn is_airplane_mode_on(&self) -> bool {
        self.knobs.lock().airplane_mode
    }

    fn weak_unlock_selected(&self) -> bool {
        self.knobs.lock().weak_unlock
    }

    fn reset_lockout_deadline(&self) {
        self.record(Effect::LockoutDeadlineReset);
    }

    fn search_disabled_on_lock_screen(&self) -> bool {
        self.knobs.lock().search_disabled
    }

    fn is_guest_user(&self, user: UserId) -> bool {
        self.knobs.lock().guests.contains(&user)
    }

    fn set_current_user(&self, user: UserId) {
        self.record(Effect::PolicyUser(user));
    }

    fn remove_user(&self, user: UserId) {
        self.record(Effect::PolicyUserRemoved(user));
    }
}

impl Broadcaster for FakePlatform {
    fn send_user_present(&self, user: UserId) -> CollaboratorResult {
        let fail = self.knobs.lock().fail_broadcast;
        if !fail {
            self.record(Effect::UserPresent(user));
        }
        self.remote_result(fail, "send_user_present")
    }
}

impl StatusBar for FakePlatform {
    fn disable(&self, flags: StatusBarFlags) -> CollaboratorResult {
        self.record(Effect::StatusBar(flags));
        Ok(())
    }
}

impl SoundPlayer for FakePlatform {
    fn play(&self, sound: Sound) -> CollaboratorResult {
        self.record(Effect::Sound(sound));
        Ok(())
    }
}

impl PowerManager for FakePlatform {
    fn is_screen_on(&self) -> bool {
        self.knobs.lock().screen_on
    }

    fn acquire_wake_lock(&self) {
        self.shared.lock().wake_lock_held = true;
        self.record(Effect::WakeLockAcquired);
    }

    fn release_wake_lock(&self) {
        self.shared.lock().wake_lock_held = false;
        self.record(Effect::WakeLockReleased);
    }

    fn user_activity(&self) {
        self.record(Effect::UserActivity);
    }
}

impl DialogManager for FakePlatform {
    fn request_show(&self, dialog: BlockingDialog) -> CollaboratorResult {
        self.record(Effect::Dialog(dialog));
        Ok(())
    }
}

impl ActivityManager for FakePlatform {
    fn set_lock_screen_shown(&self, shown: bool) -> CollaboratorResult {
        self.record(Effect::LockScreenShown(shown));
        Ok(())
    }

    fn close_system_dialogs(&self, _reason: &str) -> CollaboratorResult {
        self.record(Effect::CloseSystemDialogs);
        Ok(())
    }
}

impl WindowManager for FakePlatform {
    fn keyguard_going_away(
        &self,
        _disable_window_animations: bool,
        _going_to_notification_shade: bool,
    ) -> CollaboratorResult {
        self.shared.lock().going_away_pending = true;
        self.record(Effect::KeyguardGoingAway);
        Ok(())
    }
}

impl AntiTheft for FakePlatform {
    fn is_locked(&self) -> bool {
        self.knobs.lock().anti_theft
    }

    fn hidden_status_bar_flags(&self) -> StatusBarFlags {
        let knobs = self.knobs.lock();
        if knobs.anti_theft { knobs.anti_theft_flags } else { StatusBarFlags::empty() }
    }
}

impl PowerOffAlarm for FakePlatform {
    fn is_alarm_boot(&self) -> bool {
        self.knobs.lock().alarm_boot
    }

    fn start_alarm(&self) -> CollaboratorResult {
        self.record(Effect::StartAlarm);
        Ok(())
    }
}

impl UserCache for FakePlatform {
    fn clear(&self, user: UserId) {
        self.record(Effect::CacheCleared(user));
    }
}

/// Renderer double logging into a [`FakePlatform`].
pub struct FakeRenderer {
    platform: Arc<FakePlatform>,
    mediator: Arc<OnceLock<Mediator>>,
    showing: bool,
}

impl FakeRenderer {
    /// Renderer that reports "done drawing" to whatever mediator is placed
    /// in `mediator` once it starts.
    pub fn new(platform: Arc<FakePlatform>, mediator: Arc<OnceLock<Mediator>>) -> Self {
        Self { platform, mediator, showing: false }
    }

    fn knobs(&self) -> RendererKnobs {
        self.platform.knobs.lock().renderer.clone()
    }

    fn set_showing(&mut self, showing: bool) {
        self.showing = showing;
        self.platform.shared.lock().renderer_showing = showing;
    }
}

impl Renderer for FakeRenderer {
    fn show(&mut self, options: Option<&ShowOptions>) -> CollaboratorResult {
        let knobs = self.knobs();
        if knobs.fail_show {
            return Err(CollaboratorError::Remote("renderer show failed".to_string()));
        }
        self.platform.record(Effect::Show(options.map(|o| o.variant)));
        self.set_showing(true);
        if knobs.auto_done_drawing
            && let Some(mediator) = self.mediator.get()
        {
            mediator.keyguard_done_drawing();
        }
        Ok(())
    }

    fn hide(&mut self, _start: Instant, fade: Duration) -> CollaboratorResult {
        self.platform.record(Effect::Hide { fade });
        self.set_showing(false);
        Ok(())
    }

    fn reset(&mut self) -> CollaboratorResult {
        self.platform.record(Effect::Reset);
        Ok(())
    }

    fn verify_unlock(&mut self) -> CollaboratorResult {
        self.platform.record(Effect::VerifyUnlock);
        self.set_showing(true);
        Ok(())
    }

    fn dismiss(&mut self, authenticated: bool) -> CollaboratorResult {
        self.platform.record(Effect::Dismiss(authenticated));
        Ok(())
    }

    fn on_screen_turned_off(&mut self) -> CollaboratorResult {
        self.platform.record(Effect::RendererScreenOff);
        Ok(())
    }

    fn on_screen_turned_on(&mut self, callback: Box<dyn ShowCallback>) -> CollaboratorResult {
        self.platform.record(Effect::RendererScreenOn);
        if self.knobs().auto_shown {
            callback.on_shown()
        } else {
            self.platform.shared.lock().show_callback = Some(callback);
            Ok(())
        }
    }

    fn set_occluded(&mut self, occluded: bool) -> CollaboratorResult {
        self.platform.record(Effect::Occluded(occluded));
        Ok(())
    }

    fn start_pre_hide_animation(&mut self, on_done: Option<AnimationDone>) -> CollaboratorResult {
        self.platform.record(Effect::PreHideAnimation);
        let Some(done) = on_done else {
            return Ok(());
        };
        if self.knobs().auto_pre_hide {
            done();
        } else {
            self.platform.shared.lock().pre_hide = Some(done);
        }
        Ok(())
    }

    fn on_activity_drawn(&mut self) -> CollaboratorResult {
        self.platform.record(Effect::ActivityDrawn);
        Ok(())
    }

    fn is_showing(&self) -> bool {
        self.showing
    }

    fn is_bouncer_showing(&self) -> bool {
        self.knobs().bouncer_showing
    }
}

/// Exit callback logging its result into a [`FakePlatform`].
pub struct RecordingExitCallback {
    platform: Arc<FakePlatform>,
}

impl RecordingExitCallback {
    /// Boxed callback ready for `verify_unlock`.
    pub fn boxed(platform: &Arc<FakePlatform>) -> Box<dyn ExitCallback> {
        Box::new(Self { platform: Arc::clone(platform) })
    }
}

impl ExitCallback for RecordingExitCallback {
    fn on_exit_result(&self, success: bool) -> CollaboratorResult {
        self.platform.record(Effect::ExitResult(success));
        Ok(())
    }
}

/// Show callback logging into a [`FakePlatform`].
pub struct RecordingShowCallback {
    platform: Arc<FakePlatform>,
}

impl RecordingShowCallback {
    /// Boxed callback ready for `on_screen_turned_on`.
    pub fn boxed(platform: &Arc<FakePlatform>) -> Box<dyn ShowCallback> {
        Box::new(Self { platform: Arc::clone(platform) })
    }
}

impl ShowCallback for RecordingShowCallback {
    fn on_shown(&self) -> CollaboratorResult {
        self.platform.record(Effect::Shown);
        Ok(())
    }
}
