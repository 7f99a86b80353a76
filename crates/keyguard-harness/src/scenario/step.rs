//! Scenario steps.
//!
//! A [`Step`] is one host-side event applied to a [`TestBed`]. Scenarios and
//! the script runner share this vocabulary.

use std::time::Duration;

use keyguard_core::{ShowOptions, SubscriptionId, UserId};
use keyguard_mediator::ScreenOffReason;

use crate::{
    platform::{Knobs, SimSlot},
    testbed::TestBed,
};

/// A platform knob settable from a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Knob {
    /// Setup wizard completed.
    Provisioned,
    /// Secure credential configured.
    Secure,
    /// Power button locks instantly.
    InstantLock,
    /// Lock screen disabled.
    LockScreenDisabled,
    /// Storage just decrypted.
    JustDecrypted,
    /// Lock sounds on.
    LockSounds,
    /// Airplane mode on.
    AirplaneMode,
    /// Face or voice unlock selected.
    WeakUnlock,
    /// Alarm boot.
    AlarmBoot,
    /// Anti-theft lock engaged.
    AntiTheft,
    /// Security challenge up.
    Bouncer,
    /// Window manager answers "going away" on its own.
    AutoExit,
    /// Renderer reports drawn on its own.
    AutoDrawn,
}

impl Knob {
    /// Every knob.
    pub const ALL: [Self; 13] = [
        Self::Provisioned,
        Self::Secure,
        Self::InstantLock,
        Self::LockScreenDisabled,
        Self::JustDecrypted,
        Self::LockSounds,
        Self::AirplaneMode,
        Self::WeakUnlock,
        Self::AlarmBoot,
        Self::AntiTheft,
        Self::Bouncer,
        Self::AutoExit,
        Self::AutoDrawn,
    ];

    /// Kebab-case name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Provisioned => "provisioned",
            Self::Secure => "secure",
            Self::InstantLock => "instant-lock",
            Self::LockScreenDisabled => "lock-disabled",
            Self::JustDecrypted => "just-decrypted",
            Self::LockSounds => "sounds",
            Self::AirplaneMode => "airplane",
            Self::WeakUnlock => "weak-unlock",
            Self::AlarmBoot => "alarm-boot",
            Self::AntiTheft => "anti-theft",
            Self::Bouncer => "bouncer",
            Self::AutoExit => "auto-exit",
            Self::AutoDrawn => "auto-drawn",
        }
    }

    /// Look a knob up by [`Knob::name`].
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|knob| knob.name() == name)
    }

    /// Write the knob.
    pub fn set(self, knobs: &mut Knobs, on: bool) {
        let slot = match self {
            Self::Provisioned => &mut knobs.provisioned,
            Self::Secure => &mut knobs.secure,
            Self::InstantLock => &mut knobs.instant_lock,
            Self::LockScreenDisabled => &mut knobs.lock_screen_disabled,
            Self::JustDecrypted => &mut knobs.just_decrypted,
            Self::LockSounds => &mut knobs.lock_sounds,
            Self::AirplaneMode => &mut knobs.airplane_mode,
            Self::WeakUnlock => &mut knobs.weak_unlock,
            Self::AlarmBoot => &mut knobs.alarm_boot,
            Self::AntiTheft => &mut knobs.anti_theft,
            Self::Bouncer => &mut knobs.renderer.bouncer_showing,
            Self::AutoExit => &mut knobs.auto_exit_animation,
            Self::AutoDrawn => &mut knobs.renderer.auto_done_drawing,
        };
        *slot = on;
    }
}

/// One host-side event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// System finished starting.
    SystemReady,
    /// Boot completed.
    BootCompleted,
    /// Screen turned off.
    ScreenOff(ScreenOffReason),
    /// Screen turned on, with a show callback.
    ScreenOn,
    /// Dream started.
    DreamStart,
    /// Dream stopped.
    DreamStop,
    /// External enable/disable.
    Enable(bool),
    /// Verify-unlock with a recording callback.
    Verify,
    /// Keyguard done.
    Done {
        /// Whether the user authenticated.
        authenticated: bool,
    },
    /// Dismiss the surface.
    Dismiss,
    /// User-activity timeout lock.
    Timeout(Option<ShowOptions>),
    /// SIM report for a subscription.
    Sim(SubscriptionId, SimSlot),
    /// Occlusion change.
    Occlude(bool),
    /// Window manager starts the exit animation.
    ExitAnimation,
    /// Advance time and fire due alarms.
    Advance(Duration),
    /// User switch starting.
    UserSwitching(UserId),
    /// User switch finished.
    UserSwitched(UserId),
    /// Call state change.
    PhoneIdle(bool),
    /// Biometric match.
    Biometric,
    /// Dock change; true for a desk dock.
    Dock(bool),
    /// Flip a platform knob.
    Set(Knob, bool),
}

impl Step {
    /// Apply the step and settle the bed.
    pub fn apply(&self, bed: &TestBed) {
        tracing::debug!(step = ?self, "applying");
        let mediator = &bed.mediator;
        match self {
            Self::SystemReady => mediator.on_system_ready(),
            Self::BootCompleted => mediator.on_boot_completed(),
            Self::ScreenOff(reason) => mediator.on_screen_turned_off(*reason),
            Self::ScreenOn => mediator.on_screen_turned_on(Some(bed.show_callback())),
            Self::DreamStart => mediator.on_dreaming_started(),
            Self::DreamStop => mediator.on_dreaming_stopped(),
            Self::Enable(enabled) => mediator.set_keyguard_enabled(*enabled),
            Self::Verify => {
                if let Err(reason) = mediator.verify_unlock(bed.exit_callback()) {
                    tracing::info!(%reason, "verify-unlock rejected");
                }
            },
            Self::Done { authenticated } => mediator.keyguard_done(*authenticated, true),
            Self::Dismiss => mediator.dismiss(false),
            Self::Timeout(options) => mediator.do_keyguard_timeout(options.clone()),
            Self::Sim(subscription, slot) => {
                bed.platform.set_sim(*subscription, *slot);
                bed.platform.notify(|cb| cb.on_sim_state_changed(*subscription, slot.condition));
            },
            Self::Occlude(occluded) => mediator.set_occluded(*occluded),
            Self::ExitAnimation => {
                bed.mediator.sync();
                if !bed.finish_exit() {
                    tracing::info!("no exit transition pending");
                }
            },
            Self::Advance(by) => {
                bed.scheduler.advance(*by);
            },
            Self::UserSwitching(user) => bed.platform.notify(|cb| cb.on_user_switching(*user)),
            Self::UserSwitched(user) => {
                mediator.set_current_user(*user);
                bed.platform.notify(|cb| cb.on_user_switch_complete(*user));
            },
            Self::PhoneIdle(idle) => bed.platform.notify(|cb| cb.on_phone_state_changed(*idle)),
            Self::Biometric => {
                let user = mediator.snapshot().current_user;
                bed.platform.notify(|cb| cb.on_biometric_recognized(user));
            },
            Self::Dock(desk) => bed.platform.notify(|cb| cb.on_dock_status_changed(*desk)),
            Self::Set(knob, on) => bed.platform.update(|knobs| knob.set(knobs, *on)),
        }
        bed.settle();
    }
}
