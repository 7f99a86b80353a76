//! Event intake.
//!
//! Any-thread entry points. Each one takes the session lock, updates the
//! session state, and posts at most a handful of commands before releasing
//! it. Exit callbacks are completed after the lock is released so they may
//! call straight back into the mediator.

use std::{sync::Weak, time::Instant};

use keyguard_core::{
    PRIMARY_USER, RejectReason, ShowOptions, SimAction, SimCondition, SimContext, SubscriptionId,
    UserId, evaluate_sim_change,
};
use tracing::{debug, info, warn};

use crate::{
    collaborators::{
        ExitCallback, ScreenOffReason, ShowCallback, Sound, UpdateMonitorCallback, log_failure,
    },
    mediator::{Inner, Mediator, notify_exit},
    queue::Command,
};

impl Mediator {
    /// The host finished starting: register for status callbacks and make
    /// the first show decision.
    pub fn on_system_ready(&self) {
        {
            let mut state = self.inner.state.lock();
            if state.system_ready {
                debug!("system already ready");
                return;
            }
            state.system_ready = true;
        }
        info!("system ready");

        let services = &self.inner.services;
        let monitor = &services.update_monitor;
        let id = monitor.register_callback(std::sync::Arc::new(MonitorRelay {
            inner: self.downgrade(),
        }));
        services.policy.reset_lockout_deadline();

        // A weak unlock stays suppressed until boot settles. Anything else is
        // unsuppressed so it works if the user picks it later.
        let weak_unlock = services.policy.weak_unlock_selected();
        if weak_unlock {
            debug!("suppressing alternate unlock during boot");
        }
        monitor.set_alternate_unlock_enabled(!weak_unlock);

        {
            let mut state = self.inner.state.lock();
            state.monitor_callback = Some(id);
            self.do_keyguard_locked(&mut state, None);
        }

        self.maybe_send_user_present();
    }

    /// The screen turned off.
    pub fn on_screen_turned_off(&self, reason: ScreenOffReason) {
        let services = &self.inner.services;
        let failed_exit = {
            let mut state = self.inner.state.lock();
            state.screen_on = false;
            debug!(?reason, "screen turned off");

            state.done_pending = false;
            state.hide_animation_run = false;

            // Instant lock applies to the power button, and to any lock when
            // the device is not secure.
            let lock_immediately =
                services.policy.power_button_instantly_locks() || !services.policy.is_secure();

            self.inner.queue.post(Command::NotifyScreenOff);

            if let Some(callback) = state.pending_exit.take() {
                debug!("screen off with verify-unlock outstanding, failing it");
                if !state.externally_enabled {
                    self.hide_locked(&mut state);
                }
                Some(callback)
            } else {
                if state.showing {
                    self.reset_state_locked();
                } else if reason == ScreenOffReason::Timeout
                    || (reason == ScreenOffReason::User
                        && !lock_immediately
                        && !state.ipo_shutdown)
                {
                    self.do_keyguard_later_locked(&mut state);
                } else if reason == ScreenOffReason::ProximitySensor {
                    debug!("screen off by proximity sensor, not locking");
                } else {
                    self.do_keyguard_locked(&mut state, None);
                }
                None
            }
        };

        if let Some(callback) = failed_exit {
            notify_exit(callback, false);
        }
        services.update_monitor.dispatch_screen_turned_off(reason);
    }

    /// The screen turned on. `callback`, if given, is told when the lock
    /// surface (if any) has been drawn.
    pub fn on_screen_turned_on(&self, callback: Option<Box<dyn ShowCallback>>) {
        {
            let mut state = self.inner.state.lock();
            state.screen_on = true;
            state.cancel_delayed_show();
            debug!(seq = state.delayed_show_sequence, "screen turned on");
            if let Some(callback) = callback {
                self.inner.queue.post(Command::NotifyScreenOn { callback });
            }
        }
        self.inner.services.update_monitor.dispatch_screen_turned_on();
        self.maybe_send_user_present();
    }

    /// A dream started. Secure devices lock after the usual delay.
    pub fn on_dreaming_started(&self) {
        let mut state = self.inner.state.lock();
        if state.screen_on && self.inner.services.policy.is_secure() {
            debug!("dream started, scheduling delayed lock");
            self.do_keyguard_later_locked(&mut state);
        }
    }

    /// A dream stopped.
    pub fn on_dreaming_stopped(&self) {
        let mut state = self.inner.state.lock();
        if state.screen_on {
            state.cancel_delayed_show();
            debug!(seq = state.delayed_show_sequence, "dream stopped, delayed lock cancelled");
        }
    }

    /// Permit or forbid the lock surface on behalf of an external caller.
    ///
    /// Re-enabling after a disable that hid the surface blocks until the
    /// renderer reports the surface drawn or the configured timeout expires.
    pub fn set_keyguard_enabled(&self, enabled: bool) {
        let mut state = self.inner.state.lock();
        debug!(enabled, "set_keyguard_enabled");

        state.externally_enabled = enabled;

        if !enabled && state.showing {
            if state.pending_exit.is_some() {
                // The verify flow hides the surface itself once it resolves.
                debug!("verify-unlock outstanding, ignoring disable");
                return;
            }
            if self.inner.services.power_off_alarm.is_alarm_boot() {
                debug!("alarm boot, ignoring disable");
                return;
            }

            debug!("remembering to reshow, hiding keyguard");
            state.needs_reshow_when_reenabled = true;
            self.hide_locked(&mut state);
        } else if enabled && state.needs_reshow_when_reenabled {
            debug!("previously hidden, reshowing");
            state.needs_reshow_when_reenabled = false;

            if let Some(callback) = state.pending_exit.take() {
                debug!("verify-unlock outstanding, failing it instead of reshowing");
                self.reset_state_locked();
                drop(state);
                notify_exit(callback, false);
                return;
            }

            self.show_locked(&mut state, None);

            state.waiting_for_visible = true;
            let timeout = self.inner.config.done_drawing_timeout;
            let started = Instant::now();
            let result =
                self.inner.visible.wait_while_for(&mut state, |s| s.waiting_for_visible, timeout);
            if result.timed_out() {
                state.waiting_for_visible = false;
                warn!(?timeout, "timed out waiting for keyguard to draw");
            }
            debug!(elapsed = ?started.elapsed(), "done waiting for keyguard to draw");
        }
    }

    /// Ask the user to pass the lock surface while it is externally disabled.
    ///
    /// On rejection `callback` is completed with `false` before this returns.
    pub fn verify_unlock(&self, callback: Box<dyn ExitCallback>) -> Result<(), RejectReason> {
        let mut state = self.inner.state.lock();

        let rejection = if !self.inner.services.update_monitor.is_device_provisioned() {
            Some(RejectReason::NotProvisioned)
        } else if state.externally_enabled {
            Some(RejectReason::NotExternallyDisabled)
        } else if state.pending_exit.is_some() {
            Some(RejectReason::VerifyInProgress)
        } else {
            None
        };

        if let Some(reason) = rejection {
            drop(state);
            warn!(%reason, "rejecting verify-unlock");
            notify_exit(callback, false);
            return Err(reason);
        }

        state.pending_exit = Some(callback);
        self.inner.queue.post(Command::VerifyUnlock);
        debug!("verify-unlock registered");
        Ok(())
    }

    /// Another surface covers (or uncovers) the lock surface.
    pub fn set_occluded(&self, occluded: bool) {
        let mut state = self.inner.state.lock();
        if state.occluded == occluded {
            return;
        }
        debug!(occluded, "set_occluded");
        state.occluded = occluded;
        self.inner.queue.post_occluded(occluded);
    }

    /// Lock because of a user-activity timeout.
    ///
    /// Lock-free: safe to call while holding arbitrary caller locks.
    pub fn do_keyguard_timeout(&self, options: Option<ShowOptions>) {
        self.inner.queue.post(Command::KeyguardTimeout { options });
    }

    /// Dismiss the lock surface, through the bouncer unless `authenticated`.
    pub fn dismiss(&self, authenticated: bool) {
        self.inner.queue.post(Command::Dismiss { authenticated });
    }

    /// The user passed (or abandoned) the lock surface.
    pub fn keyguard_done(&self, authenticated: bool, wake_up: bool) {
        debug!(authenticated, wake_up, "keyguard_done");
        let mut state = self.inner.state.lock();
        state.done_pending = false;
        self.inner.queue.post(Command::Done { authenticated, wake_up });
    }

    /// The renderer finished drawing after a re-enable.
    pub fn keyguard_done_drawing(&self) {
        self.inner.queue.post(Command::DoneDrawing);
    }

    /// An authenticated done is imminent; start the pre-hide animation now.
    pub fn keyguard_done_pending(&self) {
        let mut state = self.inner.state.lock();
        state.done_pending = true;
        state.hide_animation_run = true;
        self.inner.queue.post(Command::PreHideAnimation);
    }

    /// The app behind the lock surface is ready; complete a pending done.
    pub fn ready_for_keyguard_done(&self) {
        let pending = self.inner.state.lock().done_pending;
        if pending {
            self.keyguard_done(true, true);
        }
    }

    /// The activity behind the lock surface finished drawing.
    pub fn on_activity_drawn(&self) {
        self.inner.queue.post(Command::ActivityDrawn);
    }

    /// The window manager is ready for the exit transition; finishes a hide.
    pub fn start_keyguard_exit_animation(&self, start: Instant, fade: std::time::Duration) {
        self.inner.queue.post(Command::StartExitAnimation { start, fade });
    }

    /// A trust agent kept the device unlocked.
    pub fn play_trusted_sound(&self) {
        let suppressed = self.inner.state.lock().suppress_next_lock_sound;
        let services = &self.inner.services;
        if !suppressed && services.policy.lock_sounds_enabled() {
            log_failure("sounds.play", services.sounds.play(Sound::Trusted));
        }
    }

    /// Keep the screen on.
    pub fn user_activity(&self) {
        self.inner.services.power.user_activity();
    }

    /// Boot finished; flush a deferred user-present broadcast.
    pub fn on_boot_completed(&self) {
        self.inner.services.update_monitor.dispatch_boot_completed();
        let mut state = self.inner.state.lock();
        state.boot_completed = true;
        info!("boot completed");
        if state.boot_send_user_present {
            state.boot_send_user_present = false;
            self.send_user_present_locked(&mut state);
        }
    }

    /// The device is about to power off; the next lock is silent.
    pub fn on_pre_shutdown(&self) {
        let mut state = self.inner.state.lock();
        state.suppress_next_lock_sound = true;
        debug!("pre-shutdown, suppressing next lock sound");
    }

    /// An instant power-off sequence started.
    ///
    /// The flag clears itself after the configured delay in case the matching
    /// boot-up notification never arrives.
    pub fn on_ipo_shutdown(&self) {
        let services = &self.inner.services;
        let mut state = self.inner.state.lock();
        state.ipo_shutdown = true;
        state.ipo_generation = state.ipo_generation.wrapping_add(1);

        let generation = state.ipo_generation;
        let deadline = services.clock.now() + self.inner.config.ipo_shutdown_clear_delay;
        let weak = self.downgrade();
        services.scheduler.schedule_exact(
            deadline,
            generation,
            Box::new(move |generation| {
                if let Some(mediator) = Self::from_weak(&weak) {
                    mediator.on_ipo_shutdown_expired(generation);
                }
            }),
        );
        debug!(generation, "ipo shutdown");
    }

    /// The instant power-off sequence ended.
    pub fn on_ipo_bootup(&self) {
        let mut state = self.inner.state.lock();
        state.ipo_shutdown = false;
        state.ipo_generation = state.ipo_generation.wrapping_add(1);
        debug!("ipo bootup");
    }

    fn on_ipo_shutdown_expired(&self, generation: u64) {
        let mut state = self.inner.state.lock();
        if state.ipo_generation == generation {
            debug!(generation, "ipo shutdown flag expired");
            state.ipo_shutdown = false;
        }
    }

    /// The foreground user changed.
    pub fn set_current_user(&self, user: UserId) {
        self.inner.services.policy.set_current_user(user);
        self.inner.state.lock().current_user = user;
        debug!(user, "current user set");
    }
}

impl UpdateMonitorCallback for Mediator {
    fn on_user_switching(&self, user: UserId) {
        {
            let mut state = self.inner.state.lock();
            debug!(user, "user switching");
            state.switching_user = true;
            state.done_pending = false;
            self.reset_state_locked();
            self.inner.queue.post(Command::AdjustStatusBar);
        }
        self.inner.services.update_monitor.set_alternate_unlock_enabled(true);
    }

    fn on_user_switch_complete(&self, user: UserId) {
        self.inner.state.lock().switching_user = false;
        debug!(user, "user switch complete");
        // Guests land straight past the lock surface.
        if user != PRIMARY_USER && self.inner.services.policy.is_guest_user(user) {
            self.dismiss(false);
        }
    }

    fn on_user_removed(&self, user: UserId) {
        self.inner.services.policy.remove_user(user);
        self.inner.services.user_cache.clear(user);
    }

    fn on_user_info_changed(&self, user: UserId) {
        self.inner.services.user_cache.clear(user);
    }

    fn on_phone_state_changed(&self, idle: bool) {
        let mut state = self.inner.state.lock();
        state.phone_idle = idle;
        if idle && !state.screen_on && state.externally_enabled {
            debug!("call ended with the screen off, making sure the keyguard shows");
            self.do_keyguard_locked(&mut state, None);
        }
    }

    fn on_clock_visibility_changed(&self) {
        self.inner.queue.post(Command::AdjustStatusBar);
    }

    fn on_device_provisioned(&self) {
        let mut state = self.inner.state.lock();
        self.send_user_present_locked(&mut state);
    }

    fn on_sim_state_changed(&self, subscription: SubscriptionId, condition: SimCondition) {
        let services = &self.inner.services;
        let monitor = &services.update_monitor;

        let dialog = {
            let mut state = self.inner.state.lock();
            let ctx = SimContext {
                provisioned: monitor.is_device_provisioned(),
                showing: state.showing,
                done_in_progress: state.done_in_progress,
                airplane_mode: services.policy.is_airplane_mode_on(),
                me_lock_supported: self.inner.config.me_lock_supported,
                puk_retries: monitor.puk_retries(subscription),
                me_retries: monitor.me_retries(subscription),
            };
            let outcome = evaluate_sim_change(condition, &ctx);
            debug!(subscription, ?condition, ?outcome, "sim state changed");

            if let Some(dismissed) = outcome.pin_dismiss_flag {
                monitor.set_pin_dismiss_flag(subscription, dismissed);
            }

            match outcome.action {
                SimAction::Show => {
                    self.do_keyguard_locked(&mut state, None);
                    None
                },
                SimAction::ShowLater => {
                    debug!("done in progress, deferring sim lock");
                    self.do_keyguard_later_locked(&mut state);
                    None
                },
                SimAction::Reset => {
                    self.reset_state_locked();
                    None
                },
                SimAction::Dialog(dialog) => Some(dialog),
                SimAction::Ignore => None,
            }
        };

        if let Some(dialog) = dialog {
            info!(subscription, ?dialog, "requesting blocking sim dialog");
            log_failure("dialogs.request_show", services.dialogs.request_show(dialog));
        }
    }

    fn on_biometric_recognized(&self, user: UserId) {
        debug!(user, "biometric recognized");
        self.inner.queue.post(Command::BiometricRecognized);
    }

    fn on_dock_status_changed(&self, desk: bool) {
        let services = &self.inner.services;
        if desk && services.policy.weak_unlock_selected() {
            debug!("docked to desk, suppressing alternate unlock");
            services.update_monitor.set_alternate_unlock_enabled(false);
            let state = self.inner.state.lock();
            if state.showing {
                self.reset_state_locked();
            }
        }
        if !self.is_secure() {
            self.dismiss(false);
        }
    }
}

/// Registered with the update monitor in place of the mediator itself so the
/// monitor never keeps the session alive.
struct MonitorRelay {
    inner: Weak<Inner>,
}

impl MonitorRelay {
    fn with(&self, f: impl FnOnce(&Mediator)) {
        if let Some(mediator) = Mediator::from_weak(&self.inner) {
            f(&mediator);
        }
    }
}

impl UpdateMonitorCallback for MonitorRelay {
    fn on_user_switching(&self, user: UserId) {
        self.with(|m| m.on_user_switching(user));
    }

    fn on_user_switch_complete(&self, user: UserId) {
        self.with(|m| m.on_user_switch_complete(user));
    }

    fn on_user_removed(&self, user: UserId) {
        self.with(|m| m.on_user_removed(user));
    }

    fn on_user_info_changed(&self, user: UserId) {
        self.with(|m| m.on_user_info_changed(user));
    }

    fn on_phone_state_changed(&self, idle: bool) {
        self.with(|m| m.on_phone_state_changed(idle));
    }

    fn on_clock_visibility_changed(&self) {
        self.with(|m| m.on_clock_visibility_changed());
    }

    fn on_device_provisioned(&self) {
        self.with(|m| m.on_device_provisioned());
    }

    fn on_sim_state_changed(&self, subscription: SubscriptionId, condition: SimCondition) {
        self.with(|m| m.on_sim_state_changed(subscription, condition));
    }

    fn on_biometric_recognized(&self, user: UserId) {
        self.with(|m| m.on_biometric_recognized(user));
    }

    fn on_dock_status_changed(&self, desk: bool) {
        self.with(|m| m.on_dock_status_changed(desk));
    }
}
