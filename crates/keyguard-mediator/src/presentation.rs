//! Presentation driver.
//!
//! The executor thread owns the renderer and applies queued commands one at a
//! time. Handlers commit session state under the lock, release it, then call
//! the renderer and other collaborators. A panic inside a handler is caught
//! and logged; the loop keeps running.

use std::{
    mem,
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Weak},
    time::{Duration, Instant},
};

use keyguard_core::{ShowOptions, StatusBarInputs};
use tracing::{debug, error, info, trace};

use crate::{
    collaborators::{Renderer, Services, Sound, log_failure},
    mediator::{Inner, Mediator, notify_exit},
    queue::{Command, CommandReceiver},
};

/// Owns the renderer and the receiving end of the queue.
///
/// Holds the session weakly: once every [`Mediator`] handle is gone the queue
/// closes and the loop ends even without [`Mediator::shutdown`].
pub(crate) struct Executor {
    session: Weak<Inner>,
    renderer: Box<dyn Renderer>,
    receiver: CommandReceiver,
}

impl Executor {
    pub(crate) fn new(
        session: Weak<Inner>,
        renderer: Box<dyn Renderer>,
        receiver: CommandReceiver,
    ) -> Self {
        Self { session, renderer, receiver }
    }

    pub(crate) fn run(mut self) {
        info!("executor started");
        while let Some(command) = self.receiver.recv() {
            let name = command.name();
            match command {
                Command::Shutdown => break,
                Command::Barrier(reply) => {
                    self.receiver.finished();
                    let _ = reply.send(());
                },
                command => {
                    let Some(mediator) = Mediator::from_weak(&self.session) else {
                        debug!(command = name, "session dropped");
                        break;
                    };
                    trace!(command = name, "handling");
                    let mut handler = Handler { mediator, renderer: self.renderer.as_mut() };
                    let outcome =
                        panic::catch_unwind(AssertUnwindSafe(|| handler.dispatch(command)));
                    if outcome.is_err() {
                        error!(command = name, "command handler panicked");
                    }
                    self.receiver.finished();
                },
            }
        }
        info!("executor stopped");
    }
}

/// Applies one command with the session pinned for its duration.
struct Handler<'a> {
    mediator: Mediator,
    renderer: &'a mut dyn Renderer,
}

impl Handler<'_> {
    fn services(&self) -> &Services {
        &self.mediator.inner.services
    }

    fn dispatch(&mut self, command: Command) {
        match command {
            Command::Show { options } => self.handle_show(options),
            Command::Hide => self.handle_hide(),
            Command::Reset => self.handle_reset(),
            Command::VerifyUnlock => self.handle_verify_unlock(),
            Command::NotifyScreenOff => {
                log_failure("renderer.on_screen_turned_off", self.renderer.on_screen_turned_off());
            },
            Command::NotifyScreenOn { callback } => {
                log_failure(
                    "renderer.on_screen_turned_on",
                    self.renderer.on_screen_turned_on(callback),
                );
            },
            Command::Done { authenticated, wake_up } => self.handle_done(authenticated, wake_up),
            Command::DoneDrawing => self.handle_done_drawing(),
            Command::SetOccluded { occluded, .. } => self.handle_set_occluded(occluded),
            Command::KeyguardTimeout { options } => {
                let mut state = self.mediator.inner.state.lock();
                self.mediator.do_keyguard_locked(&mut state, options);
            },
            Command::Dismiss { authenticated } => self.handle_dismiss(authenticated),
            Command::StartExitAnimation { start, fade } => {
                self.handle_start_exit_animation(start, fade);
            },
            Command::KeyguardGoingAway { hide } => self.handle_going_away(hide),
            Command::PreHideAnimation => {
                log_failure(
                    "renderer.start_pre_hide_animation",
                    self.renderer.start_pre_hide_animation(None),
                );
            },
            Command::ActivityDrawn => self.handle_activity_drawn(),
            Command::BiometricRecognized => {
                if self.renderer.is_bouncer_showing() {
                    self.mediator.keyguard_done(true, true);
                }
            },
            Command::AdjustStatusBar => self.adjust_status_bar(),
            // Handled by the loop.
            Command::Barrier(_) | Command::Shutdown => {},
        }
    }

    fn handle_show(&mut self, options: Option<ShowOptions>) {
        let alarm_boot = self.services().power_off_alarm.is_alarm_boot();
        let play_lock_sound = {
            let mut state = self.mediator.inner.state.lock();
            state.show_pending = false;
            if !state.system_ready {
                drop(state);
                debug!("ignoring show, system not ready");
                self.services().power.release_wake_lock();
                return;
            }
            state.hiding = false;
            state.hide_generation = state.hide_generation.wrapping_add(1);
            state.showing = true;
            state.done_pending = false;
            state.hide_animation_run = false;
            !alarm_boot && !mem::replace(&mut state.suppress_next_lock_sound, false)
        };
        debug!(?options, "show");

        log_failure("renderer.show", self.renderer.show(options.as_ref()));
        self.sync_renderer_showing();
        self.update_lock_screen_state();
        self.adjust_status_bar();
        self.services().power.user_activity();
        self.schedule_close_system_dialogs();

        if alarm_boot {
            log_failure("power_off_alarm.start_alarm", self.services().power_off_alarm.start_alarm());
        } else if play_lock_sound {
            self.play_sound(Sound::Locked);
        }

        self.services().power.release_wake_lock();
    }

    fn handle_hide(&mut self) {
        let (animate, animation_ran, hide) = {
            let mut state = self.mediator.inner.state.lock();
            state.hiding = true;
            state.hide_generation = state.hide_generation.wrapping_add(1);
            (state.showing && !state.occluded, state.hide_animation_run, state.hide_generation)
        };
        debug!(animate, animation_ran, "hide");

        if !animate {
            // Not visible: the window manager will not drive an exit
            // transition, so finish locally.
            let config = &self.mediator.inner.config;
            let start = self.services().clock.now() + config.hide_start_offset;
            let fade = config.hide_fade_duration;
            self.handle_start_exit_animation(start, fade);
            return;
        }

        if animation_ran {
            self.keyguard_going_away();
            return;
        }

        let queue = self.mediator.inner.queue.clone();
        let result = self
            .renderer
            .start_pre_hide_animation(Some(Box::new(move || {
                queue.post(Command::KeyguardGoingAway { hide });
            })));
        if result.is_err() {
            log_failure("renderer.start_pre_hide_animation", result);
            self.keyguard_going_away();
        }
    }

    /// Pre-hide animation finished for hide number `hide`.
    fn handle_going_away(&mut self, hide: u64) {
        {
            let state = self.mediator.inner.state.lock();
            if !state.hiding || state.hide_generation != hide {
                debug!(hide, current = state.hide_generation, "hide superseded, not going away");
                return;
            }
        }
        self.keyguard_going_away();
    }

    fn keyguard_going_away(&mut self) {
        let disable_animations = self.renderer.should_disable_window_animations_for_unlock();
        let to_shade = self.renderer.is_going_to_notification_shade();
        log_failure(
            "window_manager.keyguard_going_away",
            self.services().window_manager.keyguard_going_away(disable_animations, to_shade),
        );
    }

    /// Finish a hide.
    fn handle_start_exit_animation(&mut self, start: Instant, fade: Duration) {
        let play_unlock_sound = {
            let mut state = self.mediator.inner.state.lock();
            if !state.hiding {
                debug!("exit animation with no hide in progress, ignoring");
                return;
            }
            state.hiding = false;
            state.showing = false;
            state.done_pending = false;
            state.hide_animation_run = false;
            state.done_in_progress = false;

            // No unlock sound during a call.
            if state.phone_idle {
                !mem::replace(&mut state.suppress_next_lock_sound, false)
            } else {
                false
            }
        };
        debug!(?fade, "finishing hide");

        if play_unlock_sound {
            self.play_sound(Sound::Unlocked);
        }

        log_failure("renderer.hide", self.renderer.hide(start, fade));
        self.sync_renderer_showing();
        self.update_lock_screen_state();
        self.adjust_status_bar();

        let mut state = self.mediator.inner.state.lock();
        self.mediator.send_user_present_locked(&mut state);
    }

    fn handle_reset(&mut self) {
        log_failure("renderer.reset", self.renderer.reset());
        self.sync_renderer_showing();
        self.adjust_status_bar();
    }

    fn handle_verify_unlock(&mut self) {
        log_failure("renderer.verify_unlock", self.renderer.verify_unlock());
        self.mediator.inner.state.lock().showing = true;
        self.sync_renderer_showing();
        self.update_lock_screen_state();
    }

    fn handle_done(&mut self, authenticated: bool, wake_up: bool) {
        let services = self.services();
        if services.anti_theft.is_locked() {
            debug!(authenticated, "anti-theft lock engaged, skipping keyguard done");
            return;
        }
        if !authenticated && services.power_off_alarm.is_alarm_boot() {
            debug!("alarm boot, skipping unauthenticated keyguard done");
            return;
        }
        debug!(authenticated, wake_up, "keyguard done");

        let exit = {
            let mut state = self.mediator.inner.state.lock();
            state.done_in_progress = true;
            let exit = state.pending_exit.take();
            if exit.is_some() && authenticated {
                // Passed securely; nothing to reshow when the disabler
                // re-enables.
                state.externally_enabled = true;
                state.needs_reshow_when_reenabled = false;
            }
            state.suppress_next_lock_sound = false;
            exit
        };

        if authenticated {
            services.update_monitor.clear_failed_unlock_attempts();
        }
        services.update_monitor.clear_biometric_recognized();

        if let Some(callback) = exit {
            notify_exit(callback, authenticated);
        }

        self.handle_hide();
    }

    fn handle_done_drawing(&self) {
        let inner = &self.mediator.inner;
        let mut state = inner.state.lock();
        if state.waiting_for_visible {
            debug!("keyguard drawn, releasing waiter");
            state.waiting_for_visible = false;
            inner.visible.notify_all();
        }
    }

    fn handle_set_occluded(&mut self, occluded: bool) {
        debug!(occluded, "set occluded");
        log_failure("renderer.set_occluded", self.renderer.set_occluded(occluded));
        self.update_lock_screen_state();
        self.adjust_status_bar();
    }

    fn handle_dismiss(&mut self, authenticated: bool) {
        let visible = {
            let state = self.mediator.inner.state.lock();
            state.showing && !state.occluded
        };
        if visible {
            log_failure("renderer.dismiss", self.renderer.dismiss(authenticated));
        } else {
            debug!("dismiss while not visible, ignoring");
        }
    }

    fn handle_activity_drawn(&mut self) {
        if self.mediator.inner.state.lock().done_pending {
            log_failure("renderer.on_activity_drawn", self.renderer.on_activity_drawn());
        }
    }

    fn sync_renderer_showing(&self) {
        let showing = self.renderer.is_showing();
        self.mediator.inner.state.lock().renderer_showing = showing;
    }

    fn update_lock_screen_state(&self) {
        let shown = {
            let state = self.mediator.inner.state.lock();
            state.showing && !state.occluded
        };
        log_failure(
            "activity_manager.set_lock_screen_shown",
            self.services().activity_manager.set_lock_screen_shown(shown),
        );
    }

    fn adjust_status_bar(&self) {
        let services = self.services();
        let (showing, occluded) = {
            let state = self.mediator.inner.state.lock();
            (state.showing, state.occluded)
        };
        let flags = StatusBarInputs {
            showing,
            occluded,
            alarm_boot: services.power_off_alarm.is_alarm_boot(),
            search_disabled_by_extension: services.policy.search_disabled_on_lock_screen(),
            anti_theft: services.anti_theft.hidden_status_bar_flags(),
        }
        .flags();
        debug!(showing, occluded, ?flags, "adjust status bar");
        log_failure("status_bar.disable", services.status_bar.disable(flags));
    }

    fn play_sound(&self, sound: Sound) {
        let services = self.services();
        if services.policy.lock_sounds_enabled() {
            log_failure("sounds.play", services.sounds.play(sound));
        }
    }

    fn schedule_close_system_dialogs(&self) {
        let services = self.services();
        let activity_manager = Arc::clone(&services.activity_manager);
        let deadline = services.clock.now() + self.mediator.inner.config.close_dialogs_delay;
        services.scheduler.schedule_exact(
            deadline,
            0,
            Box::new(move |_| {
                log_failure(
                    "activity_manager.close_system_dialogs",
                    activity_manager.close_system_dialogs("lock"),
                );
            }),
        );
    }
}
