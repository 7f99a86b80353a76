//! Mediator handle, lifecycle, queries and the lock-held helpers shared by
//! the intake and the executor.

use std::{
    sync::{Arc, Weak},
    thread::{self, JoinHandle},
};

use keyguard_core::{
    LockTimeouts, ShowDecision, ShowInputs, ShowOptions, SubscriptionLock, delayed_lock_after,
    evaluate_show_decision,
};
use parking_lot::{Condvar, Mutex};
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::{
    collaborators::{Collaborators, ExitCallback, Services, log_failure},
    config::MediatorConfig,
    presentation::Executor,
    queue::{self, Command, CommandQueue},
    state::{SessionSnapshot, SessionState},
};

/// Errors starting the mediator.
#[derive(Debug, Error)]
pub enum MediatorError {
    /// The executor thread could not be spawned.
    #[error("failed to spawn executor thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Shared core of a [`Mediator`].
pub(crate) struct Inner {
    pub(crate) config: MediatorConfig,
    pub(crate) state: Mutex<SessionState>,
    /// Signalled when `waiting_for_visible` is cleared.
    pub(crate) visible: Condvar,
    pub(crate) queue: CommandQueue,
    pub(crate) services: Services,
    executor: Mutex<Option<JoinHandle<()>>>,
}

/// The lock-screen mediator.
///
/// Cheap to clone; every clone talks to the same session. All methods may be
/// called from any thread. Renderer work happens on the mediator's own
/// executor thread, in the order the requests acquired the session lock.
///
/// Collaborator callbacks ([`crate::ExitCallback`], [`crate::ShowCallback`],
/// alarms) may call back into the mediator, but collaborator *queries* are
/// made while the session lock is held and must not.
#[derive(Clone)]
pub struct Mediator {
    pub(crate) inner: Arc<Inner>,
}

impl Mediator {
    /// Create the session and start the executor thread.
    pub fn start(
        config: MediatorConfig,
        collaborators: Collaborators,
    ) -> Result<Self, MediatorError> {
        let (renderer, services) = collaborators.split();
        let (queue, receiver) = queue::channel();

        // Assume showing (unless disabled) until the first decision says
        // otherwise.
        let provisioned = services.update_monitor.is_device_provisioned();
        let showing = (provisioned || services.policy.is_secure())
            && !services.policy.is_lock_screen_disabled();
        let screen_on = services.power.is_screen_on();

        let thread_name = config.executor_thread_name.clone();
        let inner = Arc::new(Inner {
            config,
            state: Mutex::new(SessionState::new(showing, screen_on)),
            visible: Condvar::new(),
            queue,
            services,
            executor: Mutex::new(None),
        });

        let mediator = Self { inner };
        let executor = Executor::new(mediator.downgrade(), renderer, receiver);
        let handle = thread::Builder::new().name(thread_name).spawn(move || executor.run())?;
        *mediator.inner.executor.lock() = Some(handle);

        info!(showing, provisioned, screen_on, "keyguard mediator started");
        Ok(mediator)
    }

    pub(crate) fn from_weak(inner: &Weak<Inner>) -> Option<Self> {
        inner.upgrade().map(|inner| Self { inner })
    }

    pub(crate) fn downgrade(&self) -> Weak<Inner> {
        Arc::downgrade(&self.inner)
    }

    /// Stop the executor after it drains everything queued so far.
    ///
    /// Commands posted afterwards are dropped. Must not be called from the
    /// executor thread (e.g. from inside a renderer call).
    ///
    /// Dropping every handle also ends the executor, but only once nothing
    /// else (a collaborator holding a handle, an unfinished pre-hide
    /// callback) keeps the session or its queue alive.
    pub fn shutdown(&self) {
        let callback = self.inner.state.lock().monitor_callback.take();
        if let Some(id) = callback {
            self.inner.services.update_monitor.remove_callback(id);
        }

        self.inner.queue.post(Command::Shutdown);

        let handle = self.inner.executor.lock().take();
        let Some(handle) = handle else {
            return;
        };
        if handle.thread().id() == thread::current().id() {
            warn!("shutdown called from the executor thread, not joining");
            return;
        }
        if handle.join().is_err() {
            warn!("executor thread panicked");
        }
        info!("keyguard mediator stopped");
    }

    /// Block until every command queued before this call has been applied.
    ///
    /// Must not be called from the executor thread or from inside an async
    /// runtime.
    pub fn sync(&self) {
        let (tx, rx) = oneshot::channel();
        self.inner.queue.post(Command::Barrier(tx));
        // An error means the executor is gone; nothing left to wait for.
        let _ = rx.blocking_recv();
    }

    /// Commands queued and not yet applied by the executor.
    pub fn pending_commands(&self) -> usize {
        self.inner.queue.pending()
    }

    /// Atomic copy of the session state.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.state.lock().snapshot()
    }

    /// Is the lock surface showing?
    pub fn is_showing(&self) -> bool {
        self.inner.state.lock().showing
    }

    /// Is the lock surface covered by another surface?
    pub fn is_occluded(&self) -> bool {
        self.inner.state.lock().occluded
    }

    /// Is the lock surface showing and not covered?
    pub fn is_showing_and_not_occluded(&self) -> bool {
        let state = self.inner.state.lock();
        state.showing && !state.occluded
    }

    /// Whether external callers currently permit the lock surface.
    pub fn is_externally_enabled(&self) -> bool {
        self.inner.state.lock().externally_enabled
    }

    /// Input is restricted while showing, while an external disable is hiding
    /// a surface that must come back, and before provisioning.
    pub fn is_input_restricted(&self) -> bool {
        let state = self.inner.state.lock();
        let provisioned = self.inner.services.update_monitor.is_device_provisioned();
        debug!(
            showing = state.showing,
            needs_reshow = state.needs_reshow_when_reenabled,
            provisioned,
            "is_input_restricted"
        );
        state.showing || state.needs_reshow_when_reenabled || !provisioned
    }

    /// A secure credential, a PIN-locked SIM or the anti-theft lock protects
    /// the device.
    pub fn is_secure(&self) -> bool {
        let services = &self.inner.services;
        services.policy.is_secure()
            || services.update_monitor.is_any_sim_pin_secure()
            || services.anti_theft.is_locked()
    }

    /// Whether the lock surface can be dismissed without a credential.
    pub fn is_dismissable(&self) -> bool {
        let done_pending = self.inner.state.lock().done_pending;
        done_pending || !self.is_secure()
    }

    pub(crate) fn show_inputs(&self, state: &SessionState) -> ShowInputs {
        let services = &self.inner.services;
        let monitor = &services.update_monitor;

        let subscriptions = monitor
            .subscriptions()
            .into_iter()
            .map(|sub| SubscriptionLock {
                condition: monitor.sim_condition(sub),
                pin_secure: monitor.is_sim_pin_secure(sub),
            })
            .collect();

        ShowInputs {
            externally_enabled: state.externally_enabled,
            alarm_boot: services.power_off_alarm.is_alarm_boot(),
            already_showing: state.renderer_showing || state.show_pending,
            provisioned: monitor.is_device_provisioned(),
            lock_screen_disabled: services.policy.is_lock_screen_disabled(),
            anti_theft_locked: services.anti_theft.is_locked(),
            just_decrypted: services.policy.just_decrypted(),
            require_sim: self.inner.config.require_sim,
            subscriptions,
        }
    }

    /// Show the lock surface if the current policy calls for it.
    pub(crate) fn do_keyguard_locked(&self, state: &mut SessionState, options: Option<ShowOptions>) {
        let inputs = self.show_inputs(state);
        match evaluate_show_decision(&inputs, options) {
            ShowDecision::Show(options) => {
                debug!("showing the lock screen");
                self.show_locked(state, options);
            },
            ShowDecision::ForceHide => {
                debug!("not showing lock screen since just decrypted");
                state.showing = false;
                self.hide_locked(state);
            },
            ShowDecision::Skip(reason) => {
                debug!(?reason, locked_or_missing = inputs.locked_or_missing(), "not showing");
            },
        }
    }

    pub(crate) fn show_locked(&self, state: &mut SessionState, options: Option<ShowOptions>) {
        // Stay awake until the surface is up; released by the executor.
        self.inner.services.power.acquire_wake_lock();
        state.show_pending = true;
        self.inner.queue.post(Command::Show { options });
    }

    pub(crate) fn hide_locked(&self, state: &mut SessionState) {
        state.show_pending = false;
        self.inner.queue.post(Command::Hide);
    }

    pub(crate) fn reset_state_locked(&self) {
        self.inner.queue.post(Command::Reset);
    }

    /// Arm the lock surface after the lock-later grace period.
    pub(crate) fn do_keyguard_later_locked(&self, state: &mut SessionState) {
        let services = &self.inner.services;
        let config = &self.inner.config;

        let timeouts = LockTimeouts {
            display_timeout: services
                .policy
                .screen_off_timeout()
                .unwrap_or(config.default_display_timeout),
            lock_after: services.policy.lock_after_timeout().unwrap_or(config.default_lock_after),
            max_time_to_lock: services.policy.max_time_to_lock(),
        };

        let Some(delay) = delayed_lock_after(&timeouts) else {
            debug!(?timeouts, "lock-later delay already elapsed, locking now");
            state.suppress_next_lock_sound = true;
            self.do_keyguard_locked(state, None);
            return;
        };

        // A new request replaces any alarm already armed.
        state.cancel_delayed_show();
        let token = state.delayed_show_sequence;
        let deadline = services.clock.now() + delay;
        let weak = self.downgrade();
        services.scheduler.schedule_exact(
            deadline,
            token,
            Box::new(move |token| {
                if let Some(mediator) = Self::from_weak(&weak) {
                    mediator.on_delayed_keyguard(token);
                }
            }),
        );
        debug!(seq = token, ?delay, "scheduled delayed show");
    }

    /// Delayed-show alarm fired.
    pub(crate) fn on_delayed_keyguard(&self, token: u64) {
        let mut state = self.inner.state.lock();
        if state.delayed_show_sequence != token {
            debug!(seq = token, current = state.delayed_show_sequence, "ignoring stale delayed show");
            return;
        }
        debug!(seq = token, "delayed show fired");
        // The screen went off on its own; no lock sound.
        state.suppress_next_lock_sound = true;
        self.do_keyguard_locked(&mut state, None);
    }

    /// Send "user present" now, or once boot completes.
    pub(crate) fn send_user_present_locked(&self, state: &mut SessionState) {
        if state.boot_completed {
            log_failure(
                "broadcaster.send_user_present",
                self.inner.services.broadcaster.send_user_present(state.current_user),
            );
        } else {
            state.boot_send_user_present = true;
        }
    }

    pub(crate) fn maybe_send_user_present(&self) {
        let mut state = self.inner.state.lock();
        // With the lock screen set to "None" there is no done sequence to
        // send it from.
        if state.system_ready && self.inner.services.policy.is_lock_screen_disabled() {
            self.send_user_present_locked(&mut state);
        }
    }
}

/// Deliver a verify-unlock result.
pub(crate) fn notify_exit(callback: Box<dyn ExitCallback>, success: bool) {
    log_failure("exit_callback.on_exit_result", callback.on_exit_result(success));
}
