//! Session state.
//!
//! One struct, one mutex. Every field is read and written only while holding
//! the mediator's lock; [`SessionSnapshot`] lets tests observe all of it in a
//! single atomic read.

use std::fmt;

use keyguard_core::{PRIMARY_USER, UserId};

use crate::collaborators::{CallbackId, ExitCallback};

/// Presentation phase derived from the session flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentationPhase {
    /// Not showing.
    Hidden,
    /// Showing.
    Showing,
    /// A hide has started and is waiting for its exit animation.
    Hiding,
}

/// Mutable state guarded by the mediator lock.
pub(crate) struct SessionState {
    pub(crate) showing: bool,
    pub(crate) occluded: bool,
    pub(crate) externally_enabled: bool,
    pub(crate) needs_reshow_when_reenabled: bool,
    pub(crate) hiding: bool,
    /// Bumped by every hide and every show; a pre-hide completion only
    /// counts for the hide that started it.
    pub(crate) hide_generation: u64,
    pub(crate) done_pending: bool,
    pub(crate) hide_animation_run: bool,
    /// A done sequence is between `Done` and the hide finalizing.
    pub(crate) done_in_progress: bool,
    pub(crate) delayed_show_sequence: u64,
    pub(crate) pending_exit: Option<Box<dyn ExitCallback>>,
    pub(crate) waiting_for_visible: bool,
    pub(crate) screen_on: bool,
    pub(crate) phone_idle: bool,
    pub(crate) switching_user: bool,
    pub(crate) ipo_shutdown: bool,
    pub(crate) ipo_generation: u64,
    pub(crate) system_ready: bool,
    pub(crate) boot_completed: bool,
    pub(crate) boot_send_user_present: bool,
    pub(crate) suppress_next_lock_sound: bool,
    /// Last value of `Renderer::is_showing` seen by the executor.
    pub(crate) renderer_showing: bool,
    /// A `Show` command is queued and not yet applied.
    pub(crate) show_pending: bool,
    pub(crate) current_user: UserId,
    pub(crate) monitor_callback: Option<CallbackId>,
}

impl SessionState {
    pub(crate) fn new(showing: bool, screen_on: bool) -> Self {
        Self {
            showing,
            occluded: false,
            externally_enabled: true,
            needs_reshow_when_reenabled: false,
            hiding: false,
            hide_generation: 0,
            done_pending: false,
            hide_animation_run: false,
            done_in_progress: false,
            delayed_show_sequence: 0,
            pending_exit: None,
            waiting_for_visible: false,
            screen_on,
            phone_idle: true,
            switching_user: false,
            ipo_shutdown: false,
            ipo_generation: 0,
            system_ready: false,
            boot_completed: false,
            boot_send_user_present: false,
            // The first lock after boot is silent.
            suppress_next_lock_sound: true,
            renderer_showing: false,
            show_pending: false,
            current_user: PRIMARY_USER,
            monitor_callback: None,
        }
    }

    pub(crate) fn phase(&self) -> PresentationPhase {
        if self.hiding {
            PresentationPhase::Hiding
        } else if self.showing {
            PresentationPhase::Showing
        } else {
            PresentationPhase::Hidden
        }
    }

    /// Invalidate every delayed-show alarm scheduled so far.
    pub(crate) fn cancel_delayed_show(&mut self) {
        self.delayed_show_sequence = self.delayed_show_sequence.wrapping_add(1);
    }

    pub(crate) fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase(),
            showing: self.showing,
            occluded: self.occluded,
            externally_enabled: self.externally_enabled,
            needs_reshow_when_reenabled: self.needs_reshow_when_reenabled,
            hiding: self.hiding,
            done_pending: self.done_pending,
            hide_animation_run: self.hide_animation_run,
            done_in_progress: self.done_in_progress,
            delayed_show_sequence: self.delayed_show_sequence,
            verify_pending: self.pending_exit.is_some(),
            waiting_for_visible: self.waiting_for_visible,
            screen_on: self.screen_on,
            phone_idle: self.phone_idle,
            switching_user: self.switching_user,
            ipo_shutdown: self.ipo_shutdown,
            system_ready: self.system_ready,
            boot_completed: self.boot_completed,
            suppress_next_lock_sound: self.suppress_next_lock_sound,
            renderer_showing: self.renderer_showing,
            current_user: self.current_user,
        }
    }
}

impl fmt::Debug for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.snapshot(), f)
    }
}

/// Point-in-time copy of the session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Derived presentation phase.
    pub phase: PresentationPhase,
    /// Lock surface presented.
    pub showing: bool,
    /// Lock surface covered by another surface.
    pub occluded: bool,
    /// External callers permit the lock surface.
    pub externally_enabled: bool,
    /// A disable hid the surface; re-enabling restores it.
    pub needs_reshow_when_reenabled: bool,
    /// A hide is waiting for its exit animation.
    pub hiding: bool,
    /// The renderer announced an imminent authenticated done.
    pub done_pending: bool,
    /// The pre-hide animation already ran.
    pub hide_animation_run: bool,
    /// A done sequence is in flight.
    pub done_in_progress: bool,
    /// Delayed-show token.
    pub delayed_show_sequence: u64,
    /// A verify-unlock request is outstanding.
    pub verify_pending: bool,
    /// A re-enable caller is blocked on the done-drawing rendezvous.
    pub waiting_for_visible: bool,
    /// Screen is on.
    pub screen_on: bool,
    /// No call is active.
    pub phone_idle: bool,
    /// A user switch is in progress.
    pub switching_user: bool,
    /// A power-off sequence is in progress.
    pub ipo_shutdown: bool,
    /// The system finished starting.
    pub system_ready: bool,
    /// Boot completed.
    pub boot_completed: bool,
    /// The next lock sound is skipped.
    pub suppress_next_lock_sound: bool,
    /// Last renderer showing state seen by the executor.
    pub renderer_showing: bool,
    /// Current user.
    pub current_user: UserId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_follows_flags() {
        let mut state = SessionState::new(false, true);
        assert_eq!(state.phase(), PresentationPhase::Hidden);

        state.showing = true;
        assert_eq!(state.phase(), PresentationPhase::Showing);

        state.hiding = true;
        assert_eq!(state.phase(), PresentationPhase::Hiding);
    }

    #[test]
    fn cancel_bumps_sequence() {
        let mut state = SessionState::new(false, true);
        let before = state.delayed_show_sequence;
        state.cancel_delayed_show();
        assert_ne!(state.delayed_show_sequence, before);
    }

    #[test]
    fn first_lock_is_silent() {
        let state = SessionState::new(true, true);
        assert!(state.snapshot().suppress_next_lock_sound);
    }
}
