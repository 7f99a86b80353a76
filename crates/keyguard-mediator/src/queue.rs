//! Command queue.
//!
//! Every UI-affecting operation is posted here and applied by the single
//! executor thread in post order. Callers post while holding the session
//! lock, so lock acquisition order is application order.
//!
//! Occlusion commands collapse: each carries a sequence number and the
//! receiver drops any whose sequence has been superseded before it was
//! dequeued. Nothing else collapses.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

use keyguard_core::ShowOptions;
use tokio::sync::{mpsc, oneshot};

use crate::collaborators::ShowCallback;

/// A unit of work for the executor.
pub(crate) enum Command {
    Show { options: Option<ShowOptions> },
    Hide,
    Reset,
    VerifyUnlock,
    NotifyScreenOff,
    NotifyScreenOn { callback: Box<dyn ShowCallback> },
    Done { authenticated: bool, wake_up: bool },
    DoneDrawing,
    SetOccluded { occluded: bool, seq: u64 },
    KeyguardTimeout { options: Option<ShowOptions> },
    Dismiss { authenticated: bool },
    StartExitAnimation { start: Instant, fade: Duration },
    KeyguardGoingAway { hide: u64 },
    PreHideAnimation,
    ActivityDrawn,
    BiometricRecognized,
    AdjustStatusBar,
    Barrier(oneshot::Sender<()>),
    Shutdown,
}

impl Command {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::Show { .. } => "SHOW",
            Self::Hide => "HIDE",
            Self::Reset => "RESET",
            Self::VerifyUnlock => "VERIFY_UNLOCK",
            Self::NotifyScreenOff => "NOTIFY_SCREEN_OFF",
            Self::NotifyScreenOn { .. } => "NOTIFY_SCREEN_ON",
            Self::Done { .. } => "KEYGUARD_DONE",
            Self::DoneDrawing => "KEYGUARD_DONE_DRAWING",
            Self::SetOccluded { .. } => "SET_OCCLUDED",
            Self::KeyguardTimeout { .. } => "KEYGUARD_TIMEOUT",
            Self::Dismiss { .. } => "DISMISS",
            Self::StartExitAnimation { .. } => "START_KEYGUARD_EXIT_ANIM",
            Self::KeyguardGoingAway { .. } => "KEYGUARD_GOING_AWAY",
            Self::PreHideAnimation => "PRE_HIDE_ANIMATION",
            Self::ActivityDrawn => "ON_ACTIVITY_DRAWN",
            Self::BiometricRecognized => "BIOMETRIC_RECOGNIZED",
            Self::AdjustStatusBar => "ADJUST_STATUS_BAR",
            Self::Barrier(_) => "BARRIER",
            Self::Shutdown => "SHUTDOWN",
        }
    }
}

struct QueueShared {
    /// Sequence of the most recently posted occlusion command.
    occlusion_seq: AtomicU64,
    /// Commands posted and not yet applied.
    depth: AtomicUsize,
}

/// Any-thread sending half.
#[derive(Clone)]
pub(crate) struct CommandQueue {
    tx: mpsc::UnboundedSender<Command>,
    shared: Arc<QueueShared>,
}

/// Executor-side receiving half.
pub(crate) struct CommandReceiver {
    rx: mpsc::UnboundedReceiver<Command>,
    shared: Arc<QueueShared>,
}

pub(crate) fn channel() -> (CommandQueue, CommandReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let shared =
        Arc::new(QueueShared { occlusion_seq: AtomicU64::new(0), depth: AtomicUsize::new(0) });
    (CommandQueue { tx, shared: Arc::clone(&shared) }, CommandReceiver { rx, shared })
}

impl CommandQueue {
    /// Enqueue a command. Never blocks.
    pub(crate) fn post(&self, command: Command) {
        let name = command.name();
        self.shared.depth.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(command).is_err() {
            self.shared.depth.fetch_sub(1, Ordering::SeqCst);
            tracing::debug!(command = name, "executor stopped, dropping command");
        }
    }

    /// Enqueue an occlusion change, superseding any not yet applied.
    pub(crate) fn post_occluded(&self, occluded: bool) {
        let seq = self.shared.occlusion_seq.fetch_add(1, Ordering::SeqCst) + 1;
        self.post(Command::SetOccluded { occluded, seq });
    }

    /// Commands posted and not yet applied.
    pub(crate) fn pending(&self) -> usize {
        self.shared.depth.load(Ordering::SeqCst)
    }
}

impl CommandReceiver {
    /// Block until the next live command arrives.
    ///
    /// Returns `None` once every sender is gone. The command counts as pending
    /// until [`CommandReceiver::finished`] is called for it.
    pub(crate) fn recv(&mut self) -> Option<Command> {
        loop {
            let command = self.rx.blocking_recv()?;

            if let Command::SetOccluded { seq, .. } = &command {
                let latest = self.shared.occlusion_seq.load(Ordering::SeqCst);
                if *seq != latest {
                    tracing::trace!(seq, latest, "dropping superseded occlusion command");
                    self.finished();
                    continue;
                }
            }

            return Some(command);
        }
    }

    /// The last command returned by `recv` has been applied.
    pub(crate) fn finished(&self) {
        self.shared.depth.fetch_sub(1, Ordering::SeqCst);
    }
}
