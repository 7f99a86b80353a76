//! Final state handed to a scenario oracle.

use keyguard_mediator::{PresentationPhase, SessionSnapshot};

use crate::platform::Effect;

/// What a scenario left behind.
#[derive(Debug, Clone)]
pub struct World {
    /// Mediator state after the last step settled.
    pub snapshot: SessionSnapshot,
    /// Every effect, in order.
    pub effects: Vec<Effect>,
    /// Whether the fake renderer's surface is up.
    pub renderer_showing: bool,
    /// Whether the show wake lock is still held.
    pub wake_lock_held: bool,
    /// Alarms not yet fired.
    pub pending_alarms: usize,
}

impl World {
    /// Presentation phase.
    pub fn phase(&self) -> PresentationPhase {
        self.snapshot.phase
    }

    /// Number of effects matching `pred`.
    pub fn count(&self, pred: impl Fn(&Effect) -> bool) -> usize {
        self.effects.iter().filter(|e| pred(e)).count()
    }

    /// Index of the first `effect`.
    pub fn position(&self, effect: &Effect) -> Option<usize> {
        self.effects.iter().position(|e| e == effect)
    }

    /// Index of the last `effect`.
    pub fn last_position(&self, effect: &Effect) -> Option<usize> {
        self.effects.iter().rposition(|e| e == effect)
    }

    /// Whether `effect` happened.
    pub fn saw(&self, effect: &Effect) -> bool {
        self.effects.contains(effect)
    }

    /// Number of acquires minus number of releases of the show wake lock.
    pub fn wake_lock_balance(&self) -> i64 {
        let acquired = self.count(|e| *e == Effect::WakeLockAcquired) as i64;
        let released = self.count(|e| *e == Effect::WakeLockReleased) as i64;
        acquired - released
    }
}
