//! Manually driven alarm scheduler.
//!
//! Alarms sit in a list until the test advances time past their deadline.
//! Firing happens outside the internal lock, in deadline order, so an alarm
//! may schedule further alarms.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use keyguard_core::Clock;
use keyguard_mediator::{AlarmFn, AlarmScheduler};
use parking_lot::Mutex;

use crate::clock::ManualClock;

struct PendingAlarm {
    deadline: Instant,
    token: u64,
    /// Insertion order, breaks deadline ties.
    order: u64,
    fire: AlarmFn,
}

#[derive(Default)]
struct Alarms {
    pending: Vec<PendingAlarm>,
    next_order: u64,
    fired: usize,
}

/// [`AlarmScheduler`] driven by a [`ManualClock`].
pub struct ManualScheduler {
    clock: Arc<ManualClock>,
    alarms: Mutex<Alarms>,
}

impl ManualScheduler {
    /// Scheduler reading deadlines against `clock`.
    pub fn new(clock: Arc<ManualClock>) -> Self {
        Self { clock, alarms: Mutex::new(Alarms::default()) }
    }

    /// Advance the clock and fire every alarm that became due.
    ///
    /// Returns the number of alarms fired.
    pub fn advance(&self, by: Duration) -> usize {
        self.clock.advance(by);
        self.fire_due()
    }

    /// Fire every alarm whose deadline has passed.
    pub fn fire_due(&self) -> usize {
        let mut fired = 0;
        while let Some(alarm) = self.pop_due() {
            tracing::trace!(token = alarm.token, "firing alarm");
            (alarm.fire)(alarm.token);
            fired += 1;
        }
        fired
    }

    fn pop_due(&self) -> Option<PendingAlarm> {
        let now = self.clock.now();
        let mut alarms = self.alarms.lock();
        let index = alarms
            .pending
            .iter()
            .enumerate()
            .filter(|(_, alarm)| alarm.deadline <= now)
            .min_by_key(|(_, alarm)| (alarm.deadline, alarm.order))
            .map(|(index, _)| index)?;
        alarms.fired += 1;
        Some(alarms.pending.swap_remove(index))
    }

    /// Alarms not yet fired.
    pub fn pending(&self) -> usize {
        self.alarms.lock().pending.len()
    }

    /// Alarms fired so far.
    pub fn fired(&self) -> usize {
        self.alarms.lock().fired
    }

    /// Time until each pending alarm, with its token, earliest first.
    pub fn pending_alarms(&self) -> Vec<(Duration, u64)> {
        let now = self.clock.now();
        let alarms = self.alarms.lock();
        let mut out: Vec<_> = alarms
            .pending
            .iter()
            .map(|alarm| (alarm.deadline.saturating_duration_since(now), alarm.token))
            .collect();
        out.sort_unstable();
        out
    }
}

impl AlarmScheduler for ManualScheduler {
    fn schedule_exact(&self, deadline: Instant, token: u64, fire: AlarmFn) {
        let mut alarms = self.alarms.lock();
        let order = alarms.next_order;
        alarms.next_order += 1;
        alarms.pending.push(PendingAlarm { deadline, token, order, fire });
    }
}
