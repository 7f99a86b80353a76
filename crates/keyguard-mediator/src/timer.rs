//! Production alarm scheduler.
//!
//! Alarms are tokio tasks sleeping until their deadline. They are never
//! aborted: a superseded alarm still fires and the receiver discards it by
//! token comparison.

use std::time::Instant;

use tokio::runtime::Handle;

use crate::collaborators::{AlarmFn, AlarmScheduler};

/// [`AlarmScheduler`] backed by a tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    /// Schedule alarms on the runtime behind `handle`.
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }
}

impl AlarmScheduler for TokioScheduler {
    fn schedule_exact(&self, deadline: Instant, token: u64, fire: AlarmFn) {
        let deadline = tokio::time::Instant::from_std(deadline);
        self.handle.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            fire(token);
        });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::oneshot;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fires_with_token_after_deadline() {
        let scheduler = TokioScheduler::new(Handle::current());
        let (tx, rx) = oneshot::channel();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        scheduler.schedule_exact(
            deadline.into_std(),
            7,
            Box::new(move |token| {
                let _ = tx.send(token);
            }),
        );

        assert_eq!(rx.await.ok(), Some(7));
        assert!(tokio::time::Instant::now() >= deadline);
    }

    #[tokio::test(start_paused = true)]
    async fn alarms_fire_in_deadline_order() {
        let scheduler = TokioScheduler::new(Handle::current());
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let now = tokio::time::Instant::now();

        for (token, secs) in [(1_u64, 10_u64), (2, 5)] {
            let tx = tx.clone();
            scheduler.schedule_exact(
                (now + Duration::from_secs(secs)).into_std(),
                token,
                Box::new(move |token| {
                    let _ = tx.send(token);
                }),
            );
        }

        assert_eq!(rx.recv().await, Some(2));
        assert_eq!(rx.recv().await, Some(1));
    }
}
