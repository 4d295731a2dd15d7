//! [`TokioCooldownTimer`] – the cooldown expiry as a single Tokio task.
//!
//! Arming aborts the previously spawned task before spawning a new one, so
//! at most one expiry is outstanding.  The expiry is delivered as its
//! generation number on an unbounded channel that the session loop selects
//! on.  Dropping the timer aborts the pending task.

use std::time::Duration;

use drivesafe_kernel::CooldownTimer;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

pub struct TokioCooldownTimer {
    expiries: mpsc::UnboundedSender<u64>,
    pending: Option<JoinHandle<()>>,
}

impl TokioCooldownTimer {
    pub fn new(expiries: mpsc::UnboundedSender<u64>) -> Self {
        Self {
            expiries,
            pending: None,
        }
    }

    /// `true` while an expiry task is scheduled and has not yet finished.
    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl CooldownTimer for TokioCooldownTimer {
    /// Must be called from within a Tokio runtime.
    fn arm(&mut self, generation: u64, duration: Duration) {
        let replaced = self.is_pending();
        self.cancel();
        debug!(generation, replaced, secs = duration.as_secs(), "cooldown timer armed");
        let expiries = self.expiries.clone();
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            if expiries.send(generation).is_err() {
                debug!(generation, "cooldown expiry dropped: session gone");
            }
        }));
    }

    fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

impl Drop for TokioCooldownTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fires_after_duration() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = TokioCooldownTimer::new(tx);
        timer.arm(1, Duration::from_secs(900));
        assert!(timer.is_pending());

        tokio::time::sleep(Duration::from_secs(899)).await;
        assert!(rx.try_recv().is_err());

        assert_eq!(rx.recv().await, Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn rearm_cancels_previous_expiry() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = TokioCooldownTimer::new(tx);
        timer.arm(1, Duration::from_secs(10));
        tokio::time::sleep(Duration::from_secs(5)).await;
        timer.arm(2, Duration::from_secs(10));

        assert_eq!(rx.recv().await, Some(2));
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_expiry() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = TokioCooldownTimer::new(tx);
        timer.arm(1, Duration::from_secs(10));
        timer.cancel();
        assert!(!timer.is_pending());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn drop_aborts_pending_task() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = TokioCooldownTimer::new(tx);
        timer.arm(7, Duration::from_secs(10));
        drop(timer);

        // Every sender is gone once the aborted task is reaped.
        assert_eq!(rx.recv().await, None);
    }
}
