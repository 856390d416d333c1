//! Cooperative stop signal shared by the ingest workers.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Inner {
    stopped: AtomicBool,
    notify: Notify,
}

/// Once raised, no new partitions or attempts are started.
///
/// Requests already on the wire are allowed to finish; only waits are cut
/// short.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    inner: Arc<Inner>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal and wake every pending [`StopSignal::sleep`].
    pub fn stop(&self) {
        self.inner.stopped.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    /// Sleep for `duration` unless stopped first.
    ///
    /// Returns `true` if the full duration elapsed, `false` if the signal was
    /// (or already had been) raised.
    pub async fn sleep(&self, duration: Duration) -> bool {
        let notified = self.inner.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if self.is_stopped() {
            return false;
        }

        tokio::select! {
            _ = tokio::time::sleep(duration) => !self.is_stopped(),
            _ = notified => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sleep_completes_without_stop() {
        let stop = StopSignal::new();
        assert!(stop.sleep(Duration::from_millis(5)).await);
        assert!(!stop.is_stopped());
    }

    #[tokio::test]
    async fn test_stop_interrupts_sleep() {
        let stop = StopSignal::new();
        let sleeper = stop.clone();
        let handle = tokio::spawn(async move { sleeper.sleep(Duration::from_secs(60)).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        stop.stop();

        let completed = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(!completed);
    }

    #[tokio::test]
    async fn test_sleep_after_stop_returns_immediately() {
        let stop = StopSignal::new();
        stop.stop();
        assert!(!stop.sleep(Duration::from_secs(60)).await);
    }
}
