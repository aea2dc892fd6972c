/// Scheduled task runner with an injectable clock
///
/// The session loop waits on a `Scheduler` between cycles. Shutdown is
/// cooperative: a `watch` signal wakes the scheduler early, and the current
/// cycle is always allowed to finish.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

/// Time source for the session
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by tokio timers
#[derive(Debug, Default, Clone)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Clock whose sleeps advance time instantly
///
/// Clones share the same time, so a test can keep a handle and inspect or
/// move time while the session owns another.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, duration: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::zero());
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
        tokio::task::yield_now().await;
    }
}

enum Wake {
    Elapsed,
    Signalled,
    SenderGone,
}

/// Fixed-interval ticker that stops on shutdown
pub struct Scheduler {
    clock: Arc<dyn Clock>,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl Scheduler {
    pub fn new(clock: Arc<dyn Clock>, interval: Duration, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            clock,
            interval,
            shutdown,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_shutdown(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Wait for the next tick
    ///
    /// # Returns
    /// `false` once shutdown has been requested, `true` otherwise
    pub async fn next_tick(&mut self) -> bool {
        if self.is_shutdown() {
            return false;
        }

        let clock = self.clock.clone();
        let interval = self.interval;
        let wake = tokio::select! {
            _ = clock.sleep(interval) => Wake::Elapsed,
            changed = self.shutdown.changed() => {
                if changed.is_ok() { Wake::Signalled } else { Wake::SenderGone }
            }
        };

        match wake {
            Wake::Elapsed => {}
            Wake::Signalled => debug!("Scheduler woken by shutdown signal"),
            // Nobody can request shutdown any more; keep ticking on the clock
            Wake::SenderGone => clock.sleep(interval).await,
        }

        !self.is_shutdown()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_manual_clock_sleep_advances_time() {
        let clock = ManualClock::new(start());
        clock.sleep(Duration::from_secs(300)).await;
        assert_eq!(clock.now(), start() + chrono::Duration::seconds(300));
    }

    #[tokio::test]
    async fn test_manual_clock_clones_share_time() {
        let clock = ManualClock::new(start());
        let handle = clock.clone();
        clock.advance(Duration::from_secs(60));
        assert_eq!(handle.now(), start() + chrono::Duration::seconds(60));
    }

    #[tokio::test]
    async fn test_scheduler_ticks_until_shutdown() {
        let clock = ManualClock::new(start());
        let (tx, rx) = watch::channel(false);
        let mut scheduler = Scheduler::new(Arc::new(clock.clone()), Duration::from_secs(30), rx);

        assert!(scheduler.next_tick().await);
        assert!(scheduler.next_tick().await);
        assert_eq!(clock.now(), start() + chrono::Duration::seconds(60));

        tx.send(true).unwrap();
        assert!(!scheduler.next_tick().await);
        assert!(scheduler.is_shutdown());
    }

    #[tokio::test]
    async fn test_scheduler_keeps_ticking_without_sender() {
        let clock = ManualClock::new(start());
        let (tx, rx) = watch::channel(false);
        drop(tx);
        let mut scheduler = Scheduler::new(Arc::new(clock.clone()), Duration::from_secs(10), rx);
        assert!(scheduler.next_tick().await);
        assert!(clock.now() > start());
    }

    #[tokio::test]
    async fn test_system_clock_sleep_is_real() {
        let clock = SystemClock;
        let before = clock.now();
        clock.sleep(Duration::from_millis(5)).await;
        assert!(clock.now() >= before);
    }
}
