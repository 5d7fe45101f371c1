//! Periodic expiry sweeps for the in-memory stores.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};

use super::{CodeStore, ViewGuard};
use crate::clock::Clock;

/// A store whose expired entries can be dropped in bulk.
pub trait Sweep: Send + Sync + 'static {
    /// Name used in log fields.
    fn name(&self) -> &'static str;

    /// Remove every entry that has expired as of `now`, returning the count.
    fn sweep_expired(&self, now: DateTime<Utc>) -> usize;
}

impl Sweep for ViewGuard {
    fn name(&self) -> &'static str {
        "views"
    }

    fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        ViewGuard::sweep_expired(self, now)
    }
}

impl Sweep for CodeStore {
    fn name(&self) -> &'static str {
        "verification"
    }

    fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        CodeStore::sweep_expired(self, now)
    }
}

/// Sweep `target` every `period` until `shutdown` turns `true`.
///
/// The first sweep runs one full period after spawning.
pub fn spawn_sweeper<T>(
    target: Arc<T>,
    clock: Arc<dyn Clock>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()>
where
    T: Sweep + ?Sized,
{
    tokio::spawn(async move {
        let mut ticker = time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // interval() fires immediately; skip that tick.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = target.sweep_expired(clock.now());
                    if removed > 0 {
                        tracing::info!(store = target.name(), removed, "swept expired entries");
                    } else {
                        tracing::debug!(store = target.name(), "sweep found nothing to remove");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::debug!(store = target.name(), "sweeper stopped");
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::test_utils::{ManualClock, test_start};

    #[derive(Default)]
    struct CountingSweep {
        calls: AtomicUsize,
    }

    impl Sweep for CountingSweep {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn sweep_expired(&self, _now: DateTime<Utc>) -> usize {
            self.calls.fetch_add(1, Ordering::SeqCst);
            0
        }
    }

    #[tokio::test(start_paused = true)]
    async fn sweeps_once_per_period_after_first_period() {
        let target = Arc::new(CountingSweep::default());
        let clock = Arc::new(ManualClock::new(test_start()));
        let (_tx, rx) = watch::channel(false);

        let handle = spawn_sweeper(target.clone(), clock, Duration::from_secs(3600), rx);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(target.calls.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(target.calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(target.calls.load(Ordering::SeqCst), 2);

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn stops_when_shutdown_sender_is_dropped() {
        let target = Arc::new(CountingSweep::default());
        let clock = Arc::new(ManualClock::new(test_start()));
        let (tx, rx) = watch::channel(false);

        let handle = spawn_sweeper(target, clock, Duration::from_secs(60), rx);
        drop(tx);

        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn sweeps_code_store_with_injected_clock() {
        let clock = Arc::new(ManualClock::new(test_start()));
        let codes = Arc::new(CodeStore::new(chrono::TimeDelta::minutes(10), clock.clone()));
        codes.save_code("alice@example.com", "123456");
        codes.save_code("bob@example.com", "654321");

        let (tx, rx) = watch::channel(false);
        let handle = spawn_sweeper(codes.clone(), clock.clone(), Duration::from_secs(60), rx);

        clock.advance(chrono::TimeDelta::minutes(11));
        tokio::time::sleep(Duration::from_secs(61)).await;

        assert!(codes.is_empty());

        tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
