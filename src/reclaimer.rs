use crate::metrics::{RECLAIMED_TOTAL, VISITORS};
use crate::visitor::{Timestamp, VisitorStore};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, MissedTickBehavior, interval_at};

pub const DEFAULT_RECLAIM_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_IDLE_THRESHOLD: Duration = Duration::from_secs(60);

/// Periodically evicts visitor records idle for longer than `idle_threshold`.
///
/// The threshold is service-wide and independent of any tenant's window, so a
/// tenant whose window is longer than the threshold can see a client's quota
/// reset early once its record is reclaimed.
pub struct Reclaimer {
    store: Arc<VisitorStore>,
    interval: Duration,
    idle_threshold: Duration,
}

impl Reclaimer {
    pub fn new(store: Arc<VisitorStore>, interval: Duration, idle_threshold: Duration) -> Self {
        Self {
            store,
            interval,
            idle_threshold,
        }
    }

    // One pass over the store; returns how many records were evicted
    pub fn sweep(&self, now: Timestamp) -> usize {
        let evicted = self.store.for_each_stale(self.idle_threshold, now, |identity, record| {
            tracing::debug!(
                identity = %identity,
                last_seen = %record.last_seen(),
                requests = record.request_count(),
                "Evicting idle visitor"
            );
            true
        });

        RECLAIMED_TOTAL.inc_by(evicted as f64);
        VISITORS.set(self.store.len() as f64);
        evicted
    }

    // Start the sweep loop on the tokio runtime
    pub fn spawn(self) -> ReclaimerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(shutdown_rx));
        ReclaimerHandle { shutdown_tx, task }
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            interval = ?self.interval,
            idle_threshold = ?self.idle_threshold,
            "Reclaimer started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let evicted = self.sweep(Utc::now());
                    if evicted > 0 {
                        tracing::info!(evicted, remaining = self.store.len(), "Reclaimed idle visitors");
                    }
                }
                changed = shutdown.changed() => {
                    // A dropped sender counts as shutdown too
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Reclaimer stopped");
    }
}

pub struct ReclaimerHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReclaimerHandle {
    /// Signals the sweep loop to stop and waits for it to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Reclaimer task failed");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::{AdmissionController, Decision};
    use crate::policy::TenantPolicy;
    use chrono::DateTime;

    fn at(secs: i64) -> Timestamp {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn sweep_evicts_only_idle_records() {
        let store = Arc::new(VisitorStore::new());
        store.get_or_create("idle", at(0));
        store.get_or_create("active", at(100));
        let reclaimer = Reclaimer::new(Arc::clone(&store), DEFAULT_RECLAIM_INTERVAL, DEFAULT_IDLE_THRESHOLD);

        assert_eq!(reclaimer.sweep(at(120)), 1);
        assert_eq!(store.len(), 1);
        assert!(store.snapshot().contains_key("active"));
    }

    #[test]
    fn eviction_resets_quota_before_tenant_window_ends() {
        let store = Arc::new(VisitorStore::new());
        let controller = AdmissionController::new(Arc::clone(&store));
        let reclaimer = Reclaimer::new(Arc::clone(&store), DEFAULT_RECLAIM_INTERVAL, DEFAULT_IDLE_THRESHOLD);
        // Window far longer than the reclaim idle threshold
        let policy = TenantPolicy::new(1, Duration::from_secs(3600));

        assert!(controller.admit("10.0.0.1", &policy, at(0)).unwrap().is_admitted());
        assert!(!controller.admit("10.0.0.1", &policy, at(30)).unwrap().is_admitted());

        assert_eq!(reclaimer.sweep(at(61)), 1);

        // Behaves as first contact although the hour-long window has not elapsed
        assert_eq!(
            controller.admit("10.0.0.1", &policy, at(62)).unwrap(),
            Decision::Admit {
                count: 1,
                remaining: 0
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_reclaimer_sweeps_on_interval() {
        let store = Arc::new(VisitorStore::new());
        // Created far in the past so it is stale at any real clock reading
        store.get_or_create("ancient", at(0));
        let handle = Reclaimer::new(Arc::clone(&store), Duration::from_secs(60), Duration::from_secs(60)).spawn();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(store.len(), 1);

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(store.is_empty());

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_stops_the_task() {
        let store = Arc::new(VisitorStore::new());
        let handle = Reclaimer::new(store, Duration::from_secs(3600), Duration::from_secs(60)).spawn();
        assert!(!handle.is_finished());

        tokio::time::timeout(Duration::from_secs(5), handle.shutdown())
            .await
            .expect("reclaimer did not stop");
    }
}
