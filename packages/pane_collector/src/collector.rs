use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::CollectorError;
use crate::fingerprint::ContentFingerprint;
use crate::mux::MuxAdapter;
use crate::pane::{PaneIdentity, PaneInfo, PaneUpdate};
use crate::registry::{Observation, SharedRegistry};

/// Capacity of the update channel. Updates beyond this are dropped.
pub const UPDATE_CHANNEL_CAPACITY: usize = 100;

#[derive(Clone, Debug)]
pub struct CollectorConfig {
    /// Period of the sampling timer
    pub poll_interval: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// Counters describing sampler activity.
#[derive(Debug, Default)]
pub struct CollectorStats {
    pub ticks: AtomicU64,
    pub list_failures: AtomicU64,
    pub capture_failures: AtomicU64,
    pub updates_emitted: AtomicU64,
    /// Updates discarded because the channel was full or had no consumer
    pub updates_dropped: AtomicU64,
    /// Whether the most recent listing attempt failed
    list_failing: AtomicBool,
}

impl CollectorStats {
    pub fn is_list_failing(&self) -> bool {
        self.list_failing.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> CollectorStatsSnapshot {
        CollectorStatsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            list_failures: self.list_failures.load(Ordering::Relaxed),
            capture_failures: self.capture_failures.load(Ordering::Relaxed),
            updates_emitted: self.updates_emitted.load(Ordering::Relaxed),
            updates_dropped: self.updates_dropped.load(Ordering::Relaxed),
            list_failing: self.is_list_failing(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CollectorStatsSnapshot {
    pub ticks: u64,
    pub list_failures: u64,
    pub capture_failures: u64,
    pub updates_emitted: u64,
    pub updates_dropped: u64,
    pub list_failing: bool,
}

/// Outcome of a single tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SampleReport {
    /// Listing failed; nothing else happened this tick
    pub list_failed: bool,
    pub listed: usize,
    pub captured: usize,
    pub emitted: usize,
    pub dropped: usize,
}

/// State shared between the collector handle and its sampler task.
struct Sampler<A> {
    adapter: A,
    registry: SharedRegistry,
    stats: Arc<CollectorStats>,
}

impl<A: MuxAdapter> Sampler<A> {
    /// One full tick: list, capture, diff, emit, evict.
    ///
    /// Captures run before the registry's writer lock is taken so snapshot
    /// readers are never stalled behind a slow subprocess.
    async fn tick(&self, updates: &mpsc::Sender<PaneUpdate>) -> SampleReport {
        self.stats.ticks.fetch_add(1, Ordering::Relaxed);

        let panes = match self.adapter.list_panes().await {
            Ok(panes) => {
                if self.stats.list_failing.swap(false, Ordering::Relaxed) {
                    info!("Pane listing recovered");
                }
                panes
            }
            Err(e) => {
                self.stats.list_failures.fetch_add(1, Ordering::Relaxed);
                if self.stats.list_failing.swap(true, Ordering::Relaxed) {
                    debug!(error = %e, "Pane listing still failing");
                } else {
                    warn!(error = %e, "Failed to list panes");
                }
                return SampleReport {
                    list_failed: true,
                    ..Default::default()
                };
            }
        };

        let observed: HashSet<PaneIdentity> = panes.iter().map(|p| p.id.clone()).collect();
        let mut report = SampleReport {
            listed: panes.len(),
            ..Default::default()
        };

        let mut captured: Vec<(PaneInfo, Vec<u8>)> = Vec::with_capacity(panes.len());
        for pane in panes {
            match self.adapter.capture_pane(&pane.id).await {
                Ok(content) => captured.push((pane, content)),
                Err(e) => {
                    self.stats.capture_failures.fetch_add(1, Ordering::Relaxed);
                    debug!(pane = %pane.id, error = %e, "Failed to capture pane");
                }
            }
        }
        report.captured = captured.len();

        let mut registry = self.registry.write().await;
        for (info, raw) in captured {
            // Digest the bytes as captured; decoding may be lossy.
            let fingerprint = ContentFingerprint::of(&raw);
            if registry.observe(info.clone(), fingerprint) == Observation::Unchanged {
                continue;
            }

            let content = String::from_utf8(raw)
                .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned());

            let update = PaneUpdate {
                info,
                content,
                fingerprint,
            };
            match updates.try_send(update) {
                Ok(()) => {
                    report.emitted += 1;
                    self.stats.updates_emitted.fetch_add(1, Ordering::Relaxed);
                }
                Err(TrySendError::Full(update)) | Err(TrySendError::Closed(update)) => {
                    report.dropped += 1;
                    self.stats.updates_dropped.fetch_add(1, Ordering::Relaxed);
                    debug!(pane = %update.info.id, "Update channel unavailable, dropping update");
                }
            }
        }
        registry.retain(&observed);

        report
    }

    async fn run(
        self: Arc<Self>,
        poll_interval: Duration,
        updates: mpsc::Sender<PaneUpdate>,
        cancel: CancellationToken,
    ) {
        let mut interval = tokio::time::interval(poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!(interval_ms = poll_interval.as_millis() as u64, "Sampler started");
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }
            // Stop is only observed between ticks; an in-flight tick finishes.
            self.tick(&updates).await;
        }
        debug!("Sampler stopped");
    }
}

/// Periodic pane sampler.
///
/// Emits a [`PaneUpdate`] on a bounded channel whenever a pane's content
/// fingerprint changes. The channel closes once the sampler task exits.
pub struct Collector<A> {
    sampler: Arc<Sampler<A>>,
    poll_interval: Duration,
    cancel: CancellationToken,
    /// Held until `start` hands it to the sampler task
    updates_tx: Mutex<Option<mpsc::Sender<PaneUpdate>>>,
    updates_rx: Mutex<Option<mpsc::Receiver<PaneUpdate>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<A: MuxAdapter> Collector<A> {
    pub fn new(adapter: A, config: CollectorConfig) -> Self {
        let (tx, rx) = mpsc::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            sampler: Arc::new(Sampler {
                adapter,
                registry: SharedRegistry::new(),
                stats: Arc::new(CollectorStats::default()),
            }),
            poll_interval: config.poll_interval,
            cancel: CancellationToken::new(),
            updates_tx: Mutex::new(Some(tx)),
            updates_rx: Mutex::new(Some(rx)),
            task: Mutex::new(None),
        }
    }

    /// Spawn the sampler task. May succeed at most once.
    pub fn start(&self) -> Result<(), CollectorError> {
        let tx = self
            .updates_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(CollectorError::AlreadyStarted)?;

        let handle = tokio::spawn(self.sampler.clone().run(
            self.poll_interval,
            tx,
            self.cancel.clone(),
        ));
        *self.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        Ok(())
    }

    /// Ask the sampler to exit at the next tick boundary. Idempotent.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Wait for the sampler task to exit. Returns immediately if it was
    /// never started or has already been joined.
    pub async fn join(&self) {
        let handle = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Sampler task ended abnormally: {}", e);
            }
        }
    }

    /// Take the receiving end of the update channel.
    ///
    /// There is a single consumer; every call after the first returns `None`.
    pub fn updates(&self) -> Option<mpsc::Receiver<PaneUpdate>> {
        self.updates_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Run one tick immediately, without the timer.
    ///
    /// Only available before [`start`](Self::start): afterwards the update
    /// channel belongs to the sampler task.
    pub async fn sample_once(&self) -> Result<SampleReport, CollectorError> {
        let tx = self
            .updates_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(CollectorError::AlreadyStarted)?;
        Ok(self.sampler.tick(&tx).await)
    }

    /// Current registry snapshot.
    pub async fn panes(&self) -> Vec<PaneInfo> {
        self.sampler.registry.snapshot().await
    }

    pub fn registry(&self) -> SharedRegistry {
        self.sampler.registry.clone()
    }

    pub fn stats(&self) -> Arc<CollectorStats> {
        self.sampler.stats.clone()
    }
}

impl<A> Drop for Collector<A> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MuxError;

    /// Adapter with a fixed listing; every pane's content is its title.
    struct StaticMux {
        panes: Vec<PaneInfo>,
        fail_list: bool,
    }

    impl MuxAdapter for StaticMux {
        async fn list_panes(&self) -> Result<Vec<PaneInfo>, MuxError> {
            if self.fail_list {
                return Err(MuxError::Spawn {
                    binary: "static".to_string(),
                    source: std::io::Error::other("scripted failure"),
                });
            }
            Ok(self.panes.clone())
        }

        async fn capture_pane(&self, id: &PaneIdentity) -> Result<Vec<u8>, MuxError> {
            let pane = self.panes.iter().find(|p| &p.id == id);
            Ok(pane.map(|p| p.title.clone().into_bytes()).unwrap_or_default())
        }
    }

    fn static_collector(count: usize, fail_list: bool) -> Collector<StaticMux> {
        let panes = (0..count)
            .map(|i| PaneInfo {
                id: PaneIdentity::new("gt-main", "0", i.to_string()),
                title: format!("pane {i}"),
                cols: 80,
                rows: 24,
            })
            .collect();
        Collector::new(
            StaticMux { panes, fail_list },
            CollectorConfig {
                poll_interval: Duration::from_millis(10),
            },
        )
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let collector = static_collector(0, false);
        assert!(collector.start().is_ok());
        assert_eq!(collector.start(), Err(CollectorError::AlreadyStarted));
        collector.stop();
        collector.join().await;
    }

    #[tokio::test]
    async fn test_updates_taken_once() {
        let collector = static_collector(0, false);
        assert!(collector.updates().is_some());
        assert!(collector.updates().is_none());
    }

    #[tokio::test]
    async fn test_stop_closes_update_channel() {
        let collector = static_collector(2, false);
        let mut rx = collector.updates().unwrap();
        collector.start().unwrap();

        // First tick emits both panes.
        let first = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap();
        assert!(first.is_some());

        collector.stop();
        collector.stop();
        collector.join().await;

        // Drain what is buffered; the channel must then report closed.
        let mut remaining = 0;
        while rx.recv().await.is_some() {
            remaining += 1;
        }
        assert_eq!(remaining, 1);
    }

    #[tokio::test]
    async fn test_dropping_started_collector_stops_sampler() {
        let collector = static_collector(1, false);
        let mut rx = collector.updates().unwrap();
        collector.start().unwrap();
        drop(collector);

        // The sampler owns the only sender; the channel closes once it exits.
        let drained = tokio::time::timeout(Duration::from_secs(2), async {
            while rx.recv().await.is_some() {}
        })
        .await;
        assert!(drained.is_ok(), "sampler kept running after drop");
    }

    #[tokio::test]
    async fn test_sample_once_unavailable_after_start() {
        let collector = static_collector(1, false);
        collector.start().unwrap();
        assert_eq!(
            collector.sample_once().await,
            Err(CollectorError::AlreadyStarted)
        );
        collector.stop();
        collector.join().await;
    }

    #[tokio::test]
    async fn test_list_failure_tracked_in_stats() {
        let collector = static_collector(1, true);
        let report = collector.sample_once().await.unwrap();
        assert!(report.list_failed);
        let stats = collector.stats().snapshot();
        assert_eq!(stats.ticks, 1);
        assert_eq!(stats.list_failures, 1);
        assert!(stats.list_failing);
        assert!(collector.panes().await.is_empty());
    }

    #[tokio::test]
    async fn test_unchanged_panes_not_reemitted() {
        let collector = static_collector(3, false);
        let mut rx = collector.updates().unwrap();

        let first = collector.sample_once().await.unwrap();
        assert_eq!(first.emitted, 3);
        let second = collector.sample_once().await.unwrap();
        assert_eq!(second.emitted, 0);
        assert_eq!(second.listed, 3);

        let mut received = Vec::new();
        while let Ok(update) = rx.try_recv() {
            received.push(update.info.id.pane);
        }
        assert_eq!(received, vec!["0", "1", "2"]);
        assert_eq!(collector.stats().snapshot().updates_emitted, 3);
    }
}
