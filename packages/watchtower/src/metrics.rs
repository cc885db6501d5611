//! Server metrics for observability
//!
//! Counters for the hub and its clients. Collector counters live in
//! `pane_collector::CollectorStats` and are merged in at snapshot time.

use pane_collector::CollectorStatsSnapshot;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Server-wide metrics
#[derive(Debug, Default)]
pub struct ServerMetrics {
    // Connection metrics
    /// Currently registered clients
    pub active_connections: AtomicU64,
    /// Total clients registered since server start
    pub total_connections: AtomicU64,
    /// Clients removed because their send queue overflowed
    pub evictions: AtomicU64,

    // Message metrics
    /// Payloads fanned out by the hub
    pub broadcasts: AtomicU64,
    /// Text frames written to sockets
    pub frames_sent: AtomicU64,
    /// Initial `pane_list` messages that did not fit the client's queue
    pub initial_snapshots_dropped: AtomicU64,

    // Error metrics
    /// Updates that could not be encoded
    pub encode_failures: AtomicU64,

    start_time: Option<Instant>,
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    pub fn connection_opened(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        self.total_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn client_evicted(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
        self.connection_closed();
    }

    pub fn broadcast(&self) {
        self.broadcasts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frame_sent(&self) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn initial_snapshot_dropped(&self) {
        self.initial_snapshots_dropped
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn encode_failed(&self) {
        self.encode_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0)
    }

    /// Create a snapshot of all metrics
    pub fn snapshot(&self, collector: CollectorStatsSnapshot) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.uptime_secs(),
            connections: ConnectionMetrics {
                active: self.active_connections.load(Ordering::Relaxed),
                total: self.total_connections.load(Ordering::Relaxed),
                evicted: self.evictions.load(Ordering::Relaxed),
            },
            messages: MessageMetrics {
                broadcasts: self.broadcasts.load(Ordering::Relaxed),
                frames_sent: self.frames_sent.load(Ordering::Relaxed),
                initial_snapshots_dropped: self.initial_snapshots_dropped.load(Ordering::Relaxed),
                encode_failures: self.encode_failures.load(Ordering::Relaxed),
            },
            collector: CollectorMetrics {
                ticks: collector.ticks,
                list_failures: collector.list_failures,
                capture_failures: collector.capture_failures,
                updates_emitted: collector.updates_emitted,
                updates_dropped: collector.updates_dropped,
                list_failing: collector.list_failing,
            },
        }
    }
}

/// Serializable snapshot of metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub connections: ConnectionMetrics,
    pub messages: MessageMetrics,
    pub collector: CollectorMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionMetrics {
    pub active: u64,
    pub total: u64,
    pub evicted: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageMetrics {
    pub broadcasts: u64,
    pub frames_sent: u64,
    pub initial_snapshots_dropped: u64,
    pub encode_failures: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorMetrics {
    pub ticks: u64,
    pub list_failures: u64,
    pub capture_failures: u64,
    pub updates_emitted: u64,
    pub updates_dropped: u64,
    pub list_failing: bool,
}

/// Health status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub clients: u64,
    pub panes: u64,
    pub uptime_secs: u64,
}
