//! Watchtower - live terminal multiplexer panes in the browser
//!
//! Wires a [`pane_collector::Collector`] to a broadcast [`hub::Hub`] and
//! exposes the result over an axum router: `/ws` streams JSON pane messages
//! to every connected client, everything else serves the dashboard's static
//! files.

pub mod config;
pub mod handlers;
pub mod hub;
pub mod metrics;
pub mod server;

use pane_collector::{CollectorStats, SharedRegistry};
use std::sync::Arc;

use crate::hub::HubHandle;
use crate::metrics::ServerMetrics;

pub use server::build_router;

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub hub: HubHandle,
    /// Same registry the collector writes; read for health reporting
    pub registry: SharedRegistry,
    pub collector_stats: Arc<CollectorStats>,
    pub metrics: Arc<ServerMetrics>,
}
