//! Pane Collector - terminal multiplexer pane sampling library
//!
//! This crate periodically lists the panes of an external terminal
//! multiplexer, captures their screen contents, and emits a [`PaneUpdate`]
//! whenever a pane's content changes. It has no HTTP dependencies and no
//! knowledge of how updates are delivered to clients.
//!
//! # Example
//!
//! ```no_run
//! use pane_collector::{Collector, CollectorConfig, SessionFilter, TmuxAdapter};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let filter = SessionFilter::new("gt-*").unwrap();
//!     let adapter = TmuxAdapter::new("tmux", None, filter);
//!     let collector = Collector::new(adapter, CollectorConfig {
//!         poll_interval: Duration::from_millis(100),
//!     });
//!
//!     let mut updates = collector.updates().unwrap();
//!     collector.start().unwrap();
//!
//!     while let Some(update) = updates.recv().await {
//!         println!("{} changed ({} bytes)", update.info.id, update.content.len());
//!     }
//! }
//! ```

mod collector;
mod error;
mod filter;
mod fingerprint;
pub mod mux;
mod pane;
mod registry;

pub use collector::{
    Collector, CollectorConfig, CollectorStats, CollectorStatsSnapshot, SampleReport,
    UPDATE_CHANNEL_CAPACITY,
};
pub use error::{CollectorError, FilterError, MuxError};
pub use filter::SessionFilter;
pub use fingerprint::ContentFingerprint;
pub use mux::{MuxAdapter, TmuxAdapter};
pub use pane::{LIST_PANES_FORMAT, PaneIdentity, PaneInfo, PaneUpdate, parse_pane_line};
pub use registry::{Observation, PaneRegistry, SharedRegistry};
