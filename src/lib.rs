//! Point-in-time statistics over recorded samples.
//!
//! [`snapshot`] holds the two statistics strategies behind the [`Snapshot`]
//! trait: an exact one over a retained uniform sample and an approximate one
//! over an HdrHistogram. [`metrics`] holds the reservoirs that feed them and a
//! registry of named metrics; [`server`] exposes that registry over HTTP.

pub mod config;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod server;
pub mod snapshot;

pub use snapshot::{ApproximateSnapshot, ExactSnapshot, Snapshot, SnapshotError, SnapshotSize};

use std::sync::Arc;

/// Shared application state available to every handler via `State<Arc<AppState>>`.
pub struct AppState {
    pub config: config::Config,

    /// Named metrics — handlers push samples, reporters read snapshots.
    pub metrics: Arc<metrics::MetricsRegistry>,
}

impl AppState {
    pub fn new(config: config::Config) -> Self {
        let metrics = Arc::new(metrics::MetricsRegistry::new(
            config.reservoir,
            config.default_kind,
        ));
        Self { config, metrics }
    }
}
