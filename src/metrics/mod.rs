pub mod hdr;
pub mod registry;
pub mod report;
pub mod reservoir;
pub mod stream;

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::snapshot::Snapshot;

pub use hdr::HdrReservoir;
pub use registry::MetricsRegistry;
pub use report::{MetricsReport, SnapshotReport};
pub use reservoir::{SlidingWindowReservoir, UniformReservoir};

#[derive(Debug, Error)]
pub enum ReservoirError {
    #[error("histogram creation failed: {0:?}")]
    Creation(hdrhistogram::CreationError),
    #[error("value {value} could not be recorded: {source:?}")]
    Record {
        value: i64,
        source: hdrhistogram::RecordError,
    },
    #[error("metric {name:?} not created: registry already holds {limit} metrics")]
    TooManyMetrics { name: String, limit: usize },
}

impl From<hdrhistogram::CreationError> for ReservoirError {
    fn from(e: hdrhistogram::CreationError) -> Self {
        Self::Creation(e)
    }
}

/// Which sampling strategy backs a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservoirKind {
    /// Algorithm R over the whole stream, exact snapshot
    Uniform,
    /// Most recent N values, exact snapshot
    SlidingWindow,
    /// Every value bucketed into an HdrHistogram, approximate snapshot
    Hdr,
}

impl FromStr for ReservoirKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uniform" => Ok(Self::Uniform),
            "sliding_window" => Ok(Self::SlidingWindow),
            "hdr" => Ok(Self::Hdr),
            other => Err(format!("unknown reservoir kind {other:?}")),
        }
    }
}

/// A single observation pushed into a reservoir.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub value: i64,
    /// Optional label carried to the snapshot when this sample is the min or max
    pub user_value: Option<String>,
}

/// Write side of a metric: accepts samples and produces snapshots.
///
/// Implementations guard their own state, so a reservoir can be shared
/// behind an `Arc` between recording handlers and reporters.
pub trait Reservoir: Send + Sync {
    fn kind(&self) -> ReservoirKind;

    /// Total samples seen since the last reset.
    fn count(&self) -> u64;

    fn update(&self, value: i64, user_value: Option<&str>) -> Result<(), ReservoirError>;

    /// Immutable view of what has been recorded so far.
    fn snapshot(&self) -> Box<dyn Snapshot>;

    fn reset(&self);
}
