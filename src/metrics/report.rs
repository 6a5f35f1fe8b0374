use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::ReservoirKind;
use crate::snapshot::{Snapshot, SnapshotSize};

/// A complete statistical breakdown of one metric.
/// Serialized straight into the JSON and SSE responses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotReport {
    pub kind: ReservoirKind,
    pub count: u64,
    /// Retained samples or histogram bytes, tagged so readers can tell which
    pub size: SnapshotSize,
    pub min: i64,
    pub max: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_user_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_user_value: Option<String>,
    pub mean: f64,
    pub std_dev: f64,
    pub median: f64,
    pub p75: f64,
    pub p95: f64,
    pub p98: f64,
    pub p99: f64,
    pub p999: f64,
}

impl SnapshotReport {
    /// Reads every statistic out of a snapshot once.
    pub fn from_snapshot(kind: ReservoirKind, snap: &dyn Snapshot) -> Self {
        Self {
            kind,
            count: snap.count(),
            size: snap.size(),
            min: snap.min(),
            max: snap.max(),
            min_user_value: snap.min_user_value().map(str::to_owned),
            max_user_value: snap.max_user_value().map(str::to_owned),
            mean: snap.mean(),
            std_dev: snap.std_dev(),
            median: snap.median(),
            p75: snap.percentile_75(),
            p95: snap.percentile_95(),
            p98: snap.percentile_98(),
            p99: snap.percentile_99(),
            p999: snap.percentile_999(),
        }
    }

    /// Convenience: is this report backed by at least one observation?
    pub fn has_data(&self) -> bool {
        self.count > 0
    }
}

/// Every registered metric at one instant.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    pub taken_at: DateTime<Utc>,
    pub metrics: BTreeMap<String, SnapshotReport>,
}
