//! Point-in-time statistical views over recorded samples.
//!
//! Two independent strategies implement [`Snapshot`]:
//!
//! * [`ExactSnapshot`] owns a sorted copy of the retained raw values and
//!   answers every query by exact or interpolated arithmetic.
//! * [`ApproximateSnapshot`] wraps an HDR histogram and delegates every query
//!   to its bucketed storage.
//!
//! A snapshot never changes after construction, so every query takes `&self`
//! and is safe to call from any number of threads at once.

pub mod approximate;
pub mod exact;

pub use approximate::ApproximateSnapshot;
pub use exact::ExactSnapshot;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum SnapshotError {
    #[error("{0} is not in [0..1]")]
    InvalidQuantile(f64),
}

/// What `Snapshot::size` is measuring.
///
/// The exact variant reports how many raw values it retained, the approximate
/// variant reports the estimated memory held by its histogram. The two are
/// different units and must not be compared with each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SnapshotSize {
    Retained(usize),
    FootprintBytes(usize),
}

impl SnapshotSize {
    pub fn retained(&self) -> Option<usize> {
        match *self {
            Self::Retained(n) => Some(n),
            Self::FootprintBytes(_) => None,
        }
    }

    pub fn footprint_bytes(&self) -> Option<usize> {
        match *self {
            Self::FootprintBytes(n) => Some(n),
            Self::Retained(_) => None,
        }
    }
}

/// Read-only statistical view shared by both sampling strategies.
pub trait Snapshot: Send + Sync {
    /// Total number of values that ever contributed to this view.
    ///
    /// For the exact variant this may exceed the number of retained values
    /// when the reservoir subsampled.
    fn count(&self) -> u64;

    fn size(&self) -> SnapshotSize;

    fn min(&self) -> i64;
    fn max(&self) -> i64;

    fn min_user_value(&self) -> Option<&str>;
    fn max_user_value(&self) -> Option<&str>;

    fn mean(&self) -> f64;
    fn std_dev(&self) -> f64;

    /// Value at `quantile`, which must lie in `[0, 1]`.
    fn value(&self, quantile: f64) -> Result<f64, SnapshotError>;

    /// Every retained value. Calling this again restarts from the beginning.
    fn values(&self) -> Box<dyn Iterator<Item = i64> + '_>;

    fn median(&self) -> f64 {
        self.value(0.5).unwrap_or_default()
    }

    fn percentile_75(&self) -> f64 {
        self.value(0.75).unwrap_or_default()
    }

    fn percentile_95(&self) -> f64 {
        self.value(0.95).unwrap_or_default()
    }

    fn percentile_98(&self) -> f64 {
        self.value(0.98).unwrap_or_default()
    }

    fn percentile_99(&self) -> f64 {
        self.value(0.99).unwrap_or_default()
    }

    fn percentile_999(&self) -> f64 {
        self.value(0.999).unwrap_or_default()
    }
}

/// Rejects quantiles outside `[0, 1]`, including NaN.
pub(crate) fn check_quantile(quantile: f64) -> Result<f64, SnapshotError> {
    if (0.0..=1.0).contains(&quantile) {
        Ok(quantile)
    } else {
        Err(SnapshotError::InvalidQuantile(quantile))
    }
}
