use std::mem;

use hdrhistogram::Histogram;
use parking_lot::Mutex;

use super::{Reservoir, ReservoirError, ReservoirKind, Sample};
use crate::config::ReservoirSettings;
use crate::snapshot::{ApproximateSnapshot, Snapshot};

/// Records every sample into an HdrHistogram.
///
/// The histogram only knows bucket boundaries, so the exact min and max (and
/// the labels attached to them) are tracked alongside it and handed to the
/// snapshot at construction.
pub struct HdrReservoir {
    inner: Mutex<HdrState>,
}

struct HdrState {
    histogram: Histogram<u64>,
    min: Option<Sample>,
    max: Option<Sample>,
}

impl HdrReservoir {
    pub fn new(lowest: u64, highest: u64, sigfig: u8) -> Result<Self, ReservoirError> {
        let histogram = Histogram::<u64>::new_with_bounds(lowest, highest, sigfig)?;
        Ok(Self {
            inner: Mutex::new(HdrState {
                histogram,
                min: None,
                max: None,
            }),
        })
    }

    pub fn from_settings(settings: &ReservoirSettings) -> Result<Self, ReservoirError> {
        Self::new(settings.hdr_lowest, settings.hdr_highest, settings.hdr_sigfig)
    }

    /// Runs `f` against a snapshot that borrows the live histogram.
    ///
    /// Recording is blocked until `f` returns, so nothing is copied.
    pub fn with_snapshot<R>(&self, f: impl FnOnce(&ApproximateSnapshot<'_>) -> R) -> R {
        let state = self.inner.lock();
        let (min, min_user_value) = extremum(&state.min);
        let (max, max_user_value) = extremum(&state.max);
        let snapshot =
            ApproximateSnapshot::new(&state.histogram, min, min_user_value, max, max_user_value);
        f(&snapshot)
    }

    /// Frozen snapshot of everything recorded so far, leaving the recorder empty.
    pub fn snapshot_and_reset(&self) -> ApproximateSnapshot<'static> {
        let mut state = self.inner.lock();
        let fresh = Histogram::new_from(&state.histogram);
        let histogram = mem::replace(&mut state.histogram, fresh);
        let (min, min_user_value) = extremum(&state.min.take());
        let (max, max_user_value) = extremum(&state.max.take());
        ApproximateSnapshot::frozen(histogram, min, min_user_value, max, max_user_value)
    }

    fn frozen_snapshot(&self) -> ApproximateSnapshot<'static> {
        self.with_snapshot(|snap| snap.clone().into_owned())
    }
}

fn extremum(sample: &Option<Sample>) -> (i64, Option<String>) {
    match sample {
        Some(s) => (s.value, s.user_value.clone()),
        None => (0, None),
    }
}

impl Reservoir for HdrReservoir {
    fn kind(&self) -> ReservoirKind {
        ReservoirKind::Hdr
    }

    fn count(&self) -> u64 {
        self.inner.lock().histogram.len()
    }

    /// Negative values are recorded as 0; the histogram only holds unsigned values.
    fn update(&self, value: i64, user_value: Option<&str>) -> Result<(), ReservoirError> {
        let value = value.max(0);
        let mut state = self.inner.lock();

        state
            .histogram
            .record(value as u64)
            .map_err(|source| ReservoirError::Record { value, source })?;

        // Strict comparisons: the earliest sample keeps the label on ties
        if state.min.as_ref().map_or(true, |m| value < m.value) {
            state.min = Some(Sample {
                value,
                user_value: user_value.map(str::to_owned),
            });
        }
        if state.max.as_ref().map_or(true, |m| value > m.value) {
            state.max = Some(Sample {
                value,
                user_value: user_value.map(str::to_owned),
            });
        }
        Ok(())
    }

    fn snapshot(&self) -> Box<dyn Snapshot> {
        Box::new(self.frozen_snapshot())
    }

    fn reset(&self) {
        let mut state = self.inner.lock();
        state.histogram.reset();
        state.min = None;
        state.max = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reservoir() -> HdrReservoir {
        HdrReservoir::new(1, 60_000_000, 3).unwrap()
    }

    #[test]
    fn tracks_exact_extrema_with_labels() {
        let r = reservoir();
        r.update(1_234, Some("a")).unwrap();
        r.update(17, Some("b")).unwrap();
        r.update(99_999, Some("c")).unwrap();
        r.update(17, Some("later tie")).unwrap();
        r.update(99_999, Some("later tie")).unwrap();

        let snap = r.snapshot();
        assert_eq!(snap.count(), 5);
        assert_eq!(snap.min(), 17);
        assert_eq!(snap.min_user_value(), Some("b"));
        assert_eq!(snap.max(), 99_999);
        assert_eq!(snap.max_user_value(), Some("c"));
        assert!(snap.size().footprint_bytes().is_some());
    }

    #[test]
    fn snapshot_is_frozen() {
        let r = reservoir();
        r.update(10, None).unwrap();
        let snap = r.snapshot();
        r.update(20, None).unwrap();
        r.reset();

        assert_eq!(snap.count(), 1);
        assert_eq!(snap.max(), 10);
    }

    #[test]
    fn borrowed_snapshot_matches_histogram() {
        let r = reservoir();
        for v in 1..=1_000 {
            r.update(v, None).unwrap();
        }

        let (p99, direct) = r.with_snapshot(|snap| {
            (snap.value(0.99).unwrap(), snap.histogram().value_at_percentile(99.0))
        });
        assert_eq!(p99, direct as f64);
    }

    #[test]
    fn snapshot_and_reset_swaps_state() {
        let r = reservoir();
        r.update(5, Some("x")).unwrap();

        let snap = r.snapshot_and_reset();
        assert_eq!(snap.count(), 1);
        assert_eq!(snap.min_user_value(), Some("x"));
        assert_eq!(r.count(), 0);
        assert_eq!(r.snapshot().min(), 0);
    }

    #[test]
    fn negative_values_clamp_to_zero() {
        let r = reservoir();
        r.update(-5, None).unwrap();
        assert_eq!(r.snapshot().min(), 0);
    }

    #[test]
    fn out_of_range_value_is_an_error() {
        let r = reservoir();
        let err = r.update(i64::MAX, None).unwrap_err();
        assert!(matches!(err, ReservoirError::Record { value, .. } if value == i64::MAX));
        assert_eq!(r.count(), 0);
    }

    #[test]
    fn invalid_bounds_fail_creation() {
        assert!(HdrReservoir::new(10, 5, 3).is_err());
    }
}
