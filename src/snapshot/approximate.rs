use std::borrow::Cow;
use std::iter;

use hdrhistogram::Histogram;

use super::{check_quantile, Snapshot, SnapshotError, SnapshotSize};

/// Fixed per-histogram overhead added to the counts array when estimating
/// footprint. Matches the bookkeeping HdrHistogram itself reports.
const HISTOGRAM_OVERHEAD_BYTES: usize = 512;

/// Statistics delegated to an HDR histogram.
///
/// The histogram is either borrowed, in which case the borrow checker keeps
/// its owner from recording into it or resetting it while the snapshot is
/// alive, or held as a frozen copy so the snapshot can outlive the recorder
/// and be moved across threads.
///
/// `min`/`max` and their labels are supplied by the caller rather than read
/// back from the histogram, since the histogram only knows bucket bounds.
#[derive(Debug, Clone)]
pub struct ApproximateSnapshot<'a> {
    histogram: Cow<'a, Histogram<u64>>,
    min: i64,
    min_user_value: Option<String>,
    max: i64,
    max_user_value: Option<String>,
}

impl<'a> ApproximateSnapshot<'a> {
    /// Wraps a live histogram without copying it.
    pub fn new(
        histogram: &'a Histogram<u64>,
        min: i64,
        min_user_value: Option<String>,
        max: i64,
        max_user_value: Option<String>,
    ) -> Self {
        Self {
            histogram: Cow::Borrowed(histogram),
            min,
            min_user_value,
            max,
            max_user_value,
        }
    }

    pub fn histogram(&self) -> &Histogram<u64> {
        &self.histogram
    }

    /// Estimated memory held by the histogram, in bytes.
    ///
    /// Unrelated to `ExactSnapshot::retained_len`.
    pub fn footprint_bytes(&self) -> usize {
        HISTOGRAM_OVERHEAD_BYTES + self.histogram.distinct_values() * std::mem::size_of::<u64>()
    }

    /// Detaches the snapshot from the recorder by cloning the histogram if it
    /// is still borrowed.
    pub fn into_owned(self) -> ApproximateSnapshot<'static> {
        ApproximateSnapshot {
            histogram: Cow::Owned(self.histogram.into_owned()),
            min: self.min,
            min_user_value: self.min_user_value,
            max: self.max,
            max_user_value: self.max_user_value,
        }
    }
}

impl ApproximateSnapshot<'static> {
    /// Takes ownership of an already frozen histogram.
    pub fn frozen(
        histogram: Histogram<u64>,
        min: i64,
        min_user_value: Option<String>,
        max: i64,
        max_user_value: Option<String>,
    ) -> Self {
        Self {
            histogram: Cow::Owned(histogram),
            min,
            min_user_value,
            max,
            max_user_value,
        }
    }
}

impl Snapshot for ApproximateSnapshot<'_> {
    fn count(&self) -> u64 {
        self.histogram.len()
    }

    fn size(&self) -> SnapshotSize {
        SnapshotSize::FootprintBytes(self.footprint_bytes())
    }

    fn min(&self) -> i64 {
        self.min
    }

    fn max(&self) -> i64 {
        self.max
    }

    fn min_user_value(&self) -> Option<&str> {
        self.min_user_value.as_deref()
    }

    fn max_user_value(&self) -> Option<&str> {
        self.max_user_value.as_deref()
    }

    fn mean(&self) -> f64 {
        self.histogram.mean()
    }

    fn std_dev(&self) -> f64 {
        self.histogram.stdev()
    }

    fn value(&self, quantile: f64) -> Result<f64, SnapshotError> {
        let quantile = check_quantile(quantile)?;
        Ok(self.histogram.value_at_percentile(quantile * 100.0) as f64)
    }

    fn values(&self) -> Box<dyn Iterator<Item = i64> + '_> {
        Box::new(self.histogram.iter_recorded().flat_map(|v| {
            let value = i64::try_from(v.value_iterated_to()).unwrap_or(i64::MAX);
            iter::repeat(value).take(v.count_at_value() as usize)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn histogram(values: &[u64]) -> Histogram<u64> {
        let mut h = Histogram::<u64>::new_with_bounds(1, 3_600_000_000, 3).unwrap();
        for &v in values {
            h.record(v).unwrap();
        }
        h
    }

    #[test]
    fn quantile_converts_to_percentile() {
        let h = histogram(&(1..=10_000).collect::<Vec<_>>());
        let snap = ApproximateSnapshot::new(&h, 1, None, 10_000, None);

        assert_eq!(snap.value(0.99).unwrap(), h.value_at_percentile(99.0) as f64);
        assert_eq!(snap.percentile_99(), h.value_at_percentile(99.0) as f64);
        assert_eq!(snap.median(), h.value_at_percentile(50.0) as f64);
        assert_eq!(snap.percentile_999(), h.value_at_percentile(99.9) as f64);
    }

    #[test]
    fn extrema_and_labels_come_from_the_caller() {
        let h = histogram(&[100, 200, 300]);
        let snap = ApproximateSnapshot::new(&h, 7, Some("fast".into()), 9_999, None);

        assert_eq!(snap.min(), 7);
        assert_eq!(snap.max(), 9_999);
        assert_eq!(snap.min_user_value(), Some("fast"));
        assert_eq!(snap.max_user_value(), None);
    }

    #[test]
    fn count_mean_and_std_dev_delegate() {
        let h = histogram(&[10, 20, 30, 40]);
        let snap = ApproximateSnapshot::new(&h, 10, None, 40, None);

        assert_eq!(snap.count(), 4);
        assert_eq!(snap.mean(), h.mean());
        assert_eq!(snap.std_dev(), h.stdev());
    }

    #[test]
    fn size_is_a_byte_footprint() {
        let h = histogram(&[1]);
        let snap = ApproximateSnapshot::new(&h, 1, None, 1, None);

        assert!(snap.footprint_bytes() > h.distinct_values());
        assert_eq!(snap.size(), SnapshotSize::FootprintBytes(snap.footprint_bytes()));
        assert_eq!(snap.size().retained(), None);
    }

    #[test]
    fn values_repeat_by_recorded_count() {
        let h = histogram(&[5, 5, 5, 9]);
        let snap = ApproximateSnapshot::new(&h, 5, None, 9, None);

        let values: Vec<i64> = snap.values().collect();
        assert_eq!(values, vec![5, 5, 5, 9]);
        assert_eq!(values, snap.values().collect::<Vec<_>>());
    }

    #[test]
    fn empty_histogram_is_queryable() {
        let h = histogram(&[]);
        let snap = ApproximateSnapshot::new(&h, 0, None, 0, None);

        assert_eq!(snap.count(), 0);
        assert_eq!(snap.mean(), 0.0);
        assert_eq!(snap.std_dev(), 0.0);
        assert_eq!(snap.median(), 0.0);
        assert_eq!(snap.values().count(), 0);
    }

    #[test]
    fn out_of_range_quantiles_are_rejected() {
        let h = histogram(&[1, 2, 3]);
        let snap = ApproximateSnapshot::new(&h, 1, None, 3, None);

        assert!(snap.value(-0.1).is_err());
        assert!(snap.value(1.1).is_err());
        assert!(snap.value(f64::NAN).is_err());
    }

    #[test]
    fn owned_snapshot_survives_recorder_reset() {
        let mut h = histogram(&[100, 200]);
        let snap = ApproximateSnapshot::new(&h, 100, None, 200, None).into_owned();
        h.reset();

        assert_eq!(snap.count(), 2);
        assert_eq!(h.len(), 0);
    }

    #[test]
    fn frozen_snapshot_is_send() {
        fn assert_send<T: Send + Sync + 'static>(_: &T) {}

        let snap = ApproximateSnapshot::frozen(histogram(&[1]), 1, None, 1, None);
        assert_send(&snap);
    }
}
