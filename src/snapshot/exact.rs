use super::{check_quantile, Snapshot, SnapshotError, SnapshotSize};

/// Exact statistics over a uniform sample of raw values.
///
/// Owns a sorted copy of the retained values. Quantiles are computed by
/// linear interpolation between neighbouring order statistics, so small
/// samples still give sensible medians and no query can index out of bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct ExactSnapshot {
    count: u64,
    values: Box<[i64]>,
    min_user_value: Option<String>,
    max_user_value: Option<String>,
}

impl ExactSnapshot {
    /// Builds a snapshot from the retained `values`.
    ///
    /// `count` is stored as given and may be larger than `values.len()`.
    /// Pass `values_are_sorted = true` only when `values` is already ascending.
    pub fn new<I>(
        count: u64,
        values: I,
        values_are_sorted: bool,
        min_user_value: Option<String>,
        max_user_value: Option<String>,
    ) -> Self
    where
        I: IntoIterator<Item = i64>,
    {
        let mut values: Box<[i64]> = values.into_iter().collect();
        if !values_are_sorted {
            values.sort_unstable();
        }

        Self {
            count,
            values,
            min_user_value,
            max_user_value,
        }
    }

    /// Snapshot whose count equals the number of values, with no labels.
    pub fn from_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = i64>,
    {
        let values: Vec<i64> = values.into_iter().collect();
        Self::new(values.len() as u64, values, false, None, None)
    }

    /// Number of raw values retained. Not the same thing as `count()`.
    pub fn retained_len(&self) -> usize {
        self.values.len()
    }

    pub fn as_slice(&self) -> &[i64] {
        &self.values
    }
}

impl Snapshot for ExactSnapshot {
    fn count(&self) -> u64 {
        self.count
    }

    fn size(&self) -> SnapshotSize {
        SnapshotSize::Retained(self.values.len())
    }

    fn min(&self) -> i64 {
        self.values.first().copied().unwrap_or(0)
    }

    fn max(&self) -> i64 {
        self.values.last().copied().unwrap_or(0)
    }

    fn min_user_value(&self) -> Option<&str> {
        self.min_user_value.as_deref()
    }

    fn max_user_value(&self) -> Option<&str> {
        self.max_user_value.as_deref()
    }

    fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.values.iter().map(|&v| v as f64).sum();
        sum / self.values.len() as f64
    }

    fn std_dev(&self) -> f64 {
        let n = self.values.len();
        if n <= 1 {
            return 0.0;
        }

        let mean = self.mean();
        let sum_sq: f64 = self
            .values
            .iter()
            .map(|&v| {
                let d = v as f64 - mean;
                d * d
            })
            .sum();

        (sum_sq / (n - 1) as f64).sqrt()
    }

    fn value(&self, quantile: f64) -> Result<f64, SnapshotError> {
        let quantile = check_quantile(quantile)?;

        let n = self.values.len();
        if n == 0 {
            return Ok(0.0);
        }

        let pos = quantile * (n + 1) as f64;
        let index = pos.floor() as usize;

        if index < 1 {
            return Ok(self.values[0] as f64);
        }
        if index >= n {
            return Ok(self.values[n - 1] as f64);
        }

        let lower = self.values[index - 1] as f64;
        let upper = self.values[index] as f64;
        Ok(lower + pos.fract() * (upper - lower))
    }

    fn values(&self) -> Box<dyn Iterator<Item = i64> + '_> {
        Box::new(self.values.iter().copied())
    }
}
