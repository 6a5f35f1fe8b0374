use std::collections::VecDeque;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{Reservoir, ReservoirError, ReservoirKind, Sample};
use crate::snapshot::{ExactSnapshot, Snapshot};

// ─── Uniform (Algorithm R) ───────────────────────────────────────

/// Keeps a fixed-size uniform random sample of the whole stream.
///
/// Every sample seen so far has probability `capacity / count` of being
/// retained (Vitter's Algorithm R).
pub struct UniformReservoir {
    capacity: usize,
    inner: Mutex<UniformState>,
}

struct UniformState {
    count: u64,
    samples: Vec<Sample>,
    rng: StdRng,
}

impl UniformReservoir {
    pub fn new(capacity: usize) -> Self {
        Self::with_rng(capacity, StdRng::from_entropy())
    }

    /// Deterministic reservoir, for reproducible runs.
    pub fn with_seed(capacity: usize, seed: u64) -> Self {
        Self::with_rng(capacity, StdRng::seed_from_u64(seed))
    }

    fn with_rng(capacity: usize, rng: StdRng) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            inner: Mutex::new(UniformState {
                count: 0,
                samples: Vec::with_capacity(capacity),
                rng,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Reservoir for UniformReservoir {
    fn kind(&self) -> ReservoirKind {
        ReservoirKind::Uniform
    }

    fn count(&self) -> u64 {
        self.inner.lock().count
    }

    fn update(&self, value: i64, user_value: Option<&str>) -> Result<(), ReservoirError> {
        let mut state = self.inner.lock();
        state.count += 1;

        let sample = Sample {
            value,
            user_value: user_value.map(str::to_owned),
        };

        if state.samples.len() < self.capacity {
            state.samples.push(sample);
        } else {
            let seen = state.count;
            let j = state.rng.gen_range(0..seen);
            if j < self.capacity as u64 {
                state.samples[j as usize] = sample;
            }
        }
        Ok(())
    }

    fn snapshot(&self) -> Box<dyn Snapshot> {
        let state = self.inner.lock();
        Box::new(exact_snapshot(state.count, state.samples.iter()))
    }

    fn reset(&self) {
        let mut state = self.inner.lock();
        state.count = 0;
        state.samples.clear();
    }
}

// ─── Sliding window ──────────────────────────────────────────────

/// Keeps the most recent `capacity` samples.
pub struct SlidingWindowReservoir {
    capacity: usize,
    inner: Mutex<SlidingState>,
}

struct SlidingState {
    count: u64,
    samples: VecDeque<Sample>,
}

impl SlidingWindowReservoir {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            inner: Mutex::new(SlidingState {
                count: 0,
                samples: VecDeque::with_capacity(capacity + 1),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Reservoir for SlidingWindowReservoir {
    fn kind(&self) -> ReservoirKind {
        ReservoirKind::SlidingWindow
    }

    fn count(&self) -> u64 {
        self.inner.lock().count
    }

    fn update(&self, value: i64, user_value: Option<&str>) -> Result<(), ReservoirError> {
        let mut state = self.inner.lock();
        state.count += 1;
        state.samples.push_back(Sample {
            value,
            user_value: user_value.map(str::to_owned),
        });
        if state.samples.len() > self.capacity {
            state.samples.pop_front();
        }
        Ok(())
    }

    fn snapshot(&self) -> Box<dyn Snapshot> {
        let state = self.inner.lock();
        Box::new(exact_snapshot(state.count, state.samples.iter()))
    }

    fn reset(&self) {
        let mut state = self.inner.lock();
        state.count = 0;
        state.samples.clear();
    }
}

/// Sorts the retained samples once so the labels of the smallest and largest
/// value travel with them, then hands the already sorted values over.
///
/// On ties the earliest retained sample keeps the label, for both extrema,
/// matching `HdrReservoir`.
fn exact_snapshot<'a, I>(count: u64, samples: I) -> ExactSnapshot
where
    I: Iterator<Item = &'a Sample>,
{
    let mut sorted: Vec<&Sample> = samples.collect();
    // stable, so tied samples stay in retention order
    sorted.sort_by_key(|s| s.value);

    let min_user_value = sorted.first().and_then(|s| s.user_value.clone());
    let max_user_value = sorted.last().and_then(|last| {
        let first_max = sorted.partition_point(|s| s.value < last.value);
        sorted[first_max].user_value.clone()
    });

    ExactSnapshot::new(
        count,
        sorted.iter().map(|s| s.value),
        true,
        min_user_value,
        max_user_value,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_underfilled_keeps_everything() {
        let reservoir = UniformReservoir::with_seed(10, 7);
        for v in [5, 3, 8] {
            reservoir.update(v, None).unwrap();
        }

        let snap = reservoir.snapshot();
        assert_eq!(snap.count(), 3);
        assert_eq!(snap.values().collect::<Vec<_>>(), vec![3, 5, 8]);
    }

    #[test]
    fn uniform_caps_retained_size_but_counts_everything() {
        let reservoir = UniformReservoir::with_seed(100, 42);
        for v in 0..10_000 {
            reservoir.update(v, None).unwrap();
        }

        let snap = reservoir.snapshot();
        assert_eq!(snap.count(), 10_000);
        assert_eq!(snap.size().retained(), Some(reservoir.capacity()));
        // A uniform sample of 0..10_000 should straddle the middle
        assert!(snap.min() < 5_000 && snap.max() > 5_000);
    }

    #[test]
    fn uniform_is_reproducible_with_seed() {
        let a = UniformReservoir::with_seed(5, 99);
        let b = UniformReservoir::with_seed(5, 99);
        for v in 0..1_000 {
            a.update(v, None).unwrap();
            b.update(v, None).unwrap();
        }
        assert_eq!(
            a.snapshot().values().collect::<Vec<_>>(),
            b.snapshot().values().collect::<Vec<_>>()
        );
    }

    #[test]
    fn extrema_carry_their_labels() {
        let reservoir = UniformReservoir::with_seed(10, 1);
        reservoir.update(50, Some("middle")).unwrap();
        reservoir.update(1, Some("GET /fast")).unwrap();
        reservoir.update(900, Some("GET /slow")).unwrap();

        let snap = reservoir.snapshot();
        assert_eq!(snap.min_user_value(), Some("GET /fast"));
        assert_eq!(snap.max_user_value(), Some("GET /slow"));
    }

    #[test]
    fn tied_extrema_keep_the_earliest_label() {
        let reservoir = SlidingWindowReservoir::new(10);
        reservoir.update(9, Some("first max")).unwrap();
        reservoir.update(1, Some("first min")).unwrap();
        reservoir.update(9, Some("second max")).unwrap();
        reservoir.update(1, Some("second min")).unwrap();

        let snap = reservoir.snapshot();
        assert_eq!(snap.min_user_value(), Some("first min"));
        assert_eq!(snap.max_user_value(), Some("first max"));
    }

    #[test]
    fn capacity_is_at_least_one() {
        assert_eq!(UniformReservoir::new(0).capacity(), 1);
        assert_eq!(SlidingWindowReservoir::new(0).capacity(), 1);
        assert_eq!(UniformReservoir::with_seed(16, 3).capacity(), 16);
    }

    #[test]
    fn sliding_window_keeps_latest() {
        let reservoir = SlidingWindowReservoir::new(3);
        for v in 1..=5 {
            reservoir.update(v, None).unwrap();
        }

        let snap = reservoir.snapshot();
        assert_eq!(snap.count(), 5);
        assert_eq!(snap.size().retained(), Some(reservoir.capacity()));
        assert_eq!(snap.values().collect::<Vec<_>>(), vec![3, 4, 5]);
        assert_eq!(snap.median(), 4.0);
    }

    #[test]
    fn reset_empties_the_reservoir() {
        let reservoir = SlidingWindowReservoir::new(3);
        reservoir.update(10, None).unwrap();
        let before = reservoir.snapshot();
        reservoir.reset();

        assert_eq!(reservoir.count(), 0);
        assert_eq!(reservoir.snapshot().max(), 0);
        // earlier snapshots are unaffected
        assert_eq!(before.max(), 10);
    }
}
