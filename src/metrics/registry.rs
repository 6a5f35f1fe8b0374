use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use super::report::{MetricsReport, SnapshotReport};
use super::{
    HdrReservoir, Reservoir, ReservoirError, ReservoirKind, SlidingWindowReservoir,
    UniformReservoir,
};
use crate::config::ReservoirSettings;

// ─── Public types ────────────────────────────────────────────────

/// Thread-safe set of named metrics.
/// Handlers call `record()`, reporters call `report()`.
pub struct MetricsRegistry {
    settings: ReservoirSettings,
    default_kind: ReservoirKind,
    metrics: RwLock<BTreeMap<String, Arc<dyn Reservoir>>>,
}

// ─── MetricsRegistry impl ────────────────────────────────────────

impl MetricsRegistry {
    pub fn new(settings: ReservoirSettings, default_kind: ReservoirKind) -> Self {
        Self {
            settings,
            default_kind,
            metrics: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn default_kind(&self) -> ReservoirKind {
        self.default_kind
    }

    /// Returns the named metric, creating it with `kind` on first use.
    ///
    /// An existing metric keeps whatever kind it was created with. New names
    /// are refused once `max_metrics` metrics exist.
    pub fn histogram(
        &self,
        name: &str,
        kind: ReservoirKind,
    ) -> Result<Arc<dyn Reservoir>, ReservoirError> {
        if let Some(existing) = self.metrics.read().get(name) {
            return Ok(existing.clone());
        }

        let mut metrics = self.metrics.write();
        // Another writer may have created it between the two locks
        if let Some(existing) = metrics.get(name) {
            return Ok(existing.clone());
        }

        if metrics.len() >= self.settings.max_metrics {
            warn!(metric = name, limit = self.settings.max_metrics, "metric limit reached");
            return Err(ReservoirError::TooManyMetrics {
                name: name.to_owned(),
                limit: self.settings.max_metrics,
            });
        }

        let reservoir = self.build(kind)?;
        metrics.insert(name.to_owned(), reservoir.clone());
        info!(metric = name, ?kind, "registered metric");
        Ok(reservoir)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Reservoir>> {
        self.metrics.read().get(name).cloned()
    }

    /// Record one value, creating the metric with the default kind if needed.
    pub fn record(
        &self,
        name: &str,
        value: i64,
        user_value: Option<&str>,
    ) -> Result<(), ReservoirError> {
        self.histogram(name, self.default_kind)?.update(value, user_value)
    }

    pub fn names(&self) -> Vec<String> {
        self.metrics.read().keys().cloned().collect()
    }

    pub fn report_for(&self, name: &str) -> Option<SnapshotReport> {
        let reservoir = self.get(name)?;
        let snap = reservoir.snapshot();
        Some(SnapshotReport::from_snapshot(reservoir.kind(), snap.as_ref()))
    }

    /// Snapshot every metric. Reservoirs are locked one at a time.
    pub fn report(&self) -> MetricsReport {
        // Clone the handles so recording isn't blocked on the map lock while
        // each snapshot is taken
        let metrics: Vec<(String, Arc<dyn Reservoir>)> = self
            .metrics
            .read()
            .iter()
            .map(|(name, r)| (name.clone(), r.clone()))
            .collect();

        let metrics = metrics
            .into_iter()
            .map(|(name, reservoir)| {
                let snap = reservoir.snapshot();
                let report = SnapshotReport::from_snapshot(reservoir.kind(), snap.as_ref());
                (name, report)
            })
            .collect();

        MetricsReport {
            taken_at: Utc::now(),
            metrics,
        }
    }

    /// Wipe all recorded data, keeping the registered metrics.
    pub fn reset_all(&self) {
        let metrics = self.metrics.read();
        for reservoir in metrics.values() {
            reservoir.reset();
        }
        debug!(count = metrics.len(), "reset all metrics");
    }

    fn build(&self, kind: ReservoirKind) -> Result<Arc<dyn Reservoir>, ReservoirError> {
        let reservoir: Arc<dyn Reservoir> = match kind {
            ReservoirKind::Uniform => Arc::new(UniformReservoir::new(self.settings.size)),
            ReservoirKind::SlidingWindow => {
                Arc::new(SlidingWindowReservoir::new(self.settings.size))
            }
            ReservoirKind::Hdr => Arc::new(HdrReservoir::from_settings(&self.settings)?),
        };
        Ok(reservoir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> MetricsRegistry {
        MetricsRegistry::new(ReservoirSettings::default(), ReservoirKind::Hdr)
    }

    #[test]
    fn record_creates_with_default_kind() {
        let registry = registry();
        registry.record("latency", 100, None).unwrap();
        registry.record("latency", 300, None).unwrap();

        let r = registry.get("latency").unwrap();
        assert_eq!(r.kind(), ReservoirKind::Hdr);
        assert_eq!(r.count(), 2);
    }

    #[test]
    fn existing_metric_keeps_its_kind() {
        let registry = registry();
        registry.histogram("sizes", ReservoirKind::Uniform).unwrap();
        let again = registry.histogram("sizes", ReservoirKind::Hdr).unwrap();
        assert_eq!(again.kind(), ReservoirKind::Uniform);
    }

    #[test]
    fn report_covers_every_metric() {
        let registry = registry();
        registry
            .histogram("exact", ReservoirKind::SlidingWindow)
            .unwrap()
            .update(42, Some("only"))
            .unwrap();
        registry.record("approx", 7, None).unwrap();

        let report = registry.report();
        assert_eq!(registry.names(), vec!["approx".to_string(), "exact".to_string()]);
        assert_eq!(report.metrics["exact"].median, 42.0);
        assert_eq!(report.metrics["exact"].max_user_value.as_deref(), Some("only"));
        assert_eq!(report.metrics["approx"].count, 1);
        assert!(report.metrics["approx"].size.footprint_bytes().is_some());
    }

    #[test]
    fn refuses_new_names_past_the_limit() {
        let settings = ReservoirSettings {
            max_metrics: 2,
            ..ReservoirSettings::default()
        };
        let registry = MetricsRegistry::new(settings, ReservoirKind::Hdr);
        registry.record("a", 1, None).unwrap();
        registry.record("b", 1, None).unwrap();

        let err = registry.record("c", 1, None).unwrap_err();
        assert!(matches!(
            err,
            ReservoirError::TooManyMetrics { ref name, limit: 2 } if name == "c"
        ));
        assert_eq!(registry.names().len(), 2);

        // existing metrics keep recording
        registry.record("a", 2, None).unwrap();
        assert_eq!(registry.get("a").unwrap().count(), 2);
    }

    #[test]
    fn unknown_metric_has_no_report() {
        assert!(registry().report_for("missing").is_none());
    }

    #[test]
    fn reset_all_keeps_registrations() {
        let registry = registry();
        registry.record("a", 1, None).unwrap();
        registry.reset_all();

        assert_eq!(registry.names(), vec!["a".to_string()]);
        assert_eq!(registry.report_for("a").unwrap().count, 0);
    }
}
