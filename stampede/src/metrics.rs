//! Metric registry
//!
//! Every sample recorded during a run lands in one of four metric kinds, keyed by name:
//! counters, gauges, rates and trends. Handles are cheap clones over shared atomics so VU
//! tasks never contend on a lock while recording.
mod counter;
mod digest;
mod rate;
mod trend;

pub use counter::{Counter, Gauge};
pub use rate::Rate;
pub use trend::Trend;

use crate::error::MetricError;
use stampede_core::{
    Aggregation, MetricKind, MetricSummary, CHECKS, HTTP_REQS, HTTP_REQ_DURATION,
    HTTP_REQ_FAILED, ITERATIONS, ITERATION_DURATION, VUS, VUS_MAX,
};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Facade key sharing the handle's name allocation.
#[cfg(feature = "metrics")]
fn facade_key(name: &Arc<str>) -> metrics::SharedString {
    metrics::SharedString::from(Arc::clone(name))
}

#[derive(Debug, Clone)]
pub enum Metric {
    Counter(Counter),
    Gauge(Gauge),
    Rate(Rate),
    Trend(Trend),
}

impl Metric {
    pub fn kind(&self) -> MetricKind {
        match self {
            Metric::Counter(_) => MetricKind::Counter,
            Metric::Gauge(_) => MetricKind::Gauge,
            Metric::Rate(_) => MetricKind::Rate,
            Metric::Trend(_) => MetricKind::Trend,
        }
    }

    /// `elapsed` is the run time so far, used for per-second counter rates.
    pub fn summary(&self, elapsed: Duration) -> MetricSummary {
        match self {
            Metric::Counter(c) => c.summary(elapsed),
            Metric::Gauge(g) => g.summary(),
            Metric::Rate(r) => r.summary(),
            Metric::Trend(t) => MetricSummary::Trend(t.summary()),
        }
    }

    /// Reduce the metric to a single value. `None` when the aggregation does not apply or
    /// there is nothing to aggregate yet.
    pub fn aggregate(&self, aggregation: Aggregation, elapsed: Duration) -> Option<f64> {
        match self {
            Metric::Counter(c) => c.aggregate(aggregation, elapsed),
            Metric::Gauge(g) => g.aggregate(aggregation),
            Metric::Rate(r) => r.aggregate(aggregation),
            Metric::Trend(t) => t.aggregate(aggregation),
        }
    }
}

/// Thread-safe registry of named metrics.
#[derive(Debug, Clone, Default)]
pub struct Metrics {
    inner: Arc<RwLock<BTreeMap<String, Metric>>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counter(&self, name: &str) -> Result<Counter, MetricError> {
        self.register(
            name,
            MetricKind::Counter,
            || Metric::Counter(Counter::new(name)),
            |m| match m {
                Metric::Counter(c) => Some(c.clone()),
                _ => None,
            },
        )
    }

    pub fn gauge(&self, name: &str) -> Result<Gauge, MetricError> {
        self.register(
            name,
            MetricKind::Gauge,
            || Metric::Gauge(Gauge::new(name)),
            |m| match m {
                Metric::Gauge(g) => Some(g.clone()),
                _ => None,
            },
        )
    }

    pub fn rate(&self, name: &str) -> Result<Rate, MetricError> {
        self.register(
            name,
            MetricKind::Rate,
            || Metric::Rate(Rate::new(name)),
            |m| match m {
                Metric::Rate(r) => Some(r.clone()),
                _ => None,
            },
        )
    }

    pub fn trend(&self, name: &str) -> Result<Trend, MetricError> {
        self.register(
            name,
            MetricKind::Trend,
            || Metric::Trend(Trend::new(name)),
            |m| match m {
                Metric::Trend(t) => Some(t.clone()),
                _ => None,
            },
        )
    }

    pub fn get(&self, name: &str) -> Result<Option<Metric>, MetricError> {
        Ok(self.inner.read()?.get(name).cloned())
    }

    pub fn summaries(
        &self,
        elapsed: Duration,
    ) -> Result<BTreeMap<String, MetricSummary>, MetricError> {
        Ok(self
            .inner
            .read()?
            .iter()
            .map(|(name, metric)| (name.clone(), metric.summary(elapsed)))
            .collect())
    }

    fn register<T>(
        &self,
        name: &str,
        kind: MetricKind,
        make: impl FnOnce() -> Metric,
        extract: impl Fn(&Metric) -> Option<T>,
    ) -> Result<T, MetricError> {
        let mismatch = |found: &Metric| MetricError::KindMismatch {
            name: name.to_string(),
            expected: kind,
            found: found.kind(),
        };

        {
            let map = self.inner.read()?;
            if let Some(existing) = map.get(name) {
                return extract(existing).ok_or_else(|| mismatch(existing));
            }
        }

        let mut map = self.inner.write()?;
        let metric: &Metric = map.entry(name.to_string()).or_insert_with(make);
        extract(metric).ok_or_else(|| mismatch(metric))
    }
}

/// Handles to the metrics every run records, resolved once so the hot path skips the
/// registry lookup.
#[derive(Debug, Clone)]
pub(crate) struct BuiltinMetrics {
    pub http_reqs: Counter,
    pub http_req_duration: Trend,
    pub http_req_failed: Rate,
    pub iterations: Counter,
    pub iteration_duration: Trend,
    pub checks: Rate,
    pub vus: Gauge,
    pub vus_max: Gauge,
}

impl BuiltinMetrics {
    pub fn register(metrics: &Metrics) -> Result<Self, MetricError> {
        Ok(Self {
            http_reqs: metrics.counter(HTTP_REQS)?,
            http_req_duration: metrics.trend(HTTP_REQ_DURATION)?,
            http_req_failed: metrics.rate(HTTP_REQ_FAILED)?,
            iterations: metrics.counter(ITERATIONS)?,
            iteration_duration: metrics.trend(ITERATION_DURATION)?,
            checks: metrics.rate(CHECKS)?,
            vus: metrics.gauge(VUS)?,
            vus_max: metrics.gauge(VUS_MAX)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "metrics")]
    #[test]
    fn facade_key_reuses_name() {
        let name: Arc<str> = "http_reqs".into();
        let key = facade_key(&name);
        assert_eq!(&*key, "http_reqs");
        assert_eq!(key.as_ptr(), name.as_ptr());
        assert_eq!(Arc::strong_count(&name), 2);
    }

    #[test]
    fn register_returns_shared_handle() {
        let metrics = Metrics::new();
        let a = metrics.rate("errors").unwrap();
        let b = metrics.rate("errors").unwrap();
        a.add(true);
        b.add(false);

        let summary = metrics.summaries(Duration::from_secs(1)).unwrap();
        assert_eq!(
            summary["errors"],
            MetricSummary::Rate {
                rate: 0.5,
                passes: 1,
                fails: 1
            }
        );
    }

    #[test]
    fn register_rejects_kind_mismatch() {
        let metrics = Metrics::new();
        metrics.trend("latency").unwrap();
        let err = metrics.rate("latency").unwrap_err();
        assert!(matches!(
            err,
            MetricError::KindMismatch {
                expected: MetricKind::Rate,
                found: MetricKind::Trend,
                ..
            }
        ));
    }

    #[test]
    fn builtins_are_registered() {
        let metrics = Metrics::new();
        BuiltinMetrics::register(&metrics).unwrap();
        for name in [HTTP_REQS, HTTP_REQ_DURATION, HTTP_REQ_FAILED, CHECKS, VUS] {
            assert!(metrics.get(name).unwrap().is_some(), "{name} missing");
        }
        assert_eq!(
            metrics.get(HTTP_REQ_FAILED).unwrap().unwrap().kind(),
            MetricKind::Rate
        );
    }
}
