use stampede_core::{Aggregation, MetricSummary};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Monotonically increasing count.
#[derive(Debug, Clone)]
pub struct Counter {
    name: Arc<str>,
    count: Arc<AtomicU64>,
}

impl Counter {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            count: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn increment(&self, value: u64) {
        self.count.fetch_add(value, Ordering::Relaxed);

        #[cfg(feature = "metrics")]
        metrics::counter!(super::facade_key(&self.name)).increment(value);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub(crate) fn summary(&self, elapsed: Duration) -> MetricSummary {
        let count = self.count();
        MetricSummary::Counter {
            count,
            rate: per_second(count, elapsed),
        }
    }

    pub(crate) fn aggregate(&self, aggregation: Aggregation, elapsed: Duration) -> Option<f64> {
        match aggregation {
            Aggregation::Count => Some(self.count() as f64),
            Aggregation::Rate => Some(per_second(self.count(), elapsed)),
            _ => None,
        }
    }
}

fn per_second(count: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0. {
        count as f64 / secs
    } else {
        0.
    }
}

/// Last-written value, along with the lowest and highest values seen.
#[derive(Debug, Clone)]
pub struct Gauge {
    name: Arc<str>,
    state: Arc<GaugeState>,
}

#[derive(Debug)]
struct GaugeState {
    value: AtomicI64,
    min: AtomicI64,
    max: AtomicI64,
    written: AtomicBool,
}

impl Gauge {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(GaugeState {
                value: AtomicI64::new(0),
                min: AtomicI64::new(i64::MAX),
                max: AtomicI64::new(i64::MIN),
                written: AtomicBool::new(false),
            }),
        }
    }

    pub fn set(&self, value: i64) {
        self.state.value.store(value, Ordering::Relaxed);
        self.state.min.fetch_min(value, Ordering::Relaxed);
        self.state.max.fetch_max(value, Ordering::Relaxed);
        self.state.written.store(true, Ordering::Relaxed);

        #[cfg(feature = "metrics")]
        metrics::gauge!(super::facade_key(&self.name)).set(value as f64);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> i64 {
        self.state.value.load(Ordering::Relaxed)
    }

    pub fn max(&self) -> i64 {
        if self.state.written.load(Ordering::Relaxed) {
            self.state.max.load(Ordering::Relaxed)
        } else {
            0
        }
    }

    pub(crate) fn summary(&self) -> MetricSummary {
        let (min, max) = if self.state.written.load(Ordering::Relaxed) {
            (
                self.state.min.load(Ordering::Relaxed),
                self.state.max.load(Ordering::Relaxed),
            )
        } else {
            (0, 0)
        };
        MetricSummary::Gauge {
            value: self.value() as f64,
            min: min as f64,
            max: max as f64,
        }
    }

    pub(crate) fn aggregate(&self, aggregation: Aggregation) -> Option<f64> {
        match aggregation {
            Aggregation::Value => Some(self.value() as f64),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_rate_is_per_second() {
        let counter = Counter::new("iterations");
        counter.increment(10);
        counter.increment(5);
        assert_eq!(counter.count(), 15);
        assert_eq!(
            counter.aggregate(Aggregation::Rate, Duration::from_secs(3)),
            Some(5.)
        );
        assert_eq!(counter.aggregate(Aggregation::Count, Duration::ZERO), Some(15.));
        assert_eq!(counter.aggregate(Aggregation::Avg, Duration::ZERO), None);
    }

    #[test]
    fn gauge_tracks_bounds() {
        let gauge = Gauge::new("vus");
        assert_eq!(
            gauge.summary(),
            MetricSummary::Gauge {
                value: 0.,
                min: 0.,
                max: 0.
            }
        );

        gauge.set(4);
        gauge.set(10);
        gauge.set(2);
        assert_eq!(
            gauge.summary(),
            MetricSummary::Gauge {
                value: 2.,
                min: 2.,
                max: 10.
            }
        );
        assert_eq!(gauge.max(), 10);
    }
}
