use super::digest::Digest;
use metrics_util::AtomicBucket;
use stampede_core::{Aggregation, TrendSummary};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Distribution of values. Durations are recorded in milliseconds.
#[derive(Clone)]
pub struct Trend {
    name: Arc<str>,
    samples: Arc<AtomicBucket<f64>>,
}

impl Trend {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            samples: Arc::new(AtomicBucket::new()),
        }
    }

    pub fn add(&self, value: f64) {
        self.samples.push(value);

        #[cfg(feature = "metrics")]
        metrics::histogram!(super::facade_key(&self.name)).record(value);
    }

    pub fn add_duration(&self, duration: Duration) {
        self.add(duration.as_secs_f64() * 1_000.);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> Vec<f64> {
        self.samples.data()
    }

    pub fn summary(&self) -> TrendSummary {
        summarize(&self.values())
    }

    pub(crate) fn aggregate(&self, aggregation: Aggregation) -> Option<f64> {
        let values = self.values();
        if values.is_empty() {
            return None;
        }

        match aggregation {
            Aggregation::Avg => Some(statistical::mean(&values)),
            Aggregation::Med => Some(statistical::median(&values)),
            Aggregation::Min => values.iter().copied().reduce(f64::min),
            Aggregation::Max => values.iter().copied().reduce(f64::max),
            Aggregation::Count => Some(values.len() as f64),
            Aggregation::Percentile(p) => Some(Digest::from_values(&values).quantile(p / 100.)),
            Aggregation::Rate | Aggregation::Value => None,
        }
    }
}

impl fmt::Debug for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trend")
            .field("name", &self.name)
            .field("count", &self.samples.data().len())
            .finish()
    }
}

fn summarize(values: &[f64]) -> TrendSummary {
    if values.is_empty() {
        return TrendSummary::default();
    }

    let digest = Digest::from_values(values);
    TrendSummary {
        count: values.len() as u64,
        avg: statistical::mean(values),
        min: values.iter().copied().fold(f64::INFINITY, f64::min),
        med: statistical::median(values),
        max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        p90: digest.quantile(0.90),
        p95: digest.quantile(0.95),
    }
}
