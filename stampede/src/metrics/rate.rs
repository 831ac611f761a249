use stampede_core::{Aggregation, MetricSummary};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Ratio of `true` samples to all samples.
#[derive(Debug, Clone)]
pub struct Rate {
    name: Arc<str>,
    trues: Arc<AtomicU64>,
    total: Arc<AtomicU64>,
}

impl Rate {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            trues: Arc::new(AtomicU64::new(0)),
            total: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn add(&self, sample: bool) {
        if sample {
            self.trues.fetch_add(1, Ordering::Relaxed);
        }
        self.total.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "metrics")]
        metrics::counter!(super::facade_key(&self.name), "value" => if sample { "true" } else { "false" })
            .increment(1);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn trues(&self) -> u64 {
        self.trues.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// `None` until the first sample is recorded.
    pub fn rate(&self) -> Option<f64> {
        // NOTE: `add` bumps `trues` before `total`, so clamp against a racing sample.
        let total = self.total();
        let trues = self.trues().min(total);
        (total > 0).then(|| trues as f64 / total as f64)
    }

    pub(crate) fn summary(&self) -> MetricSummary {
        let total = self.total();
        let passes = self.trues().min(total);
        MetricSummary::Rate {
            rate: self.rate().unwrap_or(0.),
            passes,
            fails: total - passes,
        }
    }

    pub(crate) fn aggregate(&self, aggregation: Aggregation) -> Option<f64> {
        match aggregation {
            Aggregation::Rate => self.rate(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_rate_has_no_value() {
        let rate = Rate::new("errors");
        assert_eq!(rate.rate(), None);
        assert_eq!(rate.aggregate(Aggregation::Rate), None);
    }

    #[test]
    fn rate_counts_trues() {
        let rate = Rate::new("errors");
        for sample in [true, false, false, false] {
            rate.add(sample);
        }
        assert_eq!(rate.rate(), Some(0.25));
        assert_eq!(
            rate.summary(),
            MetricSummary::Rate {
                rate: 0.25,
                passes: 1,
                fails: 3
            }
        );
    }

    #[test]
    fn clones_share_samples() {
        let rate = Rate::new("checks");
        let handle = rate.clone();
        handle.add(true);
        assert_eq!(rate.total(), 1);
    }
}
