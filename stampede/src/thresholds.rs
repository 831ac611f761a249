use crate::error::RunError;
use crate::metrics::{Metric, Metrics};
use stampede_core::{Threshold, ThresholdOutcome};
use std::time::Duration;
#[allow(unused)]
use tracing::{debug, error, trace};

/// Thresholds bound to the metrics they observe.
#[derive(Debug, Clone, Default)]
pub(crate) struct Thresholds {
    entries: Vec<(Threshold, Metric)>,
}

impl Thresholds {
    /// Resolve every threshold against the registry. Fails on unknown metrics or on an
    /// aggregation the metric kind cannot provide.
    pub fn resolve(thresholds: &[Threshold], metrics: &Metrics) -> Result<Self, RunError> {
        let mut entries = Vec::with_capacity(thresholds.len());
        for threshold in thresholds {
            let metric = metrics
                .get(&threshold.metric)?
                .ok_or_else(|| RunError::UnknownMetric(threshold.metric.clone()))?;

            if !threshold.condition.aggregation.supports(metric.kind()) {
                return Err(RunError::IncompatibleThreshold {
                    metric: threshold.metric.clone(),
                    expression: threshold.source.clone(),
                    kind: metric.kind(),
                });
            }
            entries.push((threshold.clone(), metric));
        }
        Ok(Self { entries })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn evaluate(&self, elapsed: Duration) -> Vec<ThresholdOutcome> {
        self.entries
            .iter()
            .map(|(threshold, metric)| evaluate(threshold, metric, elapsed))
            .collect()
    }

    /// The first `abort_on_fail` threshold that is currently failing, skipping those still
    /// inside their `delay_abort_eval` window.
    pub fn crossed_abort(&self, elapsed: Duration) -> Option<ThresholdOutcome> {
        self.entries
            .iter()
            .filter(|(t, _)| t.abort_on_fail)
            .filter(|(t, _)| t.delay_abort_eval.map_or(true, |delay| elapsed >= delay))
            .map(|(t, m)| evaluate(t, m, elapsed))
            .find(|outcome| !outcome.passed)
    }
}

fn evaluate(threshold: &Threshold, metric: &Metric, elapsed: Duration) -> ThresholdOutcome {
    let observed = metric.aggregate(threshold.condition.aggregation, elapsed);
    // NOTE: A metric without samples has nothing to violate the condition.
    let passed = observed.map_or(true, |value| threshold.condition.holds(value));
    trace!(
        "Threshold {}: {} observed={observed:?} passed={passed}",
        threshold.metric,
        threshold.source
    );

    ThresholdOutcome {
        metric: threshold.metric.clone(),
        expression: threshold.source.clone(),
        observed,
        passed,
    }
}
