use serde::Serialize;
use serde_with::{serde_as, DurationSecondsWithFrac};
use std::collections::BTreeMap;
use std::time::Duration;

/// End-of-run aggregate for a single trend metric. Values are in milliseconds for
/// duration trends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TrendSummary {
    pub count: u64,
    pub avg: f64,
    pub min: f64,
    pub med: f64,
    pub max: f64,
    #[serde(rename = "p(90)")]
    pub p90: f64,
    #[serde(rename = "p(95)")]
    pub p95: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetricSummary {
    Counter { count: u64, rate: f64 },
    Gauge { value: f64, min: f64, max: f64 },
    Rate { rate: f64, passes: u64, fails: u64 },
    Trend(TrendSummary),
}

impl MetricSummary {
    /// Ratio of `true` samples for rate metrics.
    pub fn rate(&self) -> Option<f64> {
        match self {
            MetricSummary::Rate { rate, .. } | MetricSummary::Counter { rate, .. } => Some(*rate),
            _ => None,
        }
    }

    pub fn count(&self) -> u64 {
        match self {
            MetricSummary::Counter { count, .. } => *count,
            MetricSummary::Rate { passes, fails, .. } => passes + fails,
            MetricSummary::Trend(trend) => trend.count,
            MetricSummary::Gauge { .. } => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckSummary {
    pub name: String,
    pub passes: u64,
    pub fails: u64,
}

impl CheckSummary {
    pub fn passed(&self) -> bool {
        self.fails == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdOutcome {
    pub metric: String,
    pub expression: String,
    /// The aggregated value the condition was evaluated against. `None` when the metric had
    /// no samples, in which case the threshold is not considered failed.
    pub observed: Option<f64>,
    pub passed: bool,
}

/// Statistics for a completed run.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub duration: Duration,
    /// Set when an `abort_on_fail` threshold ended the run early.
    pub aborted: bool,
    pub metrics: BTreeMap<String, MetricSummary>,
    pub checks: Vec<CheckSummary>,
    pub thresholds: Vec<ThresholdOutcome>,
}

impl RunSummary {
    pub fn passed(&self) -> bool {
        self.thresholds.iter().all(|t| t.passed)
    }

    pub fn metric(&self, name: &str) -> Option<&MetricSummary> {
        self.metrics.get(name)
    }

    pub fn check(&self, name: &str) -> Option<&CheckSummary> {
        self.checks.iter().find(|c| c.name == name)
    }

    pub fn failed_thresholds(&self) -> impl Iterator<Item = &ThresholdOutcome> {
        self.thresholds.iter().filter(|t| !t.passed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(passed: bool) -> ThresholdOutcome {
        ThresholdOutcome {
            metric: "errors".to_string(),
            expression: "rate<0.01".to_string(),
            observed: Some(if passed { 0. } else { 1. }),
            passed,
        }
    }

    #[test]
    fn passes_only_when_every_threshold_passes() {
        let mut summary = RunSummary {
            duration: Duration::from_secs(1),
            aborted: false,
            metrics: BTreeMap::new(),
            checks: vec![],
            thresholds: vec![outcome(true)],
        };
        assert!(summary.passed());

        summary.thresholds.push(outcome(false));
        assert!(!summary.passed());
        assert_eq!(summary.failed_thresholds().count(), 1);
    }

    #[test]
    fn summary_serializes_metric_kinds() {
        let mut metrics = BTreeMap::new();
        metrics.insert(
            "errors".to_string(),
            MetricSummary::Rate {
                rate: 0.5,
                passes: 1,
                fails: 1,
            },
        );
        let summary = RunSummary {
            duration: Duration::from_millis(1500),
            aborted: false,
            metrics,
            checks: vec![],
            thresholds: vec![],
        };

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["duration"], 1.5);
        assert_eq!(json["metrics"]["errors"]["type"], "rate");
        assert_eq!(json["metrics"]["errors"]["passes"], 1);
    }
}
