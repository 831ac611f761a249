//! End-of-test text report
use stampede_core::{MetricSummary, RunSummary, TrendSummary};
use std::fmt;

const NAME_WIDTH: usize = 32;

/// Renders a [`RunSummary`] the way load testers expect to read it at the end of a run:
/// checks first, then one line per metric, with threshold results marked next to the metrics
/// they apply to.
pub struct TextSummary<'a>(pub &'a RunSummary);

impl fmt::Display for TextSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let summary = self.0;

        if !summary.checks.is_empty() {
            writeln!(f)?;
            for check in &summary.checks {
                if check.passed() {
                    writeln!(f, "     ✓ {}", check.name)?;
                } else {
                    let total = check.passes + check.fails;
                    writeln!(f, "     ✗ {}", check.name)?;
                    writeln!(
                        f,
                        "      ↳  {}% - ✓ {} / ✗ {}",
                        percent(check.passes, total),
                        check.passes,
                        check.fails
                    )?;
                }
            }
        }

        writeln!(f)?;
        for (name, metric) in &summary.metrics {
            let mark = match threshold_mark(summary, name) {
                Some(true) => "✓",
                Some(false) => "✗",
                None => " ",
            };
            let dotted = format!("{name:.<NAME_WIDTH$}");
            writeln!(f, "   {mark} {dotted}: {}", metric_line(name, metric))?;
        }

        if !summary.thresholds.is_empty() {
            writeln!(f)?;
            for outcome in &summary.thresholds {
                let observed = outcome
                    .observed
                    .map_or_else(|| "no samples".to_string(), |v| format!("{v:.4}"));
                writeln!(
                    f,
                    "   {} {}: {} (observed {observed})",
                    if outcome.passed { "✓" } else { "✗" },
                    outcome.metric,
                    outcome.expression,
                )?;
            }
        }

        writeln!(f)?;
        let status = if summary.aborted {
            "aborted by threshold"
        } else if summary.passed() {
            "passed"
        } else {
            "thresholds failed"
        };
        writeln!(
            f,
            "     run {status} after {}",
            format_secs(summary.duration.as_secs_f64())
        )
    }
}

/// `Some(passed)` when the metric has at least one threshold.
fn threshold_mark(summary: &RunSummary, metric: &str) -> Option<bool> {
    let mut outcomes = summary.thresholds.iter().filter(|t| t.metric == metric);
    let first = outcomes.next()?;
    Some(first.passed && outcomes.all(|t| t.passed))
}

fn metric_line(name: &str, metric: &MetricSummary) -> String {
    match metric {
        MetricSummary::Counter { count, rate } => format!("{count:<7} {rate:.2}/s"),
        MetricSummary::Gauge { value, min, max } => {
            format!("{value:<7} min={min} max={max}")
        }
        MetricSummary::Rate {
            rate,
            passes,
            fails,
        } => format!("{:.2}% ✓ {passes:<6} ✗ {fails}", rate * 100.),
        MetricSummary::Trend(trend) => trend_line(trend, name.ends_with("duration")),
    }
}

fn trend_line(trend: &TrendSummary, millis: bool) -> String {
    let fmt = |v: f64| {
        if millis {
            format_millis(v)
        } else {
            format!("{v:.2}")
        }
    };
    format!(
        "avg={} min={} med={} max={} p(90)={} p(95)={}",
        fmt(trend.avg),
        fmt(trend.min),
        fmt(trend.med),
        fmt(trend.max),
        fmt(trend.p90),
        fmt(trend.p95),
    )
}

fn format_millis(ms: f64) -> String {
    if ms >= 1000. {
        format_secs(ms / 1000.)
    } else if ms >= 1. {
        format!("{ms:.2}ms")
    } else {
        format!("{:.2}µs", ms * 1000.)
    }
}

fn format_secs(secs: f64) -> String {
    if secs >= 60. {
        let minutes = (secs / 60.).floor();
        format!("{minutes}m{:.1}s", secs - minutes * 60.)
    } else {
        format!("{secs:.2}s")
    }
}

fn percent(part: u64, total: u64) -> u64 {
    if total == 0 {
        0
    } else {
        part * 100 / total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stampede_core::{CheckSummary, ThresholdOutcome};
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn summary() -> RunSummary {
        let mut metrics = BTreeMap::new();
        metrics.insert(
            "errors".to_string(),
            MetricSummary::Rate {
                rate: 0.25,
                passes: 1,
                fails: 3,
            },
        );
        metrics.insert(
            "http_req_duration".to_string(),
            MetricSummary::Trend(TrendSummary {
                count: 4,
                avg: 12.5,
                min: 0.5,
                med: 10.,
                max: 1500.,
                p90: 300.,
                p95: 310.,
            }),
        );
        metrics.insert(
            "http_reqs".to_string(),
            MetricSummary::Counter {
                count: 4,
                rate: 2.,
            },
        );

        RunSummary {
            duration: Duration::from_secs(90),
            aborted: false,
            metrics,
            checks: vec![
                CheckSummary {
                    name: "status is 201".to_string(),
                    passes: 4,
                    fails: 0,
                },
                CheckSummary {
                    name: "response time < 300ms".to_string(),
                    passes: 3,
                    fails: 1,
                },
            ],
            thresholds: vec![ThresholdOutcome {
                metric: "errors".to_string(),
                expression: "rate<0.01".to_string(),
                observed: Some(0.25),
                passed: false,
            }],
        }
    }

    #[test]
    fn renders_checks_metrics_and_thresholds() {
        let summary = summary();
        let text = TextSummary(&summary).to_string();

        assert!(text.contains("✓ status is 201"));
        assert!(text.contains("✗ response time < 300ms"));
        assert!(text.contains("↳  75% - ✓ 3 / ✗ 1"));
        assert!(text.contains("✗ errors....."));
        assert!(text.contains("25.00% ✓ 1"));
        assert!(text.contains("min=500.00µs"));
        assert!(text.contains("max=1.50s"));
        assert!(text.contains("p(95)=310.00ms"));
        assert!(text.contains("4       2.00/s"));
        assert!(text.contains("✗ errors: rate<0.01 (observed 0.2500)"));
        assert!(text.contains("run thresholds failed after 1m30.0s"));
    }

    #[test]
    fn metrics_without_thresholds_are_unmarked() {
        let summary = summary();
        assert_eq!(threshold_mark(&summary, "http_reqs"), None);
        assert_eq!(threshold_mark(&summary, "errors"), Some(false));
    }
}
