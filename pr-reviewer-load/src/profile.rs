//! Default ramp profile and pass/fail criteria
use crate::script::ERRORS_METRIC;
use stampede_core::{ConfigError, Options, Stage, Threshold, HTTP_REQ_DURATION, HTTP_REQ_FAILED};
use std::time::Duration;

/// Warm up to 10 VUs, climb to 50 and then 100, hold, and ramp back down to zero.
pub fn default_stages() -> Vec<Stage> {
    [
        (30, 10),
        (60, 50),
        (30, 100),
        (60, 100),
        (30, 50),
        (30, 0),
    ]
    .into_iter()
    .map(|(secs, target)| Stage::new(Duration::from_secs(secs), target))
    .collect()
}

/// p95 latency under 300ms, and under 1% failed requests and failed pull request attempts.
pub const DEFAULT_THRESHOLDS: [(&str, &str); 3] = [
    (HTTP_REQ_DURATION, "p(95)<300"),
    (HTTP_REQ_FAILED, "rate<0.01"),
    (ERRORS_METRIC, "rate<0.01"),
];

pub fn default_thresholds() -> Result<Vec<Threshold>, ConfigError> {
    DEFAULT_THRESHOLDS
        .iter()
        .map(|(metric, expr)| {
            Threshold::parse(metric, expr).map_err(|source| ConfigError::InvalidThreshold {
                metric: metric.to_string(),
                source,
            })
        })
        .collect()
}

pub fn default_options() -> Result<Options, ConfigError> {
    let mut options = Options::new().stages(default_stages());
    options.thresholds = default_thresholds()?;
    Ok(options)
}
