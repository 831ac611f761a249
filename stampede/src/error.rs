use stampede_core::{ConfigError, MetricKind};
use std::sync::PoisonError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetricError {
    #[error("Metric `{name}` is a {found}, not a {expected}")]
    KindMismatch {
        name: String,
        expected: MetricKind,
        found: MetricKind,
    },

    #[error("Metric registry lock is poisoned.")]
    PoisonData,
}

impl<T> From<PoisonError<T>> for MetricError {
    fn from(_err: PoisonError<T>) -> Self {
        Self::PoisonData
    }
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("Invalid options: {0}")]
    Config(#[from] ConfigError),

    #[error("Metric error: {0}")]
    Metric(#[from] MetricError),

    #[error("Threshold on unknown metric `{0}`")]
    UnknownMetric(String),

    #[error("Threshold `{expression}` cannot be applied to {kind} metric `{metric}`")]
    IncompatibleThreshold {
        metric: String,
        expression: String,
        kind: MetricKind,
    },

    #[error("Unable to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Setup did not complete within {}", humantime::format_duration(*.0))]
    SetupTimeout(Duration),

    #[error("Setup failed: {0}")]
    Setup(String),
}
