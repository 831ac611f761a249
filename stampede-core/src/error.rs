use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ThresholdParseError {
    #[error("Threshold expression is empty")]
    Empty,

    #[error("No comparison operator in `{0}`")]
    MissingOperator(String),

    #[error("Unknown aggregation `{0}`")]
    UnknownAggregation(String),

    #[error("Percentile must be within 0..=100, found `{0}`")]
    InvalidPercentile(String),

    #[error("Invalid threshold value `{0}`")]
    InvalidValue(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("At least one stage is required")]
    NoStages,

    #[error("Invalid stage `{0}`: expected `<duration>:<target>`")]
    InvalidStage(String),

    #[error("Invalid duration `{value}`: {source}")]
    InvalidDuration {
        value: String,
        source: humantime::DurationError,
    },

    #[error("Invalid threshold for `{metric}`: {source}")]
    InvalidThreshold {
        metric: String,
        source: ThresholdParseError,
    },

    #[error("Error parsing options file: {0}")]
    Json(#[from] serde_json::Error),
}
