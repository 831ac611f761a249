use crate::{
    ConfigError, Threshold, DEFAULT_GRACEFUL_RAMP_DOWN, DEFAULT_GRACEFUL_STOP,
    DEFAULT_SETUP_TIMEOUT, DEFAULT_TEARDOWN_TIMEOUT,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// A ramp segment: over `duration`, move the number of active VUs towards `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    #[serde(with = "humantime_str")]
    pub duration: Duration,
    pub target: usize,
}

impl Stage {
    pub fn new(duration: Duration, target: usize) -> Self {
        Self { duration, target }
    }
}

/// Parses the `<duration>:<target>` form used on the command line, e.g. `30s:10`.
impl FromStr for Stage {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (duration, target) = s
            .split_once(':')
            .ok_or_else(|| ConfigError::InvalidStage(s.to_string()))?;
        let duration = parse_duration(duration)?;
        let target = target
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidStage(s.to_string()))?;
        Ok(Stage { duration, target })
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} VUs",
            humantime::format_duration(self.duration),
            self.target
        )
    }
}

/// Run options for a script: ramp profile, thresholds and lifecycle timeouts.
#[derive(Debug, Clone)]
pub struct Options {
    pub stages: Vec<Stage>,
    pub start_vus: usize,
    pub thresholds: Vec<Threshold>,
    pub graceful_ramp_down: Duration,
    pub graceful_stop: Duration,
    pub setup_timeout: Duration,
    pub teardown_timeout: Duration,
    /// Seed for every VU's random source. `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            stages: vec![],
            start_vus: 0,
            thresholds: vec![],
            graceful_ramp_down: DEFAULT_GRACEFUL_RAMP_DOWN,
            graceful_stop: DEFAULT_GRACEFUL_STOP,
            setup_timeout: DEFAULT_SETUP_TIMEOUT,
            teardown_timeout: DEFAULT_TEARDOWN_TIMEOUT,
            seed: None,
        }
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(mut self, duration: Duration, target: usize) -> Self {
        self.stages.push(Stage::new(duration, target));
        self
    }

    pub fn stages(mut self, stages: Vec<Stage>) -> Self {
        self.stages = stages;
        self
    }

    pub fn start_vus(mut self, start_vus: usize) -> Self {
        self.start_vus = start_vus;
        self
    }

    pub fn threshold(mut self, threshold: Threshold) -> Self {
        self.thresholds.push(threshold);
        self
    }

    pub fn graceful_ramp_down(mut self, grace: Duration) -> Self {
        self.graceful_ramp_down = grace;
        self
    }

    pub fn graceful_stop(mut self, grace: Duration) -> Self {
        self.graceful_stop = grace;
        self
    }

    pub fn setup_timeout(mut self, timeout: Duration) -> Self {
        self.setup_timeout = timeout;
        self
    }

    pub fn teardown_timeout(mut self, timeout: Duration) -> Self {
        self.teardown_timeout = timeout;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Total length of the ramp profile.
    pub fn duration(&self) -> Duration {
        self.stages.iter().map(|s| s.duration).sum()
    }

    /// Highest VU count the ramp profile will reach.
    pub fn max_vus(&self) -> usize {
        self.stages
            .iter()
            .map(|s| s.target)
            .chain(std::iter::once(self.start_vus))
            .max()
            .unwrap_or(0)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stages.is_empty() {
            return Err(ConfigError::NoStages);
        }
        Ok(())
    }

    /// Load options from a JSON document shaped like
    ///
    /// ```json
    /// {
    ///   "startVUs": 0,
    ///   "stages": [{ "duration": "30s", "target": 10 }],
    ///   "thresholds": {
    ///     "http_req_duration": ["p(95)<300"],
    ///     "errors": [{ "threshold": "rate<0.01", "abortOnFail": true }]
    ///   }
    /// }
    /// ```
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let file: OptionsFile = serde_json::from_str(json)?;
        file.try_into()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct OptionsFile {
    stages: Vec<Stage>,
    #[serde(default, rename = "startVUs")]
    start_vus: Option<usize>,
    #[serde(default)]
    thresholds: BTreeMap<String, Vec<ThresholdEntry>>,
    #[serde(default)]
    graceful_ramp_down: Option<String>,
    #[serde(default)]
    graceful_stop: Option<String>,
    #[serde(default)]
    setup_timeout: Option<String>,
    #[serde(default)]
    teardown_timeout: Option<String>,
    #[serde(default)]
    seed: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ThresholdEntry {
    Expression(String),
    #[serde(rename_all = "camelCase")]
    Detailed {
        threshold: String,
        #[serde(default)]
        abort_on_fail: bool,
        #[serde(default)]
        delay_abort_eval: Option<String>,
    },
}

impl TryFrom<OptionsFile> for Options {
    type Error = ConfigError;

    fn try_from(file: OptionsFile) -> Result<Self, Self::Error> {
        let mut options = Options::new().stages(file.stages);
        options.start_vus = file.start_vus.unwrap_or(0);
        options.seed = file.seed;

        if let Some(d) = file.graceful_ramp_down {
            options.graceful_ramp_down = parse_duration(&d)?;
        }
        if let Some(d) = file.graceful_stop {
            options.graceful_stop = parse_duration(&d)?;
        }
        if let Some(d) = file.setup_timeout {
            options.setup_timeout = parse_duration(&d)?;
        }
        if let Some(d) = file.teardown_timeout {
            options.teardown_timeout = parse_duration(&d)?;
        }

        for (metric, entries) in file.thresholds {
            for entry in entries {
                let threshold = match entry {
                    ThresholdEntry::Expression(expr) => parse_threshold(&metric, &expr)?,
                    ThresholdEntry::Detailed {
                        threshold,
                        abort_on_fail,
                        delay_abort_eval,
                    } => {
                        let mut parsed = parse_threshold(&metric, &threshold)?;
                        if abort_on_fail {
                            let delay = delay_abort_eval
                                .as_deref()
                                .map(parse_duration)
                                .transpose()?;
                            parsed = parsed.with_abort_on_fail(delay);
                        }
                        parsed
                    }
                };
                options.thresholds.push(threshold);
            }
        }

        options.validate()?;
        Ok(options)
    }
}

fn parse_threshold(metric: &str, expr: &str) -> Result<Threshold, ConfigError> {
    Threshold::parse(metric, expr).map_err(|source| ConfigError::InvalidThreshold {
        metric: metric.to_string(),
        source,
    })
}

pub fn parse_duration(value: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(value.trim()).map_err(|source| ConfigError::InvalidDuration {
        value: value.to_string(),
        source,
    })
}

mod humantime_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
