//! Threshold expressions
//!
//! A threshold is a pass/fail condition on an aggregated metric, written as
//! `<aggregation> <operator> <value>`, e.g. `p(95)<300` or `rate<0.01`.
use crate::ThresholdParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// The kind of a registered metric. Determines which aggregations a threshold may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Counter,
    Gauge,
    Rate,
    Trend,
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Rate => "rate",
            MetricKind::Trend => "trend",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Aggregation {
    Avg,
    Min,
    Max,
    Med,
    /// Percentile in the range `0..=100`.
    Percentile(f64),
    Count,
    Rate,
    Value,
}

impl Aggregation {
    pub fn supports(&self, kind: MetricKind) -> bool {
        use Aggregation::*;
        match kind {
            MetricKind::Trend => matches!(self, Avg | Min | Max | Med | Percentile(_) | Count),
            MetricKind::Rate => matches!(self, Rate),
            MetricKind::Counter => matches!(self, Count | Rate),
            MetricKind::Gauge => matches!(self, Value),
        }
    }
}

impl FromStr for Aggregation {
    type Err = ThresholdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(inner) = s.strip_prefix("p(").and_then(|s| s.strip_suffix(')')) {
            let p: f64 = inner
                .trim()
                .parse()
                .map_err(|_| ThresholdParseError::InvalidPercentile(inner.to_string()))?;
            if !(0.0..=100.0).contains(&p) {
                return Err(ThresholdParseError::InvalidPercentile(inner.to_string()));
            }
            return Ok(Aggregation::Percentile(p));
        }

        match s {
            "avg" => Ok(Aggregation::Avg),
            "min" => Ok(Aggregation::Min),
            "max" => Ok(Aggregation::Max),
            "med" => Ok(Aggregation::Med),
            "count" => Ok(Aggregation::Count),
            "rate" => Ok(Aggregation::Rate),
            "value" => Ok(Aggregation::Value),
            other => Err(ThresholdParseError::UnknownAggregation(other.to_string())),
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Aggregation::Avg => f.write_str("avg"),
            Aggregation::Min => f.write_str("min"),
            Aggregation::Max => f.write_str("max"),
            Aggregation::Med => f.write_str("med"),
            Aggregation::Percentile(p) => write!(f, "p({p})"),
            Aggregation::Count => f.write_str("count"),
            Aggregation::Rate => f.write_str("rate"),
            Aggregation::Value => f.write_str("value"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl Operator {
    // NOTE: Longer tokens first so `<=` is not read as `<`.
    const TOKENS: [(&'static str, Operator); 7] = [
        ("===", Operator::Eq),
        ("==", Operator::Eq),
        ("!=", Operator::Ne),
        ("<=", Operator::Le),
        (">=", Operator::Ge),
        ("<", Operator::Lt),
        (">", Operator::Gt),
    ];

    pub fn compare(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            Operator::Lt => lhs < rhs,
            Operator::Le => lhs <= rhs,
            Operator::Gt => lhs > rhs,
            Operator::Ge => lhs >= rhs,
            Operator::Eq => lhs == rhs,
            Operator::Ne => lhs != rhs,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Eq => "==",
            Operator::Ne => "!=",
        };
        f.write_str(op)
    }
}

/// A parsed `<aggregation> <operator> <value>` expression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Condition {
    pub aggregation: Aggregation,
    pub operator: Operator,
    pub value: f64,
}

impl Condition {
    pub fn holds(&self, observed: f64) -> bool {
        self.operator.compare(observed, self.value)
    }
}

impl FromStr for Condition {
    type Err = ThresholdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ThresholdParseError::Empty);
        }

        let idx = s
            .find(&['<', '>', '=', '!'][..])
            .ok_or_else(|| ThresholdParseError::MissingOperator(s.to_string()))?;
        let (lhs, rest) = s.split_at(idx);

        let (token, operator) = Operator::TOKENS
            .iter()
            .find(|(token, _)| rest.starts_with(token))
            .copied()
            .ok_or_else(|| ThresholdParseError::MissingOperator(s.to_string()))?;

        let aggregation = lhs.parse()?;
        let raw_value = rest[token.len()..].trim();
        let value = raw_value
            .parse()
            .map_err(|_| ThresholdParseError::InvalidValue(raw_value.to_string()))?;

        Ok(Condition {
            aggregation,
            operator,
            value,
        })
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.aggregation, self.operator, self.value)
    }
}

/// A named condition on a metric.
#[derive(Debug, Clone, PartialEq)]
pub struct Threshold {
    pub metric: String,
    /// The expression as written, used for reporting.
    pub source: String,
    pub condition: Condition,
    /// End the run as soon as this threshold is crossed.
    pub abort_on_fail: bool,
    /// Do not evaluate `abort_on_fail` before this much of the run has elapsed.
    pub delay_abort_eval: Option<Duration>,
}

impl Threshold {
    pub fn parse(metric: &str, expression: &str) -> Result<Self, ThresholdParseError> {
        Ok(Self {
            metric: metric.to_string(),
            source: expression.trim().to_string(),
            condition: expression.parse()?,
            abort_on_fail: false,
            delay_abort_eval: None,
        })
    }

    pub fn with_abort_on_fail(mut self, delay: Option<Duration>) -> Self {
        self.abort_on_fail = true;
        self.delay_abort_eval = delay;
        self
    }
}
