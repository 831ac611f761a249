//! A small ramping virtual-user load testing runtime.
//!
//! Implement [`Script`] for a workload, describe the ramp profile and thresholds with
//! [`Options`](stampede_core::Options), then hand both to a [`Runner`]. The runner executes
//! setup once, drives concurrent VUs through every stage, runs teardown, and returns a
//! [`RunSummary`](stampede_core::RunSummary) with every metric, check and threshold outcome.
pub mod context;
pub mod error;
pub mod http;
pub mod metrics;
pub mod report;
pub mod runner;
pub mod script;

pub(crate) mod checks;
pub(crate) mod executor;
pub(crate) mod thresholds;

pub use context::VuContext;
pub use error::{MetricError, RunError};
pub use report::TextSummary;
pub use runner::Runner;
pub use script::Script;
pub use stampede_core;

pub mod prelude {
    pub use crate::context::VuContext;
    pub use crate::error::RunError;
    pub use crate::http::HttpResponse;
    pub use crate::metrics::{Counter, Gauge, Metrics, Rate, Trend};
    pub use crate::report::TextSummary;
    pub use crate::runner::Runner;
    pub use crate::script::Script;

    pub use stampede_core::{Options, RunSummary, Stage, Threshold};
}
