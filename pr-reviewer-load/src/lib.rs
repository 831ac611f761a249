//! Load test for the PR reviewer assignment service.
//!
//! Setup seeds `team1..=team5` with three active members each. Every iteration then creates a
//! pull request authored by the first member of a randomly chosen seeded team, and teardown
//! checks that `/health` and `/stats` still answer.
pub mod payload;
pub mod profile;
pub mod script;

pub use profile::{default_options, default_stages, default_thresholds};
pub use script::{PrReviewerScript, ScriptConfig, SeedData};

use stampede::metrics::Metrics;
use stampede::{MetricError, Runner};
use stampede_core::Options;

/// A runner for the workload with its `errors` rate registered in the runner's registry.
pub fn runner(
    config: ScriptConfig,
    options: Options,
) -> Result<Runner<PrReviewerScript>, MetricError> {
    let metrics = Metrics::new();
    let errors = metrics.rate(script::ERRORS_METRIC)?;
    let script = PrReviewerScript::new(config, errors);
    Ok(Runner::new(script, options).metrics(metrics))
}
