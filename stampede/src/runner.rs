//! Run orchestration
use crate::context::{VuContext, VuEnv};
use crate::error::RunError;
use crate::executor::run_ramp;
use crate::metrics::Metrics;
use crate::script::Script;
use crate::thresholds::Thresholds;
use stampede_core::{Options, RunSummary, DEFAULT_HTTP_TIMEOUT};
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn, Instrument};

/// Runs a [`Script`] through setup, the ramp profile and teardown.
///
/// Awaiting the runner directly is the same as calling [`Runner::run`].
///
/// # Example
/// ```no_run
/// use stampede::prelude::*;
/// use std::time::Duration;
///
/// # struct Ping;
/// # impl Script for Ping {
/// #     type Data = ();
/// #     async fn setup(&self, _ctx: &mut VuContext) {}
/// #     async fn run_iteration(&self, _ctx: &mut VuContext, _data: &()) {}
/// # }
/// #[tokio::main]
/// async fn main() -> Result<(), RunError> {
///     let options = Options::new()
///         .stage(Duration::from_secs(30), 10)
///         .stage(Duration::from_secs(30), 0)
///         .threshold(Threshold::parse("http_req_failed", "rate<0.01").unwrap());
///
///     let summary = Runner::new(Ping, options).await?;
///     println!("{}", TextSummary(&summary));
///     Ok(())
/// }
/// ```
pub struct Runner<S> {
    script: Arc<S>,
    options: Options,
    metrics: Metrics,
    http_timeout: Duration,
}

impl<S: Script> Runner<S> {
    pub fn new(script: S, options: Options) -> Self {
        Self {
            script: Arc::new(script),
            options,
            metrics: Metrics::new(),
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }

    /// Record into an existing registry. Custom metrics a script writes to (and thresholds
    /// refer to) must come from the same registry.
    pub fn metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Per-request timeout of the HTTP client handed to the script.
    pub fn http_timeout(mut self, http_timeout: Duration) -> Self {
        self.http_timeout = http_timeout;
        self
    }

    #[instrument(name = "run", skip_all)]
    pub async fn run(self) -> Result<RunSummary, RunError> {
        let Runner {
            script,
            options,
            metrics,
            http_timeout,
        } = self;

        options.validate()?;
        let env = VuEnv::new(metrics.clone(), http_timeout, options.seed)?;
        let thresholds = Thresholds::resolve(&options.thresholds, &metrics)?;

        info!(
            "Starting run: {} stages, {} thresholds",
            options.stages.len(),
            options.thresholds.len()
        );
        let start = Instant::now();

        let data = setup(script.clone(), env.context(0), options.setup_timeout).await?;
        let data = Arc::new(data);

        let aborted = run_ramp(script.clone(), data.clone(), &env, &options, &thresholds).await;

        teardown(script, data, env.context(0), options.teardown_timeout).await;

        let elapsed = start.elapsed();
        let summary = RunSummary {
            duration: elapsed,
            aborted,
            metrics: metrics.summaries(elapsed)?,
            checks: env.checks.summaries(),
            thresholds: thresholds.evaluate(elapsed),
        };

        if summary.passed() {
            info!("Run complete in {:?}; all thresholds passed", elapsed);
        } else {
            for failed in summary.failed_thresholds() {
                warn!(
                    "Threshold `{}` on {} failed (observed {:?})",
                    failed.expression, failed.metric, failed.observed
                );
            }
        }

        Ok(summary)
    }
}

impl<S: Script> IntoFuture for Runner<S> {
    type Output = Result<RunSummary, RunError>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.run())
    }
}

#[instrument(name = "setup", skip_all)]
async fn setup<S: Script>(
    script: Arc<S>,
    mut ctx: VuContext,
    limit: Duration,
) -> Result<S::Data, RunError> {
    debug!("Running setup");
    let task = async move { script.setup(&mut ctx).await };
    let mut handle = tokio::spawn(task.in_current_span());

    match timeout(limit, &mut handle).await {
        Ok(Ok(data)) => Ok(data),
        Ok(Err(err)) => Err(RunError::Setup(err.to_string())),
        Err(_) => {
            handle.abort();
            Err(RunError::SetupTimeout(limit))
        }
    }
}

#[instrument(name = "teardown", skip_all)]
async fn teardown<S: Script>(
    script: Arc<S>,
    data: Arc<S::Data>,
    mut ctx: VuContext,
    limit: Duration,
) {
    debug!("Running teardown");
    let task = async move { script.teardown(&mut ctx, &data).await };
    let mut handle = tokio::spawn(task.in_current_span());

    match timeout(limit, &mut handle).await {
        Ok(Ok(())) => debug!("Teardown complete"),
        Ok(Err(err)) => error!("Teardown failed: {err}"),
        Err(_) => {
            handle.abort();
            error!(
                "Teardown did not complete within {}",
                humantime::format_duration(limit)
            );
        }
    }
}
