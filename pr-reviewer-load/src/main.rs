use anyhow::Context;
use clap::Parser;
use pr_reviewer_load::{default_options, runner, ScriptConfig};
use stampede::TextSummary;
use stampede_core::{Options, Stage, DEFAULT_HTTP_TIMEOUT};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
#[allow(unused_imports)]
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Exit status when the run completed but a threshold failed.
const THRESHOLDS_FAILED: u8 = 99;

const DEFAULT_LOG_FILTER: &str = "stampede=info,pr_reviewer_load=info";

/// Ramp virtual users against the PR reviewer service.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Service under test.
    #[arg(long, env = "BASE_URL", default_value = pr_reviewer_load::script::DEFAULT_BASE_URL)]
    base_url: String,

    /// JSON options file replacing the built-in ramp profile and thresholds.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Ramp stage as `<duration>:<target>`, e.g. `30s:10`. Repeat to build a profile.
    #[arg(short, long = "stage")]
    stages: Vec<Stage>,

    /// Number of teams to seed.
    #[arg(long, default_value_t = pr_reviewer_load::script::DEFAULT_TEAM_COUNT)]
    teams: usize,

    /// Seed every VU's random source for a reproducible team selection.
    #[arg(long)]
    seed: Option<u64>,

    /// Per-request timeout.
    #[arg(long, value_parser = humantime::parse_duration, default_value = "60s")]
    http_timeout: Duration,

    /// Report metrics without evaluating thresholds.
    #[arg(long)]
    no_thresholds: bool,

    /// Write the run summary as JSON to this path.
    #[arg(long)]
    summary_export: Option<PathBuf>,
}

impl Args {
    async fn options(&self) -> anyhow::Result<Options> {
        let mut options = match &self.config {
            Some(path) => {
                let json = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("reading {}", path.display()))?;
                Options::from_json(&json)?
            }
            None => default_options()?,
        };

        if !self.stages.is_empty() {
            options.stages = self.stages.clone();
        }
        if let Some(seed) = self.seed {
            options.seed = Some(seed);
        }
        if self.no_thresholds {
            options.thresholds.clear();
        }

        Ok(options)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let args = Args::parse();
    debug!("{args:?}");

    let options = args.options().await?;
    let config = ScriptConfig {
        team_count: args.teams,
        ..ScriptConfig::new(&args.base_url)
    };

    info!(
        "Load testing {} for {} (max {} VUs)",
        config.base_url,
        humantime::format_duration(options.duration()),
        options.max_vus()
    );
    if args.http_timeout != DEFAULT_HTTP_TIMEOUT {
        debug!("HTTP timeout {}", humantime::format_duration(args.http_timeout));
    }

    let summary = runner(config, options)?
        .http_timeout(args.http_timeout)
        .await?;

    println!("{}", TextSummary(&summary));

    if let Some(path) = &args.summary_export {
        let json = serde_json::to_string_pretty(&summary)?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("writing summary to {}", path.display()))?;
        info!("Summary written to {}", path.display());
    }

    if summary.passed() {
        Ok(ExitCode::SUCCESS)
    } else {
        for failed in summary.failed_thresholds() {
            error!("Threshold crossed: {} {}", failed.metric, failed.expression);
        }
        Ok(ExitCode::from(THRESHOLDS_FAILED))
    }
}
