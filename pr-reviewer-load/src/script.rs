//! The PR reviewer workload
use crate::payload::{author_for_team, pull_request_id, PullRequestPayload, TeamPayload};
use rand::seq::SliceRandom;
use rand::Rng;
use stampede::prelude::*;
use std::time::Duration;
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn};

pub const TEAM_ADD_PATH: &str = "/team/add";
pub const PULL_REQUEST_CREATE_PATH: &str = "/pullRequest/create";
pub const HEALTH_PATH: &str = "/health";
pub const STATS_PATH: &str = "/stats";

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_TEAM_COUNT: usize = 5;
pub const DEFAULT_IDLE_SLEEP: Duration = Duration::from_secs(1);
pub const DEFAULT_THINK_TIME: Duration = Duration::from_millis(100);
pub const DEFAULT_LATENCY_BUDGET: Duration = Duration::from_millis(300);

pub const CHECK_STATUS_201: &str = "status is 201";
pub const CHECK_HEALTH: &str = "health check ok";
pub const CHECK_STATS: &str = "stats available";

/// Name of the custom rate fed with one sample per pull request attempt.
pub const ERRORS_METRIC: &str = "errors";

#[derive(Debug, Clone)]
pub struct ScriptConfig {
    pub base_url: String,
    /// Teams `team1..=team{n}` are seeded during setup.
    pub team_count: usize,
    /// Pause taken by an iteration when setup seeded nothing.
    pub idle_sleep: Duration,
    /// Pause after every pull request.
    pub think_time: Duration,
    /// Slowest pull request creation that still counts as a success.
    pub latency_budget: Duration,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            team_count: DEFAULT_TEAM_COUNT,
            idle_sleep: DEFAULT_IDLE_SLEEP,
            think_time: DEFAULT_THINK_TIME,
            latency_budget: DEFAULT_LATENCY_BUDGET,
        }
    }
}

impl ScriptConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            ..Default::default()
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

/// Teams that were successfully seeded, shared read-only with every VU.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedData {
    pub teams: Vec<String>,
}

/// Seeds teams, creates pull requests authored by their first member under load, then
/// confirms the service is still healthy.
pub struct PrReviewerScript {
    config: ScriptConfig,
    errors: Rate,
    latency_check: String,
}

impl PrReviewerScript {
    /// `errors` must come from the registry handed to the runner for thresholds on it to
    /// resolve.
    pub fn new(config: ScriptConfig, errors: Rate) -> Self {
        let latency_check = format!("response time < {}ms", config.latency_budget.as_millis());
        Self {
            config,
            errors,
            latency_check,
        }
    }

    pub fn config(&self) -> &ScriptConfig {
        &self.config
    }

    /// Name of the latency check, derived from the configured budget.
    pub fn latency_check(&self) -> &str {
        &self.latency_check
    }
}

impl Script for PrReviewerScript {
    type Data = SeedData;

    #[instrument(name = "seed", skip_all, fields(base_url = %self.config.base_url))]
    async fn setup(&self, ctx: &mut VuContext) -> SeedData {
        let url = self.config.url(TEAM_ADD_PATH);
        let mut teams = Vec::with_capacity(self.config.team_count);

        for n in 1..=self.config.team_count {
            let team = TeamPayload::numbered(n);
            let res = ctx.http().post_json(&url, &team).await;

            match (res.status, res.error) {
                (201, _) => {
                    debug!("Seeded {}", team.team_name);
                    teams.push(team.team_name);
                }
                (_, Some(err)) => warn!("Seeding {} failed: {err}", team.team_name),
                (status, None) => {
                    warn!("Seeding {} returned {status}; skipping it", team.team_name)
                }
            }
        }

        info!(
            "Seeded {}/{} teams: {:?}",
            teams.len(),
            self.config.team_count,
            teams
        );
        SeedData { teams }
    }

    async fn run_iteration(&self, ctx: &mut VuContext, data: &SeedData) {
        let Some(team) = pick_team(&data.teams, ctx.rng()) else {
            ctx.sleep(self.config.idle_sleep).await;
            return;
        };

        let payload = PullRequestPayload::new(pull_request_id(ctx.rng()), author_for_team(team));
        let res = ctx
            .http()
            .post_json(&self.config.url(PULL_REQUEST_CREATE_PATH), &payload)
            .await;

        let success = ctx.check_all(&[
            (CHECK_STATUS_201, res.status == 201),
            (self.latency_check.as_str(), res.duration < self.config.latency_budget),
        ]);
        self.errors.add(!success);

        if !success {
            trace!(
                "Pull request {} by {} -> {} in {:?}",
                payload.pull_request_id,
                payload.author_id,
                res.status,
                res.duration
            );
        }

        ctx.sleep(self.config.think_time).await;
    }

    #[instrument(name = "verify", skip_all)]
    async fn teardown(&self, ctx: &mut VuContext, _data: &SeedData) {
        let health = ctx.http().get(&self.config.url(HEALTH_PATH)).await;
        ctx.check(CHECK_HEALTH, health.status == 200);

        let stats = ctx.http().get(&self.config.url(STATS_PATH)).await;
        ctx.check(CHECK_STATS, stats.status == 200);

        info!("Health returned {}, stats returned {}", health.status, stats.status);
    }
}

/// Uniform pick over the seeded teams. `None` when nothing was seeded.
pub fn pick_team<'a>(teams: &'a [String], rng: &mut impl Rng) -> Option<&'a str> {
    teams.choose(rng).map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::SmallRng, SeedableRng};
    use std::collections::HashMap;

    #[test]
    fn picks_only_seeded_teams_uniformly() {
        let teams: Vec<String> = ["team1", "team2", "team4"].map(String::from).to_vec();
        let mut rng = SmallRng::seed_from_u64(3);

        let mut seen: HashMap<&str, usize> = HashMap::new();
        for _ in 0..3_000 {
            *seen.entry(pick_team(&teams, &mut rng).unwrap()).or_default() += 1;
        }

        assert_eq!(seen.len(), 3);
        assert!(!seen.contains_key("team3"));
        assert!(seen.values().all(|&n| n > 800));
    }

    #[test]
    fn empty_seed_picks_nothing() {
        let mut rng = SmallRng::seed_from_u64(3);
        assert_eq!(pick_team(&[], &mut rng), None);
    }

    #[test]
    fn config_urls() {
        let config = ScriptConfig::new("http://pr-svc:9000/");
        assert_eq!(config.url(HEALTH_PATH), "http://pr-svc:9000/health");
        assert_eq!(config.team_count, 5);
        assert_eq!(ScriptConfig::default().base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn latency_check_follows_budget() {
        let metrics = Metrics::new();
        let script = PrReviewerScript::new(ScriptConfig::default(), metrics.rate("errors").unwrap());
        assert_eq!(script.latency_check(), "response time < 300ms");
    }

    #[tokio::test]
    #[ntest::timeout(5_000)]
    async fn empty_seed_sleeps_without_requests() {
        let metrics = Metrics::new();
        let config = ScriptConfig {
            idle_sleep: Duration::from_millis(20),
            ..ScriptConfig::new("http://127.0.0.1:1")
        };
        let script = PrReviewerScript::new(config, metrics.rate(ERRORS_METRIC).unwrap());
        let mut ctx = VuContext::new(&metrics, Some(1)).unwrap();

        let start = std::time::Instant::now();
        script.run_iteration(&mut ctx, &SeedData::default()).await;

        assert!(start.elapsed() >= Duration::from_millis(20));
        assert_eq!(metrics.counter("http_reqs").unwrap().count(), 0);
        assert_eq!(metrics.rate(ERRORS_METRIC).unwrap().total(), 0);
    }

    #[tracing_test::traced_test]
    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn unreachable_service_counts_as_error() {
        let metrics = Metrics::new();
        let config = ScriptConfig {
            think_time: Duration::ZERO,
            ..ScriptConfig::new("http://127.0.0.1:1")
        };
        let script = PrReviewerScript::new(config, metrics.rate(ERRORS_METRIC).unwrap());
        let mut ctx = VuContext::new(&metrics, Some(1)).unwrap();

        let seed = script.setup(&mut ctx).await;
        assert!(seed.teams.is_empty());
        for n in 1..=5 {
            assert!(logs_contain(&format!("Seeding team{n} failed")));
        }
        assert!(logs_contain("Seeded 0/5 teams"));

        let data = SeedData {
            teams: vec!["team1".to_string()],
        };
        script.run_iteration(&mut ctx, &data).await;

        let errors = metrics.rate(ERRORS_METRIC).unwrap();
        assert_eq!(errors.rate(), Some(1.));
        // Five seeding attempts and one pull request.
        assert_eq!(metrics.counter("http_reqs").unwrap().count(), 6);
    }
}
