mod utils;
#[allow(unused)]
use utils::*;

mod tests {
    use super::*;

    use anyhow::Context;
    use mock_service::Route;
    use pr_reviewer_load::script::{CHECK_HEALTH, CHECK_STATS, CHECK_STATUS_201, ERRORS_METRIC};
    use pr_reviewer_load::{default_thresholds, runner};
    use serde_json::Value;
    use stampede::TextSummary;
    use stampede_core::{Stage, Threshold, HTTP_REQ_FAILED};
    use std::collections::HashSet;
    use std::time::{Duration, Instant};

    const EXPECTED_AUTHORS: [&str; 5] = ["u11", "u21", "u31", "u41", "u51"];
    const LATENCY_CHECK: &str = "response time < 300ms";

    #[tokio::test]
    #[ntest::timeout(30_000)]
    async fn healthy_service_passes_default_thresholds() -> anyhow::Result<()> {
        init();
        let (mock, base) = mock().await;

        let mut options = quick_options();
        options.thresholds = default_thresholds()?;
        let summary = runner(quick_config(&base), options)?.await?;
        println!("{}", TextSummary(&summary));

        assert!(summary.passed(), "{:?}", summary.thresholds);
        assert!(!summary.aborted);
        assert_eq!(mock.teams().len(), 5);

        let prs = mock.pull_requests();
        assert!(!prs.is_empty());
        assert!(prs
            .iter()
            .all(|pr| EXPECTED_AUTHORS.contains(&pr.author_id.as_str())));

        let ids: HashSet<&str> = prs.iter().map(|pr| pr.pull_request_id.as_str()).collect();
        assert_eq!(ids.len(), prs.len());

        let errors = summary.metric(ERRORS_METRIC).context("errors metric")?;
        assert_eq!(errors.rate(), Some(0.));
        assert_eq!(errors.count(), prs.len() as u64);
        assert_eq!(summary.check(CHECK_STATUS_201).context("status check")?.fails, 0);
        Ok(())
    }

    #[tokio::test]
    #[ntest::timeout(30_000)]
    async fn slow_created_pull_request_counts_as_error() -> anyhow::Result<()> {
        init();
        let (mock, base) = mock().await;
        mock.pull_request_delay(Duration::from_millis(350));

        let mut options = quick_options();
        options.thresholds = default_thresholds()?;
        let summary = runner(quick_config(&base), options)?.await?;

        let status = summary.check(CHECK_STATUS_201).context("status check")?;
        assert!(status.passes > 0);
        assert_eq!(status.fails, 0);

        let latency = summary.check(LATENCY_CHECK).context("latency check")?;
        assert_eq!(latency.passes, 0);
        assert_eq!(latency.fails, status.passes);

        let errors = summary.metric(ERRORS_METRIC).context("errors metric")?;
        assert_eq!(errors.rate(), Some(1.));
        assert_eq!(errors.count(), status.passes);
        assert!(!summary.passed());

        // The exported summary carries the same verdict.
        let exported: Value = serde_json::to_value(&summary)?;
        assert_eq!(exported["metrics"][ERRORS_METRIC]["rate"], 1.0);
        assert_eq!(exported["metrics"][ERRORS_METRIC]["type"], "rate");
        Ok(())
    }

    #[tokio::test]
    #[ntest::timeout(30_000)]
    async fn rejected_team_is_never_selected() -> anyhow::Result<()> {
        init();
        let (mock, base) = mock().await;
        mock.reject_team("team3");

        let options = quick_options().threshold(Threshold::parse(ERRORS_METRIC, "rate<0.01")?);
        let summary = runner(quick_config(&base), options)?.await?;

        assert!(summary.passed());
        assert_eq!(mock.teams(), ["team1", "team2", "team4", "team5"]);

        let prs = mock.pull_requests();
        assert!(!prs.is_empty());
        assert!(prs.iter().all(|pr| pr.author_id != "u31"));
        assert!(prs
            .iter()
            .all(|pr| EXPECTED_AUTHORS.contains(&pr.author_id.as_str())));
        Ok(())
    }

    #[tokio::test]
    #[ntest::timeout(30_000)]
    async fn failing_service_fails_the_run() -> anyhow::Result<()> {
        init();
        let (mock, base) = mock().await;
        mock.force_pull_request_status(mock_service::StatusCode::SERVICE_UNAVAILABLE);

        let mut options = quick_options();
        options.thresholds = default_thresholds()?;
        let summary = runner(quick_config(&base), options)?.await?;

        assert!(!summary.passed());
        assert!(mock.requests(Route::PullRequestCreate) > 0);
        assert_eq!(
            summary.metric(ERRORS_METRIC).context("errors metric")?.rate(),
            Some(1.)
        );

        let failed: Vec<(&str, &str)> = summary
            .failed_thresholds()
            .map(|t| (t.metric.as_str(), t.expression.as_str()))
            .collect();
        assert!(failed.contains(&(ERRORS_METRIC, "rate<0.01")));
        assert!(failed.contains(&(HTTP_REQ_FAILED, "rate<0.01")));

        // Teardown still runs against a failing service.
        assert_eq!(mock.requests(Route::Health), 1);
        assert_eq!(mock.requests(Route::Stats), 1);
        Ok(())
    }

    #[tokio::test]
    #[ntest::timeout(30_000)]
    async fn empty_seed_makes_no_pull_request_calls() -> anyhow::Result<()> {
        init();
        let (mock, base) = mock().await;
        for n in 1..=5 {
            mock.reject_team(&format!("team{n}"));
        }

        let summary = runner(quick_config(&base), quick_options())?.await?;

        assert_eq!(mock.requests(Route::TeamAdd), 5);
        assert_eq!(mock.requests(Route::PullRequestCreate), 0);
        assert!(summary.metric("iterations").context("iterations metric")?.count() > 0);
        assert_eq!(summary.metric(ERRORS_METRIC).context("errors metric")?.count(), 0);
        Ok(())
    }

    #[tokio::test]
    #[ntest::timeout(30_000)]
    async fn teardown_checks_health_and_stats_once() -> anyhow::Result<()> {
        init();
        let (mock, base) = mock().await;
        mock.set_unhealthy(true);

        let summary = runner(quick_config(&base), quick_options())?.await?;

        assert_eq!(mock.requests(Route::Health), 1);
        assert_eq!(mock.requests(Route::Stats), 1);

        let health = summary.check(CHECK_HEALTH).context("health check")?;
        assert_eq!((health.passes, health.fails), (0, 1));
        let stats = summary.check(CHECK_STATS).context("stats check")?;
        assert_eq!((stats.passes, stats.fails), (1, 0));

        // Checks alone never fail a run.
        assert!(summary.passed());
        Ok(())
    }

    #[tokio::test]
    #[ntest::timeout(30_000)]
    async fn unreachable_service_fails_request_threshold() -> anyhow::Result<()> {
        init();

        let mut options = quick_options();
        options.thresholds = default_thresholds()?;
        let summary = runner(quick_config("http://127.0.0.1:1"), options)?
            .http_timeout(Duration::from_secs(2))
            .await?;

        assert!(!summary.passed());
        assert_eq!(
            summary.metric(HTTP_REQ_FAILED).context("http_req_failed metric")?.rate(),
            Some(1.)
        );
        // Nothing seeded, so no pull request was attempted.
        assert_eq!(summary.metric(ERRORS_METRIC).context("errors metric")?.count(), 0);
        Ok(())
    }

    #[tokio::test]
    #[ntest::timeout(30_000)]
    async fn abort_on_fail_ends_run_early() -> anyhow::Result<()> {
        init();
        let (mock, base) = mock().await;
        mock.force_pull_request_status(mock_service::StatusCode::INTERNAL_SERVER_ERROR);

        let options = quick_options()
            .stages(vec![Stage::new(Duration::from_secs(60), 2)])
            .threshold(Threshold::parse(ERRORS_METRIC, "rate<0.01")?.with_abort_on_fail(None));

        let start = Instant::now();
        let summary = runner(quick_config(&base), options)?.await?;

        assert!(summary.aborted);
        assert!(!summary.passed());
        assert!(start.elapsed() < Duration::from_secs(10));
        assert_eq!(mock.requests(Route::Health), 1);
        Ok(())
    }
}
