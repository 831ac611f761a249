use crate::checks::Checks;
use crate::error::RunError;
use crate::http::Http;
use crate::metrics::{BuiltinMetrics, Metrics};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use stampede_core::DEFAULT_HTTP_TIMEOUT;
use std::time::Duration;

/// Per-VU execution context passed to every lifecycle hook.
///
/// Setup and teardown run with VU id `0`; VUs spawned by the executor are numbered from `1`.
pub struct VuContext {
    id: u64,
    iteration: u64,
    rng: SmallRng,
    http: Http,
    metrics: Metrics,
    checks: Checks,
}

impl VuContext {
    /// A context outside of any run, recording into `metrics`. Useful for driving a script's
    /// hooks directly.
    pub fn new(metrics: &Metrics, seed: Option<u64>) -> Result<Self, RunError> {
        let env = VuEnv::new(metrics.clone(), DEFAULT_HTTP_TIMEOUT, seed)?;
        Ok(env.context(0))
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Number of iterations this VU has completed.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub fn rng(&mut self) -> &mut SmallRng {
        &mut self.rng
    }

    pub fn http(&self) -> &Http {
        &self.http
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    /// Record a named check. Returns `passed`.
    pub fn check(&self, name: &str, passed: bool) -> bool {
        self.checks.record(name, passed)
    }

    /// Record every check and return whether all of them passed.
    pub fn check_all(&self, checks: &[(&str, bool)]) -> bool {
        checks
            .iter()
            .fold(true, |all, (name, passed)| self.check(name, *passed) && all)
    }

    pub(crate) fn finish_iteration(&mut self) {
        self.iteration += 1;
    }
}

/// Everything needed to mint VU contexts for a run.
#[derive(Debug, Clone)]
pub(crate) struct VuEnv {
    pub metrics: Metrics,
    pub builtins: BuiltinMetrics,
    pub http: Http,
    pub checks: Checks,
    seed: Option<u64>,
}

impl VuEnv {
    pub fn new(metrics: Metrics, http_timeout: Duration, seed: Option<u64>) -> Result<Self, RunError> {
        let builtins = BuiltinMetrics::register(&metrics)?;
        let http = Http::new(http_timeout, &builtins)?;
        let checks = Checks::new(builtins.checks.clone());
        Ok(Self {
            metrics,
            builtins,
            http,
            checks,
            seed,
        })
    }

    pub fn context(&self, id: u64) -> VuContext {
        let rng = match self.seed {
            Some(seed) => SmallRng::seed_from_u64(seed.wrapping_add(id)),
            None => SmallRng::from_entropy(),
        };

        VuContext {
            id,
            iteration: 0,
            rng,
            http: self.http.clone(),
            metrics: self.metrics.clone(),
            checks: self.checks.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn check_all_records_every_check() {
        let metrics = Metrics::new();
        let env = VuEnv::new(metrics, DEFAULT_HTTP_TIMEOUT, None).unwrap();
        let ctx = env.context(1);

        assert!(!ctx.check_all(&[("first", false), ("second", true)]));
        assert!(ctx.check_all(&[("first", true), ("second", true)]));

        let checks = env.checks.summaries();
        assert_eq!(checks.len(), 2);
        assert_eq!((checks[0].passes, checks[0].fails), (1, 1));
        assert_eq!((checks[1].passes, checks[1].fails), (2, 0));
    }

    fn draws(mut ctx: VuContext) -> Vec<u32> {
        (0..4).map(|_| ctx.rng().gen()).collect()
    }

    #[test]
    fn seeded_contexts_are_reproducible_per_vu() {
        let env = VuEnv::new(Metrics::new(), DEFAULT_HTTP_TIMEOUT, Some(42)).unwrap();

        assert_eq!(draws(env.context(1)), draws(env.context(1)));
        assert_ne!(draws(env.context(1)), draws(env.context(2)));
    }
}
