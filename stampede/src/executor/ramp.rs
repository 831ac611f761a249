use stampede_core::Stage;
use std::time::Duration;

/// Piecewise-linear VU target over time.
#[derive(Debug, Clone)]
pub(crate) struct RampProfile {
    start: usize,
    stages: Vec<Stage>,
}

impl RampProfile {
    pub fn new(start: usize, stages: &[Stage]) -> Self {
        Self {
            start,
            stages: stages.to_vec(),
        }
    }

    pub fn total(&self) -> Duration {
        self.stages.iter().map(|s| s.duration).sum()
    }

    /// Number of VUs that should be active `elapsed` into the run, or `None` once the last
    /// stage is over.
    ///
    /// Each stage moves linearly from the previous stage's target (or the start count) to its
    /// own target. Zero-length stages jump straight to their target.
    pub fn target_at(&self, elapsed: Duration) -> Option<usize> {
        let mut from = self.start;
        let mut stage_start = Duration::ZERO;

        for stage in &self.stages {
            let stage_end = stage_start + stage.duration;
            if elapsed < stage_end {
                let progress =
                    (elapsed - stage_start).as_secs_f64() / stage.duration.as_secs_f64();
                let delta = stage.target as f64 - from as f64;
                let target = from as f64 + delta * progress;
                return Some(target.round().max(0.) as usize);
            }
            from = stage.target;
            stage_start = stage_end;
        }

        None
    }
}
