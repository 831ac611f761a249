//! Ramping-VU executor
mod ramp;
mod timer;
mod vu_pool;

use crate::context::VuEnv;
use crate::script::Script;
use crate::thresholds::Thresholds;
use humantime::format_duration;
use ramp::RampProfile;
use stampede_core::Options;
use std::sync::Arc;
use std::time::{Duration, Instant};
use timer::Timer;
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn, Instrument};
use vu_pool::VuPool;

/// How often the VU target is recomputed.
const RAMP_TICK: Duration = Duration::from_millis(50);

/// How often `abort_on_fail` thresholds are checked.
const ABORT_EVAL_INTERVAL: Duration = Duration::from_secs(1);

/// Drive VUs through the ramp profile. Returns `true` if an `abort_on_fail` threshold ended the
/// ramp early.
#[instrument(name = "ramp", skip_all)]
pub(crate) async fn run_ramp<S: Script>(
    script: Arc<S>,
    data: Arc<S::Data>,
    env: &VuEnv,
    options: &Options,
    thresholds: &Thresholds,
) -> bool {
    let profile = RampProfile::new(options.start_vus, &options.stages);
    info!(
        "Ramping through {} stages over {} (max {} VUs)",
        options.stages.len(),
        format_duration(profile.total()),
        options.max_vus()
    );

    env.builtins.vus_max.set(options.max_vus() as i64);

    let mut pool = VuPool::new(script, data, env.clone());
    let mut timer = Timer::new(RAMP_TICK).await;
    let start = Instant::now();
    let mut last_abort_eval = Duration::ZERO;
    let mut last_target = None;

    let aborted = loop {
        let elapsed = start.elapsed();
        let Some(target) = profile.target_at(elapsed) else {
            break false;
        };

        if last_target != Some(target) {
            debug!("Target {target} VUs at {}", format_duration(elapsed));
            last_target = Some(target);
        }

        pool.scale_to(target, options.graceful_ramp_down);
        env.builtins.vus.set(pool.active() as i64);

        if elapsed - last_abort_eval >= ABORT_EVAL_INTERVAL {
            last_abort_eval = elapsed;
            if let Some(outcome) = thresholds.crossed_abort(elapsed) {
                error!(
                    "Threshold `{}` on {} crossed (observed {:?}); aborting run.",
                    outcome.expression, outcome.metric, outcome.observed
                );
                break true;
            }
        }

        let since = timer.tick().await;
        if let Some(lag) = timer.lag(since) {
            warn!("Ramp tick lagged by {lag:?}; VU targets are stale");
        }
    };

    if aborted {
        // NOTE: Dropping the pool aborts every VU without waiting on in-flight iterations.
        drop(pool);
    } else {
        info!("Ramp complete; stopping VUs");
        pool.stop(options.graceful_stop).await;
    }
    env.builtins.vus.set(0);

    aborted
}
