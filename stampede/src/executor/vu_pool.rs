use crate::context::{VuContext, VuEnv};
use crate::metrics::{Counter, Trend};
use crate::script::Script;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
#[allow(unused)]
use tracing::{debug, error, info, trace, warn, Instrument};

struct Vu {
    id: u64,
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

struct Retiring {
    vu: Vu,
    deadline: Instant,
}

/// The set of running VU tasks.
///
/// Scaling down never interrupts an iteration outright: the newest VUs are asked to stop once
/// their current iteration finishes, and are only aborted once their grace period expires.
pub(crate) struct VuPool<S: Script> {
    script: Arc<S>,
    data: Arc<S::Data>,
    env: VuEnv,
    active: Vec<Vu>,
    retiring: Vec<Retiring>,
    next_id: u64,
}

impl<S: Script> VuPool<S> {
    pub fn new(script: Arc<S>, data: Arc<S::Data>, env: VuEnv) -> Self {
        Self {
            script,
            data,
            env,
            active: vec![],
            retiring: vec![],
            next_id: 0,
        }
    }

    pub fn active(&self) -> usize {
        self.active.len()
    }

    pub fn retiring(&self) -> usize {
        self.retiring.len()
    }

    pub fn scale_to(&mut self, target: usize, grace: Duration) {
        self.reap();

        while self.active.len() < target {
            self.spawn();
        }

        if self.active.len() > target {
            let deadline = Instant::now() + grace;
            for vu in self.active.drain(target..) {
                trace!("Retiring VU {}", vu.id);
                vu.stop.store(true, Ordering::Relaxed);
                self.retiring.push(Retiring { vu, deadline });
            }
        }
    }

    /// Drop finished tasks and interrupt retiring VUs past their deadline.
    pub fn reap(&mut self) {
        self.active.retain(|vu| {
            if vu.handle.is_finished() {
                error!("VU {} exited unexpectedly; it will be replaced.", vu.id);
                false
            } else {
                true
            }
        });

        let now = Instant::now();
        self.retiring.retain(|r| {
            if r.vu.handle.is_finished() {
                false
            } else if now >= r.deadline {
                warn!("VU {} exceeded its ramp-down grace period; interrupting.", r.vu.id);
                r.vu.handle.abort();
                false
            } else {
                true
            }
        });
    }

    /// Ask every VU to stop and wait up to `grace` for in-flight iterations.
    pub async fn stop(mut self, grace: Duration) {
        let deadline = Instant::now() + grace;
        let mut vus: Vec<Vu> = self
            .active
            .drain(..)
            .chain(self.retiring.drain(..).map(|r| r.vu))
            .collect();

        for vu in &vus {
            vu.stop.store(true, Ordering::Relaxed);
        }

        debug!("Waiting on {} VUs to finish.", vus.len());
        for vu in &mut vus {
            if timeout_at(deadline, &mut vu.handle).await.is_err() {
                warn!("VU {} did not finish within the graceful stop; interrupting.", vu.id);
                vu.handle.abort();
            }
        }
    }

    fn spawn(&mut self) {
        self.next_id += 1;
        let id = self.next_id;
        let stop = Arc::new(AtomicBool::new(false));

        let task = vu_loop(
            self.script.clone(),
            self.data.clone(),
            self.env.context(id),
            stop.clone(),
            self.env.builtins.iterations.clone(),
            self.env.builtins.iteration_duration.clone(),
        );
        let handle = tokio::spawn(task.in_current_span());

        trace!("Spawned VU {id}");
        self.active.push(Vu { id, stop, handle });
    }
}

impl<S: Script> Drop for VuPool<S> {
    fn drop(&mut self) {
        for vu in &self.active {
            vu.handle.abort();
        }
        for r in &self.retiring {
            r.vu.handle.abort();
        }
    }
}

async fn vu_loop<S: Script>(
    script: Arc<S>,
    data: Arc<S::Data>,
    mut ctx: VuContext,
    stop: Arc<AtomicBool>,
    iterations: Counter,
    iteration_duration: Trend,
) {
    while !stop.load(Ordering::Relaxed) {
        let start = std::time::Instant::now();
        script.run_iteration(&mut ctx, &data).await;
        iteration_duration.add_duration(start.elapsed());
        iterations.increment(1);
        ctx.finish_iteration();

        // NOTE: An iteration that never awaits would otherwise starve the scheduler.
        tokio::task::yield_now().await;
    }
    trace!("VU {} stopped after {} iterations", ctx.id(), ctx.iteration());
}
