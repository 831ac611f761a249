//! Script lifecycle
use crate::context::VuContext;
use std::future::Future;

/// A load test workload.
///
/// The runner calls [`Script::setup`] once, then [`Script::run_iteration`] repeatedly from
/// every active VU for the length of the ramp profile, then [`Script::teardown`] once. The
/// value returned by setup is shared read-only with every VU and with teardown.
///
/// # Example
/// ```no_run
/// use stampede::prelude::*;
/// use std::time::Duration;
///
/// struct Ping;
///
/// impl Script for Ping {
///     type Data = String;
///
///     async fn setup(&self, _ctx: &mut VuContext) -> String {
///         "http://localhost:8080/health".to_string()
///     }
///
///     async fn run_iteration(&self, ctx: &mut VuContext, url: &String) {
///         let res = ctx.http().get(url).await;
///         ctx.check("status is 200", res.status == 200);
///         ctx.sleep(Duration::from_millis(100)).await;
///     }
/// }
/// ```
pub trait Script: Send + Sync + 'static {
    type Data: Send + Sync + 'static;

    fn setup(&self, ctx: &mut VuContext) -> impl Future<Output = Self::Data> + Send;

    fn run_iteration(
        &self,
        ctx: &mut VuContext,
        data: &Self::Data,
    ) -> impl Future<Output = ()> + Send;

    fn teardown(
        &self,
        _ctx: &mut VuContext,
        _data: &Self::Data,
    ) -> impl Future<Output = ()> + Send {
        async {}
    }
}
