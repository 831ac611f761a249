//! In-memory stand-in for the PR reviewer service.
//!
//! Serves the four endpoints the load test touches with the real service's status codes and
//! error envelope, plus knobs to inject failures and counters to assert on.
mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::debug;

pub use axum::http::StatusCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    TeamAdd,
    PullRequestCreate,
    Health,
    Stats,
}

impl Route {
    pub const ALL: [Route; 4] = [
        Route::TeamAdd,
        Route::PullRequestCreate,
        Route::Health,
        Route::Stats,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            Route::TeamAdd => "/team/add",
            Route::PullRequestCreate => "/pullRequest/create",
            Route::Health => "/health",
            Route::Stats => "/stats",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Member {
    pub user_id: String,
    pub username: String,
    pub team_name: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullRequest {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub author_id: String,
    pub status: &'static str,
    pub assigned_reviewers: Vec<String>,
}

/// Failure injection knobs. Every knob can be changed while the service is running.
#[derive(Debug, Clone, Default)]
struct Faults {
    rejected_teams: HashSet<String>,
    pull_request_status: Option<StatusCode>,
    pull_request_delay: Duration,
    unhealthy: bool,
}

#[derive(Debug, Default)]
struct Store {
    teams: BTreeMap<String, Vec<String>>,
    users: BTreeMap<String, Member>,
    pull_requests: Vec<PullRequest>,
}

#[derive(Debug, Default)]
struct Inner {
    faults: RwLock<Faults>,
    store: Mutex<Store>,
    requests: [AtomicU64; 4],
}

/// Handle to the mock's shared state. Clones observe and control the same service.
#[derive(Debug, Clone, Default)]
pub struct MockService {
    inner: Arc<Inner>,
}

impl MockService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `POST /team/add` for `team_name` with a 500.
    pub fn reject_team(&self, team_name: &str) -> &Self {
        self.faults().rejected_teams.insert(team_name.to_string());
        self
    }

    /// Answer every `POST /pullRequest/create` with `status`.
    pub fn force_pull_request_status(&self, status: StatusCode) -> &Self {
        self.faults().pull_request_status = Some(status);
        self
    }

    /// Delay every `POST /pullRequest/create` before handling it.
    pub fn pull_request_delay(&self, delay: Duration) -> &Self {
        self.faults().pull_request_delay = delay;
        self
    }

    /// Answer `GET /health` with a 503 while set.
    pub fn set_unhealthy(&self, unhealthy: bool) -> &Self {
        self.faults().unhealthy = unhealthy;
        self
    }

    pub fn requests(&self, route: Route) -> u64 {
        self.inner.requests[route.index()].load(Ordering::Relaxed)
    }

    /// Names of every team created so far.
    pub fn teams(&self) -> Vec<String> {
        self.store().teams.keys().cloned().collect()
    }

    pub fn pull_requests(&self) -> Vec<PullRequest> {
        self.store().pull_requests.clone()
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route(Route::TeamAdd.path(), post(handlers::add_team))
            .route(Route::PullRequestCreate.path(), post(handlers::create_pull_request))
            .route(Route::Health.path(), get(handlers::health))
            .route(Route::Stats.path(), get(handlers::stats))
            .with_state(self.clone())
            .layer(TraceLayer::new_for_http())
    }

    /// Serve on `addr` until the task is dropped.
    pub async fn serve(self, addr: SocketAddr) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        debug!("Mock service listening on {}", listener.local_addr()?);
        axum::serve(listener, self.router()).await?;
        Ok(())
    }

    /// Serve on an ephemeral localhost port in the background. Returns the bound address.
    pub async fn spawn(&self) -> anyhow::Result<SocketAddr> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let app = self.router();

        tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, app).await {
                tracing::error!("Mock service stopped: {err}");
            }
        });

        debug!("Mock service spawned on {addr}");
        Ok(addr)
    }

    fn hit(&self, route: Route) {
        self.inner.requests[route.index()].fetch_add(1, Ordering::Relaxed);
        metrics::counter!("mock_service.requests", "route" => route.path()).increment(1);
    }

    fn faults(&self) -> std::sync::RwLockWriteGuard<'_, Faults> {
        self.inner
            .faults
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn current_faults(&self) -> Faults {
        self.inner
            .faults
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn store(&self) -> MutexGuard<'_, Store> {
        self.inner.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
