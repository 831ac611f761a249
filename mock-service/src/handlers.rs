use crate::{Member, MockService, PullRequest, Route};
use axum::{
    debug_handler,
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, trace};

const MAX_REVIEWERS: usize = 2;

#[derive(Debug, Error)]
pub(crate) enum ApiError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("team_name already exists")]
    TeamExists,

    #[error("author not found")]
    AuthorNotFound,

    #[error("PR id already exists")]
    PullRequestExists,

    #[error("injected failure")]
    Injected(StatusCode),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_) | ApiError::TeamExists => StatusCode::BAD_REQUEST,
            ApiError::AuthorNotFound => StatusCode::NOT_FOUND,
            ApiError::PullRequestExists => StatusCode::CONFLICT,
            ApiError::Injected(status) => *status,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidRequest(_) => "INVALID_REQUEST",
            ApiError::TeamExists => "TEAM_EXISTS",
            ApiError::AuthorNotFound => "NOT_FOUND",
            ApiError::PullRequestExists => "PR_EXISTS",
            ApiError::Injected(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": { "code": self.code(), "message": self.to_string() }
        });
        (self.status(), Json(body)).into_response()
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub(crate) struct TeamMember {
    user_id: String,
    username: String,
    is_active: bool,
}

#[derive(Debug, Deserialize, Serialize)]
pub(crate) struct Team {
    team_name: String,
    members: Vec<TeamMember>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreatePullRequest {
    pull_request_id: String,
    pull_request_name: String,
    author_id: String,
}

#[debug_handler]
pub(crate) async fn add_team(
    State(mock): State<MockService>,
    body: Result<Json<Team>, JsonRejection>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    mock.hit(Route::TeamAdd);
    let Json(team) = body?;

    if mock.current_faults().rejected_teams.contains(&team.team_name) {
        debug!("Rejecting {} by request", team.team_name);
        return Err(ApiError::Injected(StatusCode::INTERNAL_SERVER_ERROR));
    }

    {
        let mut store = mock.store();
        if store.teams.contains_key(&team.team_name) {
            return Err(ApiError::TeamExists);
        }

        let ids = team.members.iter().map(|m| m.user_id.clone()).collect();
        store.teams.insert(team.team_name.clone(), ids);
        for member in &team.members {
            store.users.insert(
                member.user_id.clone(),
                Member {
                    user_id: member.user_id.clone(),
                    username: member.username.clone(),
                    team_name: team.team_name.clone(),
                    is_active: member.is_active,
                },
            );
        }
    }

    trace!("Created {}", team.team_name);
    Ok((StatusCode::CREATED, Json(json!({ "team": team }))))
}

#[debug_handler]
pub(crate) async fn create_pull_request(
    State(mock): State<MockService>,
    body: Result<Json<CreatePullRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    mock.hit(Route::PullRequestCreate);
    let Json(req) = body?;

    let faults = mock.current_faults();
    if !faults.pull_request_delay.is_zero() {
        tokio::time::sleep(faults.pull_request_delay).await;
    }
    if let Some(status) = faults.pull_request_status {
        return Err(ApiError::Injected(status));
    }

    let pr = {
        let mut store = mock.store();
        if store
            .pull_requests
            .iter()
            .any(|pr| pr.pull_request_id == req.pull_request_id)
        {
            return Err(ApiError::PullRequestExists);
        }

        let author = store
            .users
            .get(&req.author_id)
            .ok_or(ApiError::AuthorNotFound)?;

        let candidates: Vec<&Member> = store
            .users
            .values()
            .filter(|u| u.team_name == author.team_name)
            .filter(|u| u.is_active && u.user_id != author.user_id)
            .collect();
        let reviewers = candidates
            .choose_multiple(&mut rand::thread_rng(), MAX_REVIEWERS)
            .map(|u| u.user_id.clone())
            .collect();

        let pr = PullRequest {
            pull_request_id: req.pull_request_id,
            pull_request_name: req.pull_request_name,
            author_id: req.author_id,
            status: "OPEN",
            assigned_reviewers: reviewers,
        };
        store.pull_requests.push(pr.clone());
        pr
    };

    trace!("Created {} by {}", pr.pull_request_id, pr.author_id);
    Ok((StatusCode::CREATED, Json(json!({ "pr": pr }))))
}

#[debug_handler]
pub(crate) async fn health(State(mock): State<MockService>) -> impl IntoResponse {
    mock.hit(Route::Health);
    if mock.current_faults().unhealthy {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unhealthy" })),
        )
    } else {
        (StatusCode::OK, Json(json!({ "status": "ok" })))
    }
}

#[derive(Debug, Serialize)]
struct UserStat {
    user_id: String,
    username: String,
    assigned_count: usize,
}

#[derive(Debug, Serialize)]
struct PrStat {
    total_prs: usize,
    open_prs: usize,
    merged_prs: usize,
}

#[debug_handler]
pub(crate) async fn stats(State(mock): State<MockService>) -> Json<serde_json::Value> {
    mock.hit(Route::Stats);
    let store = mock.store();

    let mut assigned: BTreeMap<&str, usize> = BTreeMap::new();
    for reviewer in store.pull_requests.iter().flat_map(|pr| &pr.assigned_reviewers) {
        *assigned.entry(reviewer.as_str()).or_default() += 1;
    }

    let user_stats: Vec<UserStat> = store
        .users
        .values()
        .map(|u| UserStat {
            user_id: u.user_id.clone(),
            username: u.username.clone(),
            assigned_count: assigned.get(u.user_id.as_str()).copied().unwrap_or(0),
        })
        .collect();

    let open_prs = store
        .pull_requests
        .iter()
        .filter(|pr| pr.status == "OPEN")
        .count();
    let pr_stats = PrStat {
        total_prs: store.pull_requests.len(),
        open_prs,
        merged_prs: store.pull_requests.len() - open_prs,
    };

    Json(json!({ "user_stats": user_stats, "pr_stats": pr_stats }))
}
