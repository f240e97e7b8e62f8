//! JSON HTTP API.
//!
//! Thin axum layer over [`ReviewService`]: each handler decodes a request,
//! calls exactly one service operation and maps the outcome to a status code.

pub mod server;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::error::AppError;
use crate::models::{AssignmentStats, PullRequest, PullRequestShort, Team, TeamMember, User};
use crate::services::{Reassignment, TeamDeactivation};

pub use server::{serve, AppState};

// ── Error handling ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

#[derive(Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

/// Wrapper to make AppError usable as an axum error response.
pub struct ApiErr(AppError);

impl IntoResponse for ApiErr {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            AppError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::Conflict { kind, .. } => (StatusCode::CONFLICT, kind.code()),
            AppError::InvalidInput { .. } => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
            AppError::Storage { .. } | AppError::Internal { .. } => {
                log::error!("Request failed: {}", self.0);
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        };
        (
            status,
            Json(ErrorEnvelope {
                error: ErrorBody {
                    code: code.to_string(),
                    message: self.0.to_string(),
                },
            }),
        )
            .into_response()
    }
}

impl From<AppError> for ApiErr {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiErr {
    fn from(rejection: JsonRejection) -> Self {
        Self(AppError::invalid_input(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiErr {
    fn from(rejection: QueryRejection) -> Self {
        Self(AppError::invalid_input(rejection.body_text()))
    }
}

// ── Request / response types ─────────────────────────────────────────────────

#[derive(Deserialize)]
struct AddTeamRequest {
    team_name: String,
    #[serde(default)]
    members: Vec<TeamMember>,
}

#[derive(Serialize)]
struct TeamEnvelope {
    team: Team,
}

#[derive(Deserialize)]
struct TeamQuery {
    team_name: String,
}

#[derive(Deserialize)]
struct DeactivateTeamRequest {
    team_name: String,
}

#[derive(Deserialize)]
struct SetIsActiveRequest {
    user_id: String,
    is_active: bool,
}

#[derive(Serialize)]
struct UserEnvelope {
    user: User,
}

#[derive(Deserialize)]
struct UserQuery {
    user_id: String,
}

#[derive(Serialize)]
struct UserReviews {
    user_id: String,
    pull_requests: Vec<PullRequestShort>,
}

#[derive(Deserialize)]
struct CreatePullRequestRequest {
    pull_request_id: String,
    pull_request_name: String,
    author_id: String,
}

#[derive(Deserialize)]
struct MergePullRequestRequest {
    pull_request_id: String,
}

#[derive(Deserialize)]
struct ReassignRequest {
    pull_request_id: String,
    #[serde(alias = "old_reviewer_id")]
    old_user_id: String,
}

#[derive(Serialize)]
struct PullRequestEnvelope {
    pr: PullRequest,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

// ── Route builder ────────────────────────────────────────────────────────────

/// Build the full API router with request tracing.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/team/add", post(add_team))
        .route("/team/get", get(get_team))
        .route("/team/deactivate", post(deactivate_team))
        .route("/users/setIsActive", post(set_is_active))
        .route("/users/getReview", get(get_review))
        .route("/pullRequest/create", post(create_pull_request))
        .route("/pullRequest/merge", post(merge_pull_request))
        .route("/pullRequest/reassign", post(reassign_reviewer))
        .route("/stats/assignments", get(assignment_stats))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// POST /team/add: create a team or upsert its members.
async fn add_team(
    State(state): State<AppState>,
    payload: Result<Json<AddTeamRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TeamEnvelope>), ApiErr> {
    let Json(req) = payload?;
    let team = state.service.add_team(&req.team_name, &req.members).await?;
    Ok((StatusCode::CREATED, Json(TeamEnvelope { team })))
}

/// GET /team/get?team_name=X
async fn get_team(
    State(state): State<AppState>,
    query: Result<Query<TeamQuery>, QueryRejection>,
) -> Result<Json<Team>, ApiErr> {
    let Query(params) = query?;
    Ok(Json(state.service.get_team(&params.team_name).await?))
}

/// POST /team/deactivate: deactivate a team and replace its members on open
/// pull requests.
async fn deactivate_team(
    State(state): State<AppState>,
    payload: Result<Json<DeactivateTeamRequest>, JsonRejection>,
) -> Result<Json<TeamDeactivation>, ApiErr> {
    let Json(req) = payload?;
    Ok(Json(state.service.deactivate_team(&req.team_name).await?))
}

async fn set_is_active(
    State(state): State<AppState>,
    payload: Result<Json<SetIsActiveRequest>, JsonRejection>,
) -> Result<Json<UserEnvelope>, ApiErr> {
    let Json(req) = payload?;
    let user = state.service.set_user_active(&req.user_id, req.is_active).await?;
    Ok(Json(UserEnvelope { user }))
}

/// GET /users/getReview?user_id=X: pull requests the user reviews.
async fn get_review(
    State(state): State<AppState>,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> Result<Json<UserReviews>, ApiErr> {
    let Query(params) = query?;
    let reviews = state.service.reviews_for_user(&params.user_id).await?;
    Ok(Json(UserReviews {
        user_id: params.user_id,
        pull_requests: reviews.into_iter().map(PullRequestShort::from).collect(),
    }))
}

async fn create_pull_request(
    State(state): State<AppState>,
    payload: Result<Json<CreatePullRequestRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PullRequestEnvelope>), ApiErr> {
    let Json(req) = payload?;
    let pr = state
        .service
        .create_pull_request(&req.pull_request_id, &req.pull_request_name, &req.author_id)
        .await?;
    Ok((StatusCode::CREATED, Json(PullRequestEnvelope { pr })))
}

async fn merge_pull_request(
    State(state): State<AppState>,
    payload: Result<Json<MergePullRequestRequest>, JsonRejection>,
) -> Result<Json<PullRequestEnvelope>, ApiErr> {
    let Json(req) = payload?;
    let pr = state.service.merge_pull_request(&req.pull_request_id).await?;
    Ok(Json(PullRequestEnvelope { pr }))
}

async fn reassign_reviewer(
    State(state): State<AppState>,
    payload: Result<Json<ReassignRequest>, JsonRejection>,
) -> Result<Json<Reassignment>, ApiErr> {
    let Json(req) = payload?;
    Ok(Json(
        state
            .service
            .reassign_reviewer(&req.pull_request_id, &req.old_user_id)
            .await?,
    ))
}

/// GET /stats/assignments
async fn assignment_stats(State(state): State<AppState>) -> Result<Json<AssignmentStats>, ApiErr> {
    Ok(Json(state.service.assignment_stats().await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConflictKind;
    use axum::body::to_bytes;

    async fn render(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = ApiErr(err).into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_error_mapping() {
        let cases = vec![
            (AppError::not_found_with_id("User", "u1"), StatusCode::NOT_FOUND, "NOT_FOUND"),
            (
                AppError::conflict(ConflictKind::Exists, "dup"),
                StatusCode::CONFLICT,
                "PR_EXISTS",
            ),
            (
                AppError::conflict(ConflictKind::PrMerged, "merged"),
                StatusCode::CONFLICT,
                "PR_MERGED",
            ),
            (
                AppError::conflict(ConflictKind::NotAssigned, "nope"),
                StatusCode::CONFLICT,
                "NOT_ASSIGNED",
            ),
            (
                AppError::conflict(ConflictKind::NoCandidate, "empty"),
                StatusCode::CONFLICT,
                "NO_CANDIDATE",
            ),
            (
                AppError::conflict(ConflictKind::ConcurrentModification, "race"),
                StatusCode::CONFLICT,
                "CONCURRENT_MODIFICATION",
            ),
            (AppError::invalid_input("bad"), StatusCode::BAD_REQUEST, "INVALID_INPUT"),
            (
                AppError::storage("disk I/O error"),
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
            ),
            (AppError::internal("boom"), StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        ];

        for (err, status, code) in cases {
            let (got_status, body) = render(err).await;
            assert_eq!(got_status, status);
            assert_eq!(body["error"]["code"], code);
            assert!(body["error"]["message"].is_string());
        }
    }
}
