use axum::Json;
use axum::extract::{Path, Query};
use axum::routing::post;
use axum::{Router, extract::State, http::StatusCode, routing::get};
use serde::{Deserialize, Serialize};

use crate::db::repository;
use crate::error::AppError;
use crate::models::{Course, Lesson, Role, SyncLogEntry};
use crate::state::AppState;
use crate::sync::SyncReport;

#[derive(Deserialize)]
struct LogQueryParams {
    #[serde(default = "default_log_limit")]
    limit: i64,
}

fn default_log_limit() -> i64 {
    50
}

#[derive(Deserialize)]
struct VerifyRoleRequest {
    external_id: Option<String>,
    email: String,
}

#[derive(Serialize)]
struct VerifyRoleResponse {
    role: Role,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/courses", get(list_courses))
        .route("/courses/{id}/lessons", get(list_lessons))
        .route("/sync", post(sync_all))
        .route("/sync/courses", post(sync_courses))
        .route("/sync/users", post(sync_users))
        .route("/sync/log", get(sync_log))
        .route("/users/verify-role", post(verify_role))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    sqlx::query("select 1").execute(&state.db).await?;
    Ok(StatusCode::OK)
}

async fn list_courses(State(state): State<AppState>) -> Result<Json<Vec<Course>>, AppError> {
    let courses = repository::fetch_active_courses(&state.db).await?;
    Ok(Json(courses))
}

async fn list_lessons(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Lesson>>, AppError> {
    repository::find_course_by_id(&state.db, &id)
        .await?
        .ok_or(AppError::NotFound)?;
    let lessons = repository::fetch_lessons_for_course(&state.db, &id).await?;
    Ok(Json(lessons))
}

async fn sync_all(State(state): State<AppState>) -> Result<Json<SyncReport>, AppError> {
    let report = state.sync.sync_all().await?;
    Ok(Json(report))
}

async fn sync_courses(State(state): State<AppState>) -> Result<Json<SyncReport>, AppError> {
    let report = state.sync.sync_courses().await?;
    Ok(Json(report))
}

async fn sync_users(State(state): State<AppState>) -> Result<Json<SyncReport>, AppError> {
    let report = state.sync.sync_users().await?;
    Ok(Json(report))
}

async fn sync_log(
    State(state): State<AppState>,
    Query(params): Query<LogQueryParams>,
) -> Result<Json<Vec<SyncLogEntry>>, AppError> {
    let entries = repository::recent_sync_log(&state.db, params.limit).await?;
    Ok(Json(entries))
}

async fn verify_role(
    State(state): State<AppState>,
    Json(req): Json<VerifyRoleRequest>,
) -> Result<Json<VerifyRoleResponse>, AppError> {
    if req.email.is_empty() && req.external_id.is_none() {
        return Err(AppError::BadRequest(
            "either external_id or email is required".to_string(),
        ));
    }
    let role = state
        .sync
        .verify_role(req.external_id.as_deref(), &req.email)
        .await?;
    Ok(Json(VerifyRoleResponse { role }))
}
