mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use common::{MockLms, setup_test_db};
use edusync::api::router;
use edusync::state::AppState;
use edusync::sync::{SyncOptions, SyncService};

async fn app_with_mock() -> (axum::Router, Arc<MockLms>) {
    let pool = setup_test_db().await;
    let lms = Arc::new(MockLms::new());
    let sync = Arc::new(SyncService::new(
        pool.clone(),
        lms.clone(),
        SyncOptions::default(),
    ));
    let state = AppState { db: pool, sync };
    (router(state), lms)
}

#[tokio::test]
async fn health_endpoint_answers_ok() {
    let (app, _lms) = app_with_mock().await;
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn sync_route_reports_failure_with_http_200() {
    // Run-level sync failure is part of the summary contract, not an HTTP
    // error.
    let (app, _lms) = app_with_mock().await;
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/sync/courses")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn courses_listing_is_empty_before_any_sync() {
    let (app, _lms) = app_with_mock().await;
    let response = app
        .oneshot(Request::builder().uri("/courses").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn lessons_of_unknown_course_is_404() {
    let (app, _lms) = app_with_mock().await;
    let response = app
        .oneshot(
            Request::builder()
                .uri("/courses/nope/lessons")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn verify_role_route_accepts_email_only() {
    let (app, lms) = app_with_mock().await;
    lms.respond(
        "/api/v1/users/role?email=ada@example.edu",
        json!({"role": "teacher"}),
    );

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/users/verify-role")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"email":"ada@example.edu"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
