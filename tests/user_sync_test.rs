mod common;

use std::sync::Arc;

use serde_json::{Value, json};
use sqlx::SqlitePool;

use common::{MockLms, setup_test_db};
use edusync::models::Role;
use edusync::sync::{SyncOptions, SyncService};

fn course(id: &str, title: &str) -> Value {
    json!({"id": id, "title": title})
}

fn roster_row(user_id: &str, email: &str, progress: f64) -> Value {
    json!({"user_id": user_id, "email": email, "name": user_id, "progress": progress})
}

async fn seeded_service(
    pool: &SqlitePool,
    lms: &Arc<MockLms>,
    options: SyncOptions,
) -> SyncService {
    lms.respond("/api/v1/courses", json!([course("C-1", "Biology")]));
    lms.respond(
        "/api/v1/courses/C-1/lessons",
        json!([json!({"id": "L-1", "title": "Cells"})]),
    );
    let svc = SyncService::new(pool.clone(), lms.clone(), options);
    svc.sync_courses().await.unwrap();
    svc
}

#[tokio::test]
async fn roster_sync_upserts_students_and_enrollments() {
    let pool = setup_test_db().await;
    let lms = Arc::new(MockLms::new());
    let svc = seeded_service(&pool, &lms, SyncOptions::default()).await;

    // The first two roster shapes are gone from this LMS version; only the
    // POST search endpoint answers, with a duplicated row.
    lms.respond(
        "/api/v1/courses/C-1/students/search",
        json!({"students": [
            roster_row("U-1", "ada@example.edu", 40.0),
            roster_row("U-1", "ada@example.edu", 40.0),
            roster_row("U-2", "grace@example.edu", 10.0),
        ]}),
    );

    let report = svc.sync_users().await.unwrap();
    assert!(report.success);
    assert_eq!(report.students.created, 2);
    assert_eq!(report.students.errors, 0);
    assert_eq!(report.enrollments.created, 2);

    let user_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(user_count, 2);

    // No role endpoint answered for either student, so both default.
    let roles: Vec<String> = sqlx::query_scalar("SELECT role FROM users ORDER BY email")
        .fetch_all(&pool)
        .await
        .unwrap();
    assert_eq!(roles, vec!["student", "student"]);

    // Second run updates in place; the (course, student) pair stays unique.
    let second = svc.sync_users().await.unwrap();
    assert_eq!(second.students.created, 0);
    assert_eq!(second.students.updated, 2);
    assert_eq!(second.enrollments.created, 0);
    assert_eq!(second.enrollments.updated, 2);

    let enrollment_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM enrollments")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(enrollment_count, 2);
}

#[tokio::test]
async fn new_student_with_instructor_courses_becomes_teacher() {
    let pool = setup_test_db().await;
    let lms = Arc::new(MockLms::new());
    let svc = seeded_service(&pool, &lms, SyncOptions::default()).await;

    lms.respond(
        "/api/v1/courses/C-1/students",
        json!([roster_row("U-7", "mentor@example.edu", 0.0)]),
    );
    lms.respond(
        "/api/v1/courses?instructor_id=U-7",
        json!({"courses": [course("C-1", "Biology")]}),
    );

    svc.sync_users().await.unwrap();

    let role: String = sqlx::query_scalar("SELECT role FROM users WHERE external_id = 'U-7'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(role, "teacher");
}

#[tokio::test]
async fn enrollment_soft_delete_is_off_by_default() {
    let pool = setup_test_db().await;
    let lms = Arc::new(MockLms::new());
    let svc = seeded_service(&pool, &lms, SyncOptions::default()).await;

    lms.respond(
        "/api/v1/courses/C-1/students",
        json!([
            roster_row("U-1", "ada@example.edu", 40.0),
            roster_row("U-2", "grace@example.edu", 10.0),
        ]),
    );
    svc.sync_users().await.unwrap();

    lms.respond(
        "/api/v1/courses/C-1/students",
        json!([roster_row("U-1", "ada@example.edu", 55.0)]),
    );
    svc.sync_users().await.unwrap();

    // U-2 dropped off the roster but the enrollment row stays active.
    let statuses: Vec<String> =
        sqlx::query_scalar("SELECT status FROM enrollments ORDER BY created_at")
            .fetch_all(&pool)
            .await
            .unwrap();
    assert_eq!(statuses, vec!["active", "active"]);
}

#[tokio::test]
async fn enrollment_soft_delete_deactivates_absent_students_when_enabled() {
    let pool = setup_test_db().await;
    let lms = Arc::new(MockLms::new());
    let svc = seeded_service(
        &pool,
        &lms,
        SyncOptions {
            enrollment_soft_delete: true,
        },
    )
    .await;

    lms.respond(
        "/api/v1/courses/C-1/students",
        json!([
            roster_row("U-1", "ada@example.edu", 40.0),
            roster_row("U-2", "grace@example.edu", 10.0),
        ]),
    );
    svc.sync_users().await.unwrap();

    lms.respond(
        "/api/v1/courses/C-1/students",
        json!([roster_row("U-1", "ada@example.edu", 55.0)]),
    );
    svc.sync_users().await.unwrap();

    let (status, sync_status): (String, String) = sqlx::query_as(
        "SELECT e.status, e.sync_status FROM enrollments e \
         JOIN users u ON e.student_id = u.id WHERE u.external_id = 'U-2'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!((status.as_str(), sync_status.as_str()), ("inactive", "deleted"));

    // The user record itself is untouched.
    let user_status: String =
        sqlx::query_scalar("SELECT status FROM users WHERE external_id = 'U-2'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(user_status, "active");
}

#[tokio::test]
async fn verify_role_defaults_to_student_when_probes_come_up_empty() {
    let pool = setup_test_db().await;
    let lms = Arc::new(MockLms::new());
    lms.respond("/api/v1/courses?instructor_id=U-9", json!([]));

    let svc = SyncService::new(pool.clone(), lms.clone(), SyncOptions::default());
    let role = svc
        .verify_role(Some("U-9"), "newcomer@example.edu")
        .await
        .unwrap();
    assert_eq!(role, Role::Student);

    let stored: String = sqlx::query_scalar("SELECT role FROM users WHERE external_id = 'U-9'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(stored, "student");
}

#[tokio::test]
async fn verify_role_detects_teacher_from_profile_endpoint() {
    let pool = setup_test_db().await;
    let lms = Arc::new(MockLms::new());
    lms.respond(
        "/api/v1/users/U-7/profile",
        json!({"data": {"id": "U-7", "role": "Instructor"}}),
    );

    let svc = SyncService::new(pool.clone(), lms.clone(), SyncOptions::default());
    let role = svc.verify_role(Some("U-7"), "mentor@example.edu").await.unwrap();
    assert_eq!(role, Role::Teacher);
}

#[tokio::test]
async fn verify_role_never_downgrades_superadmin() {
    let pool = setup_test_db().await;
    sqlx::query(
        "INSERT INTO users (id, email, role, status, sync_status, created_at, updated_at) \
         VALUES ('admin-1', 'root@example.edu', 'superadmin', 'active', 'synced', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')",
    )
    .execute(&pool)
    .await
    .unwrap();

    let lms = Arc::new(MockLms::new());
    let svc = SyncService::new(pool.clone(), lms.clone(), SyncOptions::default());
    let role = svc.verify_role(None, "root@example.edu").await.unwrap();
    assert_eq!(role, Role::Student);

    let stored: String = sqlx::query_scalar("SELECT role FROM users WHERE id = 'admin-1'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(stored, "superadmin");
}

#[tokio::test]
async fn roster_match_by_email_attaches_external_id() {
    let pool = setup_test_db().await;
    let lms = Arc::new(MockLms::new());
    let svc = seeded_service(&pool, &lms, SyncOptions::default()).await;

    // User known only by email, created during role verification.
    svc.verify_role(None, "ada@example.edu").await.unwrap();

    lms.respond(
        "/api/v1/courses/C-1/students",
        json!([roster_row("U-1", "ada@example.edu", 40.0)]),
    );
    let report = svc.sync_users().await.unwrap();
    assert_eq!(report.students.created, 0);
    assert_eq!(report.students.updated, 1);

    let (external_id, count): (Option<String>, i64) = {
        let external_id =
            sqlx::query_scalar("SELECT external_id FROM users WHERE email = 'ada@example.edu'")
                .fetch_one(&pool)
                .await
                .unwrap();
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&pool)
            .await
            .unwrap();
        (external_id, count)
    };
    assert_eq!(external_id.as_deref(), Some("U-1"));
    assert_eq!(count, 1);
}
