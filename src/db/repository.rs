use sqlx::SqlitePool;
use uuid::Uuid;

use crate::models::{Course, Enrollment, Lesson, Role, SyncLogEntry, User};
use crate::sync::normalize::{NormalizedEnrollment, NormalizedStudent};

pub async fn fetch_active_courses(db: &SqlitePool) -> Result<Vec<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>(
        "SELECT id, external_id, title, description, status, sync_status, last_sync_at, created_at, updated_at \
         FROM courses WHERE status = 'active' ORDER BY title",
    )
    .fetch_all(db)
    .await
}

pub async fn find_course_by_id(db: &SqlitePool, id: &str) -> Result<Option<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>(
        "SELECT id, external_id, title, description, status, sync_status, last_sync_at, created_at, updated_at \
         FROM courses WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(db)
    .await
}

pub async fn find_course_id_by_external_id(
    db: &SqlitePool,
    external_id: &str,
) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>("SELECT id FROM courses WHERE external_id = ?")
        .bind(external_id)
        .fetch_optional(db)
        .await
}

pub async fn fetch_lessons_for_course(
    db: &SqlitePool,
    course_id: &str,
) -> Result<Vec<Lesson>, sqlx::Error> {
    sqlx::query_as::<_, Lesson>(
        "SELECT id, external_id, course_id, title, description, content, order_number, status, sync_status, last_sync_at, created_at, updated_at \
         FROM lessons WHERE course_id = ? AND status = 'active' ORDER BY order_number",
    )
    .bind(course_id)
    .fetch_all(db)
    .await
}

pub async fn find_user_by_external_id(
    db: &SqlitePool,
    external_id: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "SELECT id, external_id, email, username, role, status, sync_status, last_sync_at, created_at, updated_at \
         FROM users WHERE external_id = ?",
    )
    .bind(external_id)
    .fetch_optional(db)
    .await
}

pub async fn find_active_user_by_email(
    db: &SqlitePool,
    email: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "SELECT id, external_id, email, username, role, status, sync_status, last_sync_at, created_at, updated_at \
         FROM users WHERE email = ? AND status = 'active'",
    )
    .bind(email)
    .fetch_optional(db)
    .await
}

pub async fn insert_user(
    db: &SqlitePool,
    student: &NormalizedStudent,
    role: Role,
    now: &str,
) -> Result<String, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO users (id, external_id, email, username, role, status, sync_status, last_sync_at, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, 'active', 'synced', ?, ?, ?)",
    )
    .bind(&id)
    .bind(&student.external_id)
    .bind(&student.email)
    .bind(&student.username)
    .bind(role.as_str())
    .bind(now)
    .bind(now)
    .bind(now)
    .execute(db)
    .await?;
    Ok(id)
}

/// Refresh the mutable user fields from the latest LMS payload. Role is not
/// touched here; it only changes through role verification.
pub async fn update_user_from_remote(
    db: &SqlitePool,
    id: &str,
    student: &NormalizedStudent,
    now: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE users SET email = COALESCE(?, email), username = COALESCE(?, username), \
         status = 'active', sync_status = 'synced', last_sync_at = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&student.email)
    .bind(&student.username)
    .bind(now)
    .bind(now)
    .bind(id)
    .execute(db)
    .await?;
    Ok(())
}

/// Bind an LMS id to a user first created through role verification, where
/// only the email was known. The external id is immutable once set.
pub async fn attach_external_id(
    db: &SqlitePool,
    id: &str,
    external_id: &str,
    now: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE users SET external_id = ?, updated_at = ? WHERE id = ? AND external_id IS NULL",
    )
    .bind(external_id)
    .bind(now)
    .bind(id)
    .execute(db)
    .await?;
    Ok(())
}

/// Persist the outcome of a role probe. Superadmin is assigned out of band
/// and never downgraded by the engine.
pub async fn record_verified_role(
    db: &SqlitePool,
    external_id: Option<&str>,
    email: &str,
    role: Role,
    now: &str,
) -> Result<(), sqlx::Error> {
    let existing = match external_id {
        Some(external_id) => find_user_by_external_id(db, external_id).await?,
        None => None,
    };
    let existing = match existing {
        Some(user) => Some(user),
        None => find_active_user_by_email(db, email).await?,
    };

    match existing {
        Some(user) => {
            sqlx::query(
                "UPDATE users SET role = ?, updated_at = ? WHERE id = ? AND role != 'superadmin'",
            )
            .bind(role.as_str())
            .bind(now)
            .bind(&user.id)
            .execute(db)
            .await?;
        }
        None => {
            let id = Uuid::new_v4().to_string();
            sqlx::query(
                "INSERT INTO users (id, external_id, email, role, status, sync_status, created_at, updated_at) \
                 VALUES (?, ?, ?, ?, 'active', 'synced', ?, ?)",
            )
            .bind(&id)
            .bind(external_id)
            .bind(email)
            .bind(role.as_str())
            .bind(now)
            .bind(now)
            .execute(db)
            .await?;
        }
    }
    Ok(())
}

pub async fn find_enrollment(
    db: &SqlitePool,
    course_id: &str,
    student_id: &str,
) -> Result<Option<Enrollment>, sqlx::Error> {
    sqlx::query_as::<_, Enrollment>(
        "SELECT id, course_id, student_id, status, progress_percentage, last_activity, sync_status, last_sync_at, created_at, updated_at \
         FROM enrollments WHERE course_id = ? AND student_id = ?",
    )
    .bind(course_id)
    .bind(student_id)
    .fetch_optional(db)
    .await
}

pub async fn insert_enrollment(
    db: &SqlitePool,
    course_id: &str,
    student_id: &str,
    enrollment: &NormalizedEnrollment,
    now: &str,
) -> Result<String, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO enrollments (id, course_id, student_id, status, progress_percentage, last_activity, sync_status, last_sync_at, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, 'synced', ?, ?, ?)",
    )
    .bind(&id)
    .bind(course_id)
    .bind(student_id)
    .bind(&enrollment.status)
    .bind(enrollment.progress_percentage)
    .bind(&enrollment.last_activity)
    .bind(now)
    .bind(now)
    .bind(now)
    .execute(db)
    .await?;
    Ok(id)
}

pub async fn update_enrollment(
    db: &SqlitePool,
    id: &str,
    enrollment: &NormalizedEnrollment,
    now: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE enrollments SET status = ?, progress_percentage = ?, last_activity = ?, \
         sync_status = 'synced', last_sync_at = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&enrollment.status)
    .bind(enrollment.progress_percentage)
    .bind(&enrollment.last_activity)
    .bind(now)
    .bind(now)
    .bind(id)
    .execute(db)
    .await?;
    Ok(())
}

/// Deactivate enrollments for a course whose student no longer appears in
/// the roster. Returns the deactivated enrollment ids.
pub async fn deactivate_enrollments_absent(
    db: &SqlitePool,
    course_id: &str,
    keep_student_ids: &[String],
    now: &str,
) -> Result<Vec<String>, sqlx::Error> {
    let active: Vec<(String, String)> = sqlx::query_as(
        "SELECT id, student_id FROM enrollments WHERE course_id = ? AND status = 'active'",
    )
    .bind(course_id)
    .fetch_all(db)
    .await?;

    let mut deactivated = Vec::new();
    for (id, student_id) in active {
        if keep_student_ids.contains(&student_id) {
            continue;
        }
        sqlx::query(
            "UPDATE enrollments SET status = 'inactive', sync_status = 'deleted', \
             last_sync_at = ?, updated_at = ? WHERE id = ?",
        )
        .bind(now)
        .bind(now)
        .bind(&id)
        .execute(db)
        .await?;
        deactivated.push(id);
    }
    Ok(deactivated)
}

pub async fn append_sync_log(
    db: &SqlitePool,
    entity_type: &str,
    entity_id: &str,
    action: &str,
    status: &str,
    details: Option<&str>,
    now: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO sync_log (entity_type, entity_id, action, status, details, created_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(entity_type)
    .bind(entity_id)
    .bind(action)
    .bind(status)
    .bind(details)
    .bind(now)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn recent_sync_log(
    db: &SqlitePool,
    limit: i64,
) -> Result<Vec<SyncLogEntry>, sqlx::Error> {
    sqlx::query_as::<_, SyncLogEntry>(
        "SELECT id, entity_type, entity_id, action, status, details, created_at \
         FROM sync_log ORDER BY id DESC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(db)
    .await
}
