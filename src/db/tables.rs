//! Reconciler bindings for the course and lesson tables.

use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::AppError;
use crate::sync::normalize::{NormalizedCourse, NormalizedLesson};
use crate::sync::reconcile::EntityTable;

pub struct CourseTable<'a> {
    pub db: &'a SqlitePool,
}

#[async_trait]
impl EntityTable for CourseTable<'_> {
    type Remote = NormalizedCourse;

    fn entity_type(&self) -> &'static str {
        "course"
    }

    fn external_id(record: &NormalizedCourse) -> &str {
        &record.external_id
    }

    async fn find_local_id(&self, external_id: &str) -> Result<Option<String>, AppError> {
        let id = sqlx::query_scalar::<_, String>("SELECT id FROM courses WHERE external_id = ?")
            .bind(external_id)
            .fetch_optional(self.db)
            .await?;
        Ok(id)
    }

    async fn insert(&self, record: &NormalizedCourse, now: &str) -> Result<String, AppError> {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO courses (id, external_id, title, description, status, sync_status, last_sync_at, created_at, updated_at) \
             VALUES (?, ?, ?, ?, 'active', 'synced', ?, ?, ?)",
        )
        .bind(&id)
        .bind(&record.external_id)
        .bind(&record.title)
        .bind(&record.description)
        .bind(now)
        .bind(now)
        .bind(now)
        .execute(self.db)
        .await?;
        Ok(id)
    }

    async fn update(
        &self,
        local_id: &str,
        record: &NormalizedCourse,
        now: &str,
    ) -> Result<(), AppError> {
        // external_id is immutable; a course that reappears is reactivated.
        sqlx::query(
            "UPDATE courses SET title = ?, description = ?, status = 'active', \
             sync_status = 'synced', last_sync_at = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&record.title)
        .bind(&record.description)
        .bind(now)
        .bind(now)
        .bind(local_id)
        .execute(self.db)
        .await?;
        Ok(())
    }

    async fn list_active_external_ids(&self) -> Result<HashSet<String>, AppError> {
        let ids =
            sqlx::query_scalar::<_, String>("SELECT external_id FROM courses WHERE status = 'active'")
                .fetch_all(self.db)
                .await?;
        Ok(ids.into_iter().collect())
    }

    async fn deactivate(&self, external_ids: &[String], now: &str) -> Result<(), AppError> {
        for external_id in external_ids {
            sqlx::query(
                "UPDATE courses SET status = 'inactive', sync_status = 'deleted', \
                 last_sync_at = ?, updated_at = ? WHERE external_id = ? AND status != 'inactive'",
            )
            .bind(now)
            .bind(now)
            .bind(external_id)
            .execute(self.db)
            .await?;
        }
        Ok(())
    }
}

/// Lessons reconcile within one owning course; the soft-delete pass only
/// sees that course's rows, while the external id lookup stays global so a
/// lesson moved between courses is re-homed rather than duplicated.
pub struct LessonTable<'a> {
    pub db: &'a SqlitePool,
    pub course_id: &'a str,
}

#[async_trait]
impl EntityTable for LessonTable<'_> {
    type Remote = NormalizedLesson;

    fn entity_type(&self) -> &'static str {
        "lesson"
    }

    fn external_id(record: &NormalizedLesson) -> &str {
        &record.external_id
    }

    async fn find_local_id(&self, external_id: &str) -> Result<Option<String>, AppError> {
        let id = sqlx::query_scalar::<_, String>("SELECT id FROM lessons WHERE external_id = ?")
            .bind(external_id)
            .fetch_optional(self.db)
            .await?;
        Ok(id)
    }

    async fn insert(&self, record: &NormalizedLesson, now: &str) -> Result<String, AppError> {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO lessons (id, external_id, course_id, title, description, content, order_number, status, sync_status, last_sync_at, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, 'active', 'synced', ?, ?, ?)",
        )
        .bind(&id)
        .bind(&record.external_id)
        .bind(self.course_id)
        .bind(&record.title)
        .bind(&record.description)
        .bind(&record.content)
        .bind(record.order_number)
        .bind(now)
        .bind(now)
        .bind(now)
        .execute(self.db)
        .await?;
        Ok(id)
    }

    async fn update(
        &self,
        local_id: &str,
        record: &NormalizedLesson,
        now: &str,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE lessons SET course_id = ?, title = ?, description = ?, content = ?, \
             order_number = ?, status = 'active', sync_status = 'synced', last_sync_at = ?, \
             updated_at = ? WHERE id = ?",
        )
        .bind(self.course_id)
        .bind(&record.title)
        .bind(&record.description)
        .bind(&record.content)
        .bind(record.order_number)
        .bind(now)
        .bind(now)
        .bind(local_id)
        .execute(self.db)
        .await?;
        Ok(())
    }

    async fn list_active_external_ids(&self) -> Result<HashSet<String>, AppError> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT external_id FROM lessons WHERE course_id = ? AND status = 'active'",
        )
        .bind(self.course_id)
        .fetch_all(self.db)
        .await?;
        Ok(ids.into_iter().collect())
    }

    async fn deactivate(&self, external_ids: &[String], now: &str) -> Result<(), AppError> {
        for external_id in external_ids {
            sqlx::query(
                "UPDATE lessons SET status = 'inactive', sync_status = 'deleted', \
                 last_sync_at = ?, updated_at = ? \
                 WHERE external_id = ? AND course_id = ? AND status != 'inactive'",
            )
            .bind(now)
            .bind(now)
            .bind(external_id)
            .bind(self.course_id)
            .execute(self.db)
            .await?;
        }
        Ok(())
    }
}
