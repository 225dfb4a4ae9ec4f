use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Lesson {
    pub id: String,
    /// Globally unique even though lessons are reconciled per course.
    pub external_id: String,
    pub course_id: String,
    pub title: String,
    pub description: Option<String>,
    pub content: Option<String>,
    pub order_number: i64,
    pub status: String,
    pub sync_status: String,
    pub last_sync_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}
