use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Course {
    pub id: String,
    /// Stable key assigned by the LMS. Immutable once set.
    pub external_id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub sync_status: String,
    pub last_sync_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}
