use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Enrollment {
    pub id: String,
    pub course_id: String,
    pub student_id: String,
    pub status: String,
    pub progress_percentage: f64,
    pub last_activity: Option<String>,
    pub sync_status: String,
    pub last_sync_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}
