use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
    Superadmin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
            Role::Superadmin => "superadmin",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    /// Unknown until the user is first seen in an LMS payload; until then the
    /// email acts as the natural key.
    pub external_id: Option<String>,
    /// At most one active user per email; may be absent for roster entries
    /// that only carry a username.
    pub email: Option<String>,
    pub username: Option<String>,
    pub role: String,
    pub status: String,
    pub sync_status: String,
    pub last_sync_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}
