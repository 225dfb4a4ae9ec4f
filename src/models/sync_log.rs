use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Append-only audit record of one entity-level sync outcome. Never mutated
/// or deleted by the engine.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SyncLogEntry {
    pub id: i64,
    pub entity_type: String,
    pub entity_id: String,
    pub action: String,
    pub status: String,
    pub details: Option<String>,
    pub created_at: String,
}
