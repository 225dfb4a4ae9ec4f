use std::sync::Arc;

use sqlx::SqlitePool;

use crate::sync::SyncService;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub sync: Arc<SyncService>,
}
