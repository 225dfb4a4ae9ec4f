use std::collections::HashSet;

use async_trait::async_trait;
use tracing::info;

use crate::error::AppError;

/// One entity table in the local store, with any parent scope (e.g. the
/// owning course for lessons) already bound into the handle.
#[async_trait]
pub trait EntityTable: Send + Sync {
    type Remote: Send + Sync;

    fn entity_type(&self) -> &'static str;
    fn external_id(record: &Self::Remote) -> &str;

    async fn find_local_id(&self, external_id: &str) -> Result<Option<String>, AppError>;
    async fn insert(&self, record: &Self::Remote, now: &str) -> Result<String, AppError>;
    async fn update(&self, local_id: &str, record: &Self::Remote, now: &str)
    -> Result<(), AppError>;
    async fn list_active_external_ids(&self) -> Result<HashSet<String>, AppError>;
    async fn deactivate(&self, external_ids: &[String], now: &str) -> Result<(), AppError>;
}

#[derive(Debug, Default)]
pub struct ReconcileOutcome {
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub deactivated: Vec<String>,
    pub errors: Vec<String>,
}

async fn upsert_one<T: EntityTable>(
    table: &T,
    record: &T::Remote,
    now: &str,
) -> Result<bool, AppError> {
    let external_id = T::external_id(record);
    match table.find_local_id(external_id).await? {
        Some(local_id) => {
            table.update(&local_id, record, now).await?;
            Ok(false)
        }
        None => {
            table.insert(record, now).await?;
            Ok(true)
        }
    }
}

/// Upsert every fetched record, then deactivate whatever the feed no longer
/// mentions. Never issues a hard delete, and re-running with the same feed
/// is a no-op beyond refreshed `last_sync_at` stamps. A store failure on one
/// record is recorded and the rest of the batch proceeds.
pub async fn reconcile<T: EntityTable>(
    table: &T,
    records: &[T::Remote],
    now: &str,
) -> Result<ReconcileOutcome, AppError> {
    let mut outcome = ReconcileOutcome::default();

    // Every fetched external id counts as seen, including records whose
    // write fails below; presence in the feed is what exempts a row from
    // the soft-delete pass.
    let seen: HashSet<String> = records
        .iter()
        .map(|record| T::external_id(record).to_string())
        .collect();

    for record in records {
        let external_id = T::external_id(record);
        match upsert_one(table, record, now).await {
            Ok(true) => outcome.created.push(external_id.to_string()),
            Ok(false) => outcome.updated.push(external_id.to_string()),
            Err(err) => outcome.errors.push(format!(
                "{} {}: {}",
                table.entity_type(),
                external_id,
                err
            )),
        }
    }

    let active = table.list_active_external_ids().await?;
    let stale: Vec<String> = active.difference(&seen).cloned().collect();
    if !stale.is_empty() {
        table.deactivate(&stale, now).await?;
        outcome.deactivated = stale;
    }

    info!(
        entity = table.entity_type(),
        created = outcome.created.len(),
        updated = outcome.updated.len(),
        deactivated = outcome.deactivated.len(),
        errors = outcome.errors.len(),
        "reconciliation complete"
    );

    Ok(outcome)
}
