//! Reconciliation log storage.
//!
//! Entries are append-only rows in `reconciliation_entry`.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use time::OffsetDateTime;
use uuid::Uuid;

use idgate_auth::storage::{
    InconsistencyKind, ReconciliationEntry, ReconciliationLog, StorageError, StorageResult,
};

use crate::{PgPool, map_db_error};

type EntryTuple = (
    Uuid,
    String,
    String,
    Option<Uuid>,
    String,
    String,
    bool,
    OffsetDateTime,
);

fn entry_from_tuple(row: EntryTuple) -> StorageResult<ReconciliationEntry> {
    let kind: InconsistencyKind = row.1.parse().map_err(StorageError::backend)?;
    Ok(ReconciliationEntry {
        id: row.0,
        kind,
        external_id: row.2,
        internal_id: row.3,
        username: row.4,
        detail: row.5,
        compensated: row.6,
        recorded_at: row.7,
    })
}

/// PostgreSQL implementation of [`ReconciliationLog`].
#[derive(Debug, Clone)]
pub struct PgReconciliationLog {
    pool: Arc<PgPool>,
}

impl PgReconciliationLog {
    /// Create a new reconciliation log.
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReconciliationLog for PgReconciliationLog {
    async fn record(&self, entry: ReconciliationEntry) -> StorageResult<()> {
        query(
            r#"
            INSERT INTO reconciliation_entry
                (id, kind, external_id, internal_id, username, detail, compensated, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(entry.id)
        .bind(entry.kind.as_str())
        .bind(&entry.external_id)
        .bind(entry.internal_id)
        .bind(&entry.username)
        .bind(&entry.detail)
        .bind(entry.compensated)
        .bind(entry.recorded_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_db_error(e, "reconciliation entry"))?;

        Ok(())
    }

    async fn list(&self) -> StorageResult<Vec<ReconciliationEntry>> {
        let rows: Vec<EntryTuple> = query_as(
            r#"
            SELECT id, kind, external_id, internal_id, username, detail, compensated, recorded_at
            FROM reconciliation_entry
            ORDER BY recorded_at
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_db_error(e, "reconciliation list"))?;

        rows.into_iter().map(entry_from_tuple).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_from_tuple() {
        let internal_id = Uuid::new_v4();
        let entry = entry_from_tuple((
            Uuid::new_v4(),
            "dangling_profile".to_string(),
            "ext-1".to_string(),
            Some(internal_id),
            "carol".to_string(),
            "connection reset".to_string(),
            false,
            OffsetDateTime::now_utc(),
        ))
        .unwrap();

        assert_eq!(entry.kind, InconsistencyKind::DanglingProfile);
        assert_eq!(entry.internal_id, Some(internal_id));
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let result = entry_from_tuple((
            Uuid::new_v4(),
            "mystery".to_string(),
            "ext-1".to_string(),
            None,
            "carol".to_string(),
            String::new(),
            false,
            OffsetDateTime::now_utc(),
        ));
        assert!(matches!(result, Err(StorageError::Backend(_))));
    }
}
