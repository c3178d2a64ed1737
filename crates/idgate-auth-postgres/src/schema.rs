//! Table definitions.

use sqlx_core::query::query;

use idgate_auth::storage::StorageError;

use crate::{PgPool, map_db_error};

const STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS user_profile (
        id UUID PRIMARY KEY,
        external_id TEXT NOT NULL UNIQUE,
        username TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL UNIQUE,
        first_name TEXT,
        last_name TEXT,
        roles JSONB NOT NULL DEFAULT '[]'::jsonb,
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS reconciliation_entry (
        id UUID PRIMARY KEY,
        kind TEXT NOT NULL,
        external_id TEXT NOT NULL,
        internal_id UUID,
        username TEXT NOT NULL,
        detail TEXT NOT NULL,
        compensated BOOLEAN NOT NULL DEFAULT FALSE,
        recorded_at TIMESTAMPTZ NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS reconciliation_entry_recorded_at_idx ON reconciliation_entry (recorded_at)",
];

pub(crate) async fn apply(pool: &PgPool) -> Result<(), StorageError> {
    for &statement in STATEMENTS {
        query(statement)
            .execute(pool)
            .await
            .map_err(|e| map_db_error(e, "schema migration"))?;
    }
    tracing::info!("Gateway schema is up to date");
    Ok(())
}
