//! PostgreSQL storage backend for IdGate
//!
//! Provides persistent storage for:
//!
//! - User profiles (`user_profile` table)
//! - Reconciliation records (`reconciliation_entry` table)
//!
//! Tables are created by [`PostgresGatewayStorage::migrate`].
//!
//! # Example
//!
//! ```ignore
//! use idgate_auth_postgres::PostgresGatewayStorage;
//!
//! let storage = PostgresGatewayStorage::connect("postgres://localhost/idgate", 10).await?;
//! storage.migrate().await?;
//!
//! let profiles = storage.profiles();
//! let alice = profiles.find_by_username("alice").await?;
//! ```

pub mod profile;
pub mod reconciliation;
mod schema;

use std::sync::Arc;

use sqlx_core::pool::{Pool, PoolOptions};
use sqlx_postgres::Postgres;

use idgate_auth::storage::StorageError;

pub use profile::PgProfileStore;
pub use reconciliation::PgReconciliationLog;

/// PostgreSQL connection pool type alias.
pub type PgPool = Pool<Postgres>;

// =============================================================================
// Error Mapping
// =============================================================================

/// Maps a database error to the storage error taxonomy.
///
/// Unique-constraint violations become `Conflict` so the coordinator can tell
/// a duplicate from a backend outage.
pub(crate) fn map_db_error(err: sqlx_core::Error, what: &str) -> StorageError {
    if let sqlx_core::Error::Database(ref db_err) = err
        && db_err.is_unique_violation()
    {
        let constraint = db_err.constraint().unwrap_or("unique");
        return StorageError::conflict(format!("{what} violates {constraint}"));
    }
    tracing::error!(error = %err, "Database operation failed: {what}");
    StorageError::backend(err.to_string())
}

// =============================================================================
// PostgreSQL Gateway Storage
// =============================================================================

/// PostgreSQL storage backend for gateway data.
///
/// Holds the connection pool and hands out Arc-owning stores that can be used
/// as `Arc<dyn ProfileStore>` / `Arc<dyn ReconciliationLog>`.
#[derive(Debug, Clone)]
pub struct PostgresGatewayStorage {
    pool: Arc<PgPool>,
}

impl PostgresGatewayStorage {
    /// Create new storage with an existing connection pool.
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Create new storage by connecting to the database.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StorageError> {
        let pool = PoolOptions::<Postgres>::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_db_error(e, "connect"))?;
        tracing::info!(max_connections, "Connected to PostgreSQL");
        Ok(Self::new(Arc::new(pool)))
    }

    /// Creates the gateway tables if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if a DDL statement fails.
    pub async fn migrate(&self) -> Result<(), StorageError> {
        schema::apply(&self.pool).await
    }

    /// Get a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Profile store backed by this pool.
    #[must_use]
    pub fn profiles(&self) -> PgProfileStore {
        PgProfileStore::new(Arc::clone(&self.pool))
    }

    /// Reconciliation log backed by this pool.
    #[must_use]
    pub fn reconciliation(&self) -> PgReconciliationLog {
        PgReconciliationLog::new(Arc::clone(&self.pool))
    }
}
