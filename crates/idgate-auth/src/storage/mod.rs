//! Storage traits for gateway-owned data.
//!
//! This module defines storage interfaces for:
//!
//! - Local user profiles mirroring identity provider accounts
//! - Reconciliation records of cross-system divergence
//!
//! # Implementations
//!
//! - [`MemoryProfileStore`] / [`MemoryReconciliationLog`] - in-process
//! - `idgate-auth-postgres` - PostgreSQL storage backend

pub mod memory;
pub mod profile;
pub mod reconciliation;

pub use memory::{MemoryProfileStore, MemoryReconciliationLog};
pub use profile::{ProfileFields, ProfileStore, ProfileSummary, UserProfile};
pub use reconciliation::{InconsistencyKind, ReconciliationEntry, ReconciliationLog};

/// Errors reported by storage backends.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A uniqueness constraint was violated.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The record to update does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The backend failed.
    #[error("Backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// Creates a new `Conflict` error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Creates a new `Backend` error.
    #[must_use]
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }
}

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
