//! Reconciliation records for divergent identity and profile state.
//!
//! When a user mutation succeeds at the identity provider but fails locally,
//! the two systems disagree. The coordinator records each such divergence
//! here so an operator or background job can repair it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::StorageResult;

/// Kind of divergence between the identity provider and the profile store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InconsistencyKind {
    /// An identity exists at the provider with no local profile.
    OrphanedIdentity,
    /// A local profile points at an identity the provider no longer has.
    DanglingProfile,
}

impl InconsistencyKind {
    /// Stable string form, used as the database value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OrphanedIdentity => "orphaned_identity",
            Self::DanglingProfile => "dangling_profile",
        }
    }
}

impl std::str::FromStr for InconsistencyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "orphaned_identity" => Ok(Self::OrphanedIdentity),
            "dangling_profile" => Ok(Self::DanglingProfile),
            other => Err(format!("unknown inconsistency kind: {other}")),
        }
    }
}

/// A recorded divergence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationEntry {
    pub id: Uuid,
    pub kind: InconsistencyKind,
    pub external_id: String,
    pub internal_id: Option<Uuid>,
    pub username: String,
    pub detail: String,
    /// Whether a compensating action already repaired the divergence.
    pub compensated: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub recorded_at: OffsetDateTime,
}

impl ReconciliationEntry {
    /// Identity created at the provider, local profile write failed.
    #[must_use]
    pub fn orphaned_identity(
        external_id: impl Into<String>,
        username: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self::new(InconsistencyKind::OrphanedIdentity, external_id, None, username, detail)
    }

    /// Identity deleted at the provider, local profile removal failed.
    #[must_use]
    pub fn dangling_profile(
        external_id: impl Into<String>,
        internal_id: Uuid,
        username: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self::new(
            InconsistencyKind::DanglingProfile,
            external_id,
            Some(internal_id),
            username,
            detail,
        )
    }

    fn new(
        kind: InconsistencyKind,
        external_id: impl Into<String>,
        internal_id: Option<Uuid>,
        username: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            external_id: external_id.into(),
            internal_id,
            username: username.into(),
            detail: detail.into(),
            compensated: false,
            recorded_at: OffsetDateTime::now_utc(),
        }
    }

    /// Marks whether compensation succeeded.
    #[must_use]
    pub fn with_compensated(mut self, compensated: bool) -> Self {
        self.compensated = compensated;
        self
    }
}

/// Durable sink for reconciliation records.
#[async_trait]
pub trait ReconciliationLog: Send + Sync {
    /// Appends an entry.
    async fn record(&self, entry: ReconciliationEntry) -> StorageResult<()>;

    /// Lists entries, oldest first.
    async fn list(&self) -> StorageResult<Vec<ReconciliationEntry>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip() {
        for kind in [InconsistencyKind::OrphanedIdentity, InconsistencyKind::DanglingProfile] {
            assert_eq!(kind.as_str().parse::<InconsistencyKind>().unwrap(), kind);
        }
        assert!("other".parse::<InconsistencyKind>().is_err());
    }

    #[test]
    fn test_orphaned_identity_entry() {
        let entry = ReconciliationEntry::orphaned_identity("ext-9", "carol", "db down")
            .with_compensated(true);
        assert_eq!(entry.kind, InconsistencyKind::OrphanedIdentity);
        assert_eq!(entry.internal_id, None);
        assert!(entry.compensated);
    }
}
