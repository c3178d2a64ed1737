//! In-memory storage backends for development and tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::profile::{ProfileStore, UserProfile};
use super::reconciliation::{ReconciliationEntry, ReconciliationLog};
use super::{StorageError, StorageResult};

/// Profile store backed by a `HashMap`.
#[derive(Debug, Clone, Default)]
pub struct MemoryProfileStore {
    profiles: Arc<RwLock<HashMap<Uuid, UserProfile>>>,
}

impl MemoryProfileStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored profiles.
    pub async fn len(&self) -> usize {
        self.profiles.read().await.len()
    }

    /// Returns `true` if no profiles are stored.
    pub async fn is_empty(&self) -> bool {
        self.profiles.read().await.is_empty()
    }

    async fn find_by<F>(&self, predicate: F) -> Option<UserProfile>
    where
        F: Fn(&UserProfile) -> bool,
    {
        self.profiles
            .read()
            .await
            .values()
            .find(|profile| predicate(profile))
            .cloned()
    }
}

fn conflict_with(existing: &UserProfile, candidate: &UserProfile) -> Option<&'static str> {
    if existing.id == candidate.id {
        Some("id")
    } else if existing.external_id == candidate.external_id {
        Some("external_id")
    } else if existing.username == candidate.username {
        Some("username")
    } else if existing.email == candidate.email {
        Some("email")
    } else {
        None
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn create(&self, profile: UserProfile) -> StorageResult<UserProfile> {
        let mut profiles = self.profiles.write().await;

        if let Some(field) = profiles
            .values()
            .find_map(|existing| conflict_with(existing, &profile))
        {
            return Err(StorageError::conflict(format!(
                "profile with the same {field} already exists"
            )));
        }

        profiles.insert(profile.id, profile.clone());
        Ok(profile)
    }

    async fn find_by_id(&self, id: Uuid) -> StorageResult<Option<UserProfile>> {
        Ok(self.profiles.read().await.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> StorageResult<Option<UserProfile>> {
        Ok(self.find_by(|p| p.username == username).await)
    }

    async fn find_by_email(&self, email: &str) -> StorageResult<Option<UserProfile>> {
        Ok(self.find_by(|p| p.email == email).await)
    }

    async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> StorageResult<Option<UserProfile>> {
        Ok(self.find_by(|p| p.external_id == external_id).await)
    }

    async fn list(&self) -> StorageResult<Vec<UserProfile>> {
        let mut profiles: Vec<_> = self.profiles.read().await.values().cloned().collect();
        profiles.sort_by_key(|p| p.created_at);
        Ok(profiles)
    }

    async fn save(&self, profile: UserProfile) -> StorageResult<UserProfile> {
        let mut profiles = self.profiles.write().await;

        if let Some(field) = profiles
            .values()
            .filter(|existing| existing.id != profile.id)
            .find_map(|existing| conflict_with(existing, &profile))
        {
            return Err(StorageError::conflict(format!(
                "profile with the same {field} already exists"
            )));
        }

        profiles.insert(profile.id, profile.clone());
        Ok(profile)
    }

    async fn remove(&self, profile: &UserProfile) -> StorageResult<()> {
        self.profiles.write().await.remove(&profile.id);
        Ok(())
    }
}

/// Reconciliation log kept in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryReconciliationLog {
    entries: Arc<RwLock<Vec<ReconciliationEntry>>>,
}

impl MemoryReconciliationLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReconciliationLog for MemoryReconciliationLog {
    async fn record(&self, entry: ReconciliationEntry) -> StorageResult<()> {
        self.entries.write().await.push(entry);
        Ok(())
    }

    async fn list(&self) -> StorageResult<Vec<ReconciliationEntry>> {
        Ok(self.entries.read().await.clone())
    }
}
