//! Local user profile storage.
//!
//! A [`UserProfile`] mirrors a subset of the identity provider's attributes
//! plus gateway-owned fields (roles, active flag). It only exists once the
//! external identity it points at has been created.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::StorageResult;

/// Profile attributes supplied by a caller when creating a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileFields {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

impl ProfileFields {
    /// Creates profile fields without names.
    #[must_use]
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            first_name: None,
            last_name: None,
        }
    }

    /// Sets the given and family names.
    #[must_use]
    pub fn with_names(mut self, first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        self.first_name = Some(first_name.into());
        self.last_name = Some(last_name.into());
        self
    }
}

/// Durable local mirror of a federated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Internal identifier, generated locally and never changed.
    pub id: Uuid,

    /// Identifier of the identity at the provider.
    pub external_id: String,

    pub email: String,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,

    /// Role names, compared case-sensitively.
    pub roles: BTreeSet<String>,

    #[serde(rename = "isActive")]
    pub active: bool,

    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl UserProfile {
    /// Creates an active profile linked to `external_id`.
    #[must_use]
    pub fn new<I, R>(external_id: impl Into<String>, fields: &ProfileFields, roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        let now = OffsetDateTime::now_utc();
        Self {
            id: Uuid::new_v4(),
            external_id: external_id.into(),
            email: fields.email.clone(),
            username: fields.username.clone(),
            first_name: fields.first_name.clone(),
            last_name: fields.last_name.clone(),
            roles: roles.into_iter().map(Into::into).collect(),
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns `true` if the profile carries `role`.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// Marks the profile as modified now.
    pub fn touch(&mut self) {
        self.updated_at = OffsetDateTime::now_utc();
    }

    /// Summary returned alongside login tokens.
    #[must_use]
    pub fn summary(&self) -> ProfileSummary {
        ProfileSummary {
            id: self.id,
            external_id: self.external_id.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            roles: self.roles.clone(),
        }
    }
}

/// Public view of a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSummary {
    pub id: Uuid,
    pub external_id: String,
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub roles: BTreeSet<String>,
}

/// Profile persistence.
///
/// Implementations must reject a `create` whose `external_id`, `username`
/// or `email` collides with an existing profile.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Inserts a new profile.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` on a uniqueness violation.
    async fn create(&self, profile: UserProfile) -> StorageResult<UserProfile>;

    /// Finds a profile by internal id.
    async fn find_by_id(&self, id: Uuid) -> StorageResult<Option<UserProfile>>;

    /// Finds a profile by username.
    async fn find_by_username(&self, username: &str) -> StorageResult<Option<UserProfile>>;

    /// Finds a profile by email.
    async fn find_by_email(&self, email: &str) -> StorageResult<Option<UserProfile>>;

    /// Finds a profile by provider identity id.
    async fn find_by_external_id(&self, external_id: &str)
    -> StorageResult<Option<UserProfile>>;

    /// Lists all profiles ordered by creation time.
    async fn list(&self) -> StorageResult<Vec<UserProfile>>;

    /// Inserts the profile, or replaces the stored one with the same id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if another profile already holds the
    /// same external id, username or email.
    async fn save(&self, profile: UserProfile) -> StorageResult<UserProfile>;

    /// Deletes a profile.
    async fn remove(&self, profile: &UserProfile) -> StorageResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_profile() {
        let fields = ProfileFields::new("alice", "a@x.com").with_names("Alice", "Liddell");
        let profile = UserProfile::new("ext-1", &fields, ["user"]);

        assert_eq!(profile.external_id, "ext-1");
        assert_eq!(profile.username, "alice");
        assert!(profile.active);
        assert!(profile.has_role("user"));
        assert!(!profile.has_role("User"));
        assert_eq!(profile.created_at, profile.updated_at);
    }

    #[test]
    fn test_profile_serialization() {
        let fields = ProfileFields::new("alice", "a@x.com");
        let profile = UserProfile::new("ext-1", &fields, ["admin", "user"]);
        let value = serde_json::to_value(&profile).unwrap();

        assert_eq!(value["externalId"], "ext-1");
        assert_eq!(value["isActive"], true);
        assert_eq!(value["roles"], serde_json::json!(["admin", "user"]));
        assert!(value["createdAt"].as_str().unwrap().contains('T'));

        let back: UserProfile = serde_json::from_value(value).unwrap();
        assert_eq!(back, profile);
    }

    #[test]
    fn test_summary_matches_profile() {
        let fields = ProfileFields::new("bob", "b@x.com");
        let profile = UserProfile::new("ext-2", &fields, ["user"]);
        let summary = profile.summary();
        assert_eq!(summary.id, profile.id);
        assert_eq!(summary.username, "bob");
        assert_eq!(summary.external_id, "ext-2");
    }
}
