//! User profile storage.
//!
//! Profiles live in the `user_profile` table. `external_id`, `username` and
//! `email` carry unique constraints; violations surface as
//! `StorageError::Conflict`. Roles are stored as a JSONB string array.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use time::OffsetDateTime;
use uuid::Uuid;

use idgate_auth::storage::{ProfileStore, StorageError, StorageResult, UserProfile};

use crate::{PgPool, map_db_error};

// =============================================================================
// Types
// =============================================================================

type ProfileTuple = (
    Uuid,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    serde_json::Value,
    bool,
    OffsetDateTime,
    OffsetDateTime,
);

const COLUMNS: &str = "id, external_id, username, email, first_name, last_name, roles, \
                       is_active, created_at, updated_at";

/// Profile record from database.
#[derive(Debug, Clone)]
pub struct ProfileRow {
    pub id: Uuid,
    pub external_id: String,
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub roles: serde_json::Value,
    pub is_active: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl ProfileRow {
    /// Create from database tuple.
    fn from_tuple(row: ProfileTuple) -> Self {
        Self {
            id: row.0,
            external_id: row.1,
            username: row.2,
            email: row.3,
            first_name: row.4,
            last_name: row.5,
            roles: row.6,
            is_active: row.7,
            created_at: row.8,
            updated_at: row.9,
        }
    }

    /// Convert to the domain profile.
    ///
    /// # Errors
    ///
    /// Returns `Backend` if the stored roles are not a string array.
    pub fn into_profile(self) -> StorageResult<UserProfile> {
        let roles: BTreeSet<String> = serde_json::from_value(self.roles).map_err(|e| {
            StorageError::backend(format!("Invalid roles for profile {}: {e}", self.id))
        })?;

        Ok(UserProfile {
            id: self.id,
            external_id: self.external_id,
            email: self.email,
            username: self.username,
            first_name: self.first_name,
            last_name: self.last_name,
            roles,
            active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn roles_json(profile: &UserProfile) -> serde_json::Value {
    serde_json::Value::Array(
        profile
            .roles
            .iter()
            .cloned()
            .map(serde_json::Value::String)
            .collect(),
    )
}

/// Insert-or-update keyed on `id`. Unique constraints on the other columns
/// still apply to both branches.
fn upsert_sql() -> String {
    format!(
        r#"
        INSERT INTO user_profile ({COLUMNS})
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (id) DO UPDATE
        SET external_id = EXCLUDED.external_id,
            username = EXCLUDED.username,
            email = EXCLUDED.email,
            first_name = EXCLUDED.first_name,
            last_name = EXCLUDED.last_name,
            roles = EXCLUDED.roles,
            is_active = EXCLUDED.is_active,
            updated_at = EXCLUDED.updated_at
        RETURNING {COLUMNS}
        "#
    )
}

// =============================================================================
// Profile Store
// =============================================================================

/// PostgreSQL implementation of [`ProfileStore`].
#[derive(Debug, Clone)]
pub struct PgProfileStore {
    pool: Arc<PgPool>,
}

impl PgProfileStore {
    /// Create a new profile store.
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    async fn find_by_column(
        &self,
        column: &'static str,
        value: &str,
    ) -> StorageResult<Option<UserProfile>> {
        let sql = format!("SELECT {COLUMNS} FROM user_profile WHERE {column} = $1");
        let row: Option<ProfileTuple> = query_as(&sql)
            .bind(value)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_db_error(e, "profile lookup"))?;

        row.map(|r| ProfileRow::from_tuple(r).into_profile())
            .transpose()
    }
}

#[async_trait]
impl ProfileStore for PgProfileStore {
    async fn create(&self, profile: UserProfile) -> StorageResult<UserProfile> {
        let sql = format!(
            r#"
            INSERT INTO user_profile ({COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {COLUMNS}
            "#
        );
        let row: ProfileTuple = query_as(&sql)
            .bind(profile.id)
            .bind(&profile.external_id)
            .bind(&profile.username)
            .bind(&profile.email)
            .bind(&profile.first_name)
            .bind(&profile.last_name)
            .bind(roles_json(&profile))
            .bind(profile.active)
            .bind(profile.created_at)
            .bind(profile.updated_at)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_db_error(e, &format!("profile '{}'", profile.username)))?;

        ProfileRow::from_tuple(row).into_profile()
    }

    async fn find_by_id(&self, id: Uuid) -> StorageResult<Option<UserProfile>> {
        let sql = format!("SELECT {COLUMNS} FROM user_profile WHERE id = $1");
        let row: Option<ProfileTuple> = query_as(&sql)
            .bind(id)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_db_error(e, "profile lookup"))?;

        row.map(|r| ProfileRow::from_tuple(r).into_profile())
            .transpose()
    }

    async fn find_by_username(&self, username: &str) -> StorageResult<Option<UserProfile>> {
        self.find_by_column("username", username).await
    }

    async fn find_by_email(&self, email: &str) -> StorageResult<Option<UserProfile>> {
        self.find_by_column("email", email).await
    }

    async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> StorageResult<Option<UserProfile>> {
        self.find_by_column("external_id", external_id).await
    }

    async fn list(&self) -> StorageResult<Vec<UserProfile>> {
        let sql = format!("SELECT {COLUMNS} FROM user_profile ORDER BY created_at");
        let rows: Vec<ProfileTuple> = query_as(&sql)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_db_error(e, "profile list"))?;

        rows.into_iter()
            .map(|r| ProfileRow::from_tuple(r).into_profile())
            .collect()
    }

    async fn save(&self, profile: UserProfile) -> StorageResult<UserProfile> {
        let row: ProfileTuple = query_as(&upsert_sql())
            .bind(profile.id)
            .bind(&profile.external_id)
            .bind(&profile.username)
            .bind(&profile.email)
            .bind(&profile.first_name)
            .bind(&profile.last_name)
            .bind(roles_json(&profile))
            .bind(profile.active)
            .bind(profile.created_at)
            .bind(profile.updated_at)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_db_error(e, &format!("profile '{}'", profile.username)))?;

        ProfileRow::from_tuple(row).into_profile()
    }

    async fn remove(&self, profile: &UserProfile) -> StorageResult<()> {
        let result = query("DELETE FROM user_profile WHERE id = $1")
            .bind(profile.id)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_db_error(e, "profile delete"))?;

        tracing::debug!(
            user_id = %profile.id,
            rows = result.rows_affected(),
            "Profile removed"
        );
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use idgate_auth::storage::ProfileFields;

    fn tuple(roles: serde_json::Value) -> ProfileTuple {
        let now = OffsetDateTime::now_utc();
        (
            Uuid::new_v4(),
            "ext-1".to_string(),
            "alice".to_string(),
            "alice@example.com".to_string(),
            Some("Alice".to_string()),
            None,
            roles,
            true,
            now,
            now,
        )
    }

    #[test]
    fn test_row_into_profile() {
        let profile = ProfileRow::from_tuple(tuple(serde_json::json!(["user", "admin"])))
            .into_profile()
            .unwrap();

        assert_eq!(profile.username, "alice");
        assert_eq!(profile.first_name.as_deref(), Some("Alice"));
        assert!(profile.has_role("admin"));
        assert!(profile.active);
    }

    #[test]
    fn test_invalid_roles_is_backend_error() {
        let err = ProfileRow::from_tuple(tuple(serde_json::json!({ "user": true })))
            .into_profile()
            .unwrap_err();
        assert!(matches!(err, StorageError::Backend(_)));
    }

    #[test]
    fn test_save_is_upsert_on_id() {
        let sql = upsert_sql();
        assert!(sql.contains("INSERT INTO user_profile"));
        assert!(sql.contains("ON CONFLICT (id) DO UPDATE"));
        assert!(!sql.contains("created_at = EXCLUDED"));
        assert!(sql.trim_end().ends_with(&format!("RETURNING {COLUMNS}")));
    }

    #[test]
    fn test_roles_json_is_sorted_array() {
        let fields = ProfileFields::new("alice", "alice@example.com");
        let profile = UserProfile::new("ext-1", &fields, ["user", "admin"]);
        assert_eq!(roles_json(&profile), serde_json::json!(["admin", "user"]));
    }
}
