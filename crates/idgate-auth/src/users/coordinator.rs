//! User lifecycle across the identity provider and the profile store.
//!
//! Every mutation touches the identity provider first and the profile store
//! second, so the local store is always the last writer. A failure between
//! the two steps leaves the systems diverged; the coordinator reports it as
//! [`GatewayError::InternalInconsistency`] and records a
//! [`ReconciliationEntry`].

use std::collections::BTreeSet;
use std::sync::Arc;

use uuid::Uuid;

use crate::config::UsersConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::idp::{IdentityProvider, IdpError, NewIdentity};
use crate::storage::{
    ProfileFields, ProfileStore, ReconciliationEntry, ReconciliationLog, UserProfile,
};

/// Orchestrates user creation and deletion as a two-step saga.
pub struct UserLifecycleCoordinator {
    idp: Arc<dyn IdentityProvider>,
    profiles: Arc<dyn ProfileStore>,
    reconciliation: Arc<dyn ReconciliationLog>,
    config: UsersConfig,
}

impl UserLifecycleCoordinator {
    /// Creates a coordinator.
    #[must_use]
    pub fn new(
        idp: Arc<dyn IdentityProvider>,
        profiles: Arc<dyn ProfileStore>,
        reconciliation: Arc<dyn ReconciliationLog>,
        config: UsersConfig,
    ) -> Self {
        Self {
            idp,
            profiles,
            reconciliation,
            config,
        }
    }

    /// Self-registration with the configured default roles.
    ///
    /// # Errors
    ///
    /// See [`create_user`](Self::create_user).
    pub async fn register(
        &self,
        fields: ProfileFields,
        password: &str,
    ) -> GatewayResult<UserProfile> {
        self.create_user(fields, password, None).await
    }

    /// Creates the external identity, then the local profile.
    ///
    /// `roles` defaults to the configured default roles when `None`.
    ///
    /// # Errors
    ///
    /// - `IdentityConflict` / `UpstreamUnavailable` / `UpstreamAuthFailure`
    ///   if the identity provider refuses; nothing local is touched
    /// - `InternalInconsistency` if the identity was created but the profile
    ///   write failed
    pub async fn create_user(
        &self,
        fields: ProfileFields,
        password: &str,
        roles: Option<BTreeSet<String>>,
    ) -> GatewayResult<UserProfile> {
        let identity = NewIdentity::new(&fields.username, &fields.email)
            .with_names(fields.first_name.clone(), fields.last_name.clone());

        let external_id = self
            .idp
            .create_identity(&identity, password)
            .await
            .map_err(|err| {
                tracing::warn!(username = %fields.username, error = %err, "Identity creation failed");
                GatewayError::from(err)
            })?;

        let roles = roles.unwrap_or_else(|| self.config.default_roles.iter().cloned().collect());
        let profile = UserProfile::new(external_id.clone(), &fields, roles);

        match self.profiles.create(profile).await {
            Ok(profile) => {
                tracing::info!(
                    user_id = %profile.id,
                    external_id = %profile.external_id,
                    username = %profile.username,
                    "User created"
                );
                Ok(profile)
            }
            Err(err) => {
                tracing::warn!(
                    external_id = %external_id,
                    username = %fields.username,
                    error = %err,
                    "Profile write failed after identity creation"
                );

                let compensated = self.compensate_orphan(&external_id).await;
                let entry = ReconciliationEntry::orphaned_identity(
                    &external_id,
                    &fields.username,
                    err.to_string(),
                )
                .with_compensated(compensated);
                self.record(entry).await;

                Err(GatewayError::internal_inconsistency(format!(
                    "identity '{external_id}' created but profile for '{}' was not stored: {err}",
                    fields.username
                )))
            }
        }
    }

    /// Deletes the external identity, then the local profile.
    ///
    /// An identity that is already gone at the provider counts as deleted.
    ///
    /// # Errors
    ///
    /// - `NotFound` if no profile has this id
    /// - `UpstreamUnavailable` / `UpstreamAuthFailure` if the provider delete fails
    /// - `InternalInconsistency` if the identity was deleted but the profile
    ///   could not be removed
    pub async fn delete_user(&self, id: Uuid) -> GatewayResult<()> {
        let profile = self
            .profiles
            .find_by_id(id)
            .await?
            .ok_or_else(|| GatewayError::not_found(format!("user {id}")))?;

        match self.idp.delete_identity(&profile.external_id).await {
            Ok(()) => {}
            Err(IdpError::NotFound(_)) => {
                tracing::debug!(
                    external_id = %profile.external_id,
                    "Identity already absent at provider"
                );
            }
            Err(err) => {
                tracing::warn!(external_id = %profile.external_id, error = %err, "Identity deletion failed");
                return Err(err.into());
            }
        }

        if let Err(err) = self.profiles.remove(&profile).await {
            tracing::warn!(
                user_id = %profile.id,
                external_id = %profile.external_id,
                error = %err,
                "Profile removal failed after identity deletion"
            );

            let entry = ReconciliationEntry::dangling_profile(
                &profile.external_id,
                profile.id,
                &profile.username,
                err.to_string(),
            );
            self.record(entry).await;

            return Err(GatewayError::internal_inconsistency(format!(
                "identity '{}' deleted but profile {} remains: {err}",
                profile.external_id, profile.id
            )));
        }

        tracing::info!(user_id = %profile.id, username = %profile.username, "User deleted");
        Ok(())
    }

    /// Lists all profiles.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the store fails.
    pub async fn list_users(&self) -> GatewayResult<Vec<UserProfile>> {
        Ok(self.profiles.list().await?)
    }

    /// Gets a profile by internal id.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if absent.
    pub async fn get_user(&self, id: Uuid) -> GatewayResult<UserProfile> {
        self.profiles
            .find_by_id(id)
            .await?
            .ok_or_else(|| GatewayError::not_found(format!("user {id}")))
    }

    /// Gets a profile by username.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if absent.
    pub async fn find_by_username(&self, username: &str) -> GatewayResult<UserProfile> {
        self.profiles
            .find_by_username(username)
            .await?
            .ok_or_else(|| GatewayError::not_found(format!("user '{username}'")))
    }

    /// Gets a profile by email.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if absent.
    pub async fn find_by_email(&self, email: &str) -> GatewayResult<UserProfile> {
        self.profiles
            .find_by_email(email)
            .await?
            .ok_or_else(|| GatewayError::not_found(format!("user with email '{email}'")))
    }

    /// Gets a profile by provider identity id.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if absent.
    pub async fn find_by_external_id(&self, external_id: &str) -> GatewayResult<UserProfile> {
        self.profiles
            .find_by_external_id(external_id)
            .await?
            .ok_or_else(|| GatewayError::not_found(format!("user with identity '{external_id}'")))
    }

    /// Activates or deactivates a profile.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if absent, `Storage` if the update fails.
    pub async fn set_active(&self, id: Uuid, active: bool) -> GatewayResult<UserProfile> {
        let mut profile = self.get_user(id).await?;
        profile.active = active;
        profile.touch();
        let profile = self.profiles.save(profile).await?;
        tracing::info!(user_id = %id, active, "User active status changed");
        Ok(profile)
    }

    /// Replaces a profile's roles.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if absent, `Storage` if the update fails.
    pub async fn set_roles(&self, id: Uuid, roles: BTreeSet<String>) -> GatewayResult<UserProfile> {
        let mut profile = self.get_user(id).await?;
        profile.roles = roles;
        profile.touch();
        let profile = self.profiles.save(profile).await?;
        tracing::info!(user_id = %id, roles = ?profile.roles, "User roles changed");
        Ok(profile)
    }

    /// Best-effort removal of an identity whose profile was never written.
    async fn compensate_orphan(&self, external_id: &str) -> bool {
        if !self.config.compensate_on_failure {
            return false;
        }

        match self.idp.delete_identity(external_id).await {
            Ok(()) | Err(IdpError::NotFound(_)) => {
                tracing::info!(external_id = %external_id, "Compensated orphaned identity");
                true
            }
            Err(err) => {
                tracing::warn!(external_id = %external_id, error = %err, "Compensation failed");
                false
            }
        }
    }

    async fn record(&self, entry: ReconciliationEntry) {
        let kind = entry.kind;
        let external_id = entry.external_id.clone();
        if let Err(err) = self.reconciliation.record(entry).await {
            tracing::error!(
                kind = kind.as_str(),
                external_id = %external_id,
                error = %err,
                "Failed to record reconciliation entry"
            );
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
