//! Login and logout.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, GatewayResult};
use crate::idp::IdentityProvider;
use crate::storage::{ProfileStore, ProfileSummary};

/// Tokens and profile summary returned by a successful login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    pub user: ProfileSummary,
}

/// Delegates credential checks to the identity provider and resolves the
/// local profile of the authenticated user.
pub struct AuthenticationGateway {
    idp: Arc<dyn IdentityProvider>,
    profiles: Arc<dyn ProfileStore>,
}

impl AuthenticationGateway {
    /// Creates a gateway.
    #[must_use]
    pub fn new(idp: Arc<dyn IdentityProvider>, profiles: Arc<dyn ProfileStore>) -> Self {
        Self { idp, profiles }
    }

    /// Password login.
    ///
    /// # Errors
    ///
    /// - `InvalidCredentials` if the identity provider refuses the credentials
    /// - `ProfileNotFound` if the user is valid upstream but has no local profile
    /// - `UpstreamUnavailable` on provider failures
    pub async fn login(&self, username: &str, password: &str) -> GatewayResult<LoginResponse> {
        let tokens = self
            .idp
            .authenticate(username, password)
            .await
            .map_err(GatewayError::from)?;

        let profile = self
            .profiles
            .find_by_username(username)
            .await?
            .ok_or_else(|| {
                tracing::warn!(username = %username, "Authenticated user has no local profile");
                GatewayError::profile_not_found(username)
            })?;

        tracing::info!(user_id = %profile.id, username = %username, "User logged in");

        Ok(LoginResponse {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_in: tokens.expires_in,
            user: profile.summary(),
        })
    }

    /// Ends the session bound to `refresh_token`.
    ///
    /// A failure here does not mean the session is still valid.
    ///
    /// # Errors
    ///
    /// Returns `LogoutFailure` if the provider does not confirm the logout.
    pub async fn logout(&self, refresh_token: &str) -> GatewayResult<()> {
        self.idp.revoke_session(refresh_token).await.map_err(|err| {
            tracing::warn!(error = %err, "Logout rejected by identity provider");
            GatewayError::logout_failure(err.to_string())
        })
    }
}
