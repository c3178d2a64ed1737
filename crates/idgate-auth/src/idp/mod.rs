//! Identity provider integration.
//!
//! The gateway consumes the identity provider through the
//! [`IdentityProvider`] trait. [`KeycloakClient`] is the HTTP implementation
//! used in production; tests substitute in-memory fakes.
//!
//! # Overview
//!
//! - [`KeycloakClient`] - Admin REST and OIDC client for a single realm
//! - [`AdminTokenCache`] - Shared administrative credential with expiry
//! - [`IdpError`] - Transport-level error classification

pub mod admin_token;
pub mod client;
pub mod error;
pub mod types;

use async_trait::async_trait;

pub use admin_token::{AdminCredential, AdminTokenCache};
pub use client::{KeycloakClient, RealmEndpoints};
pub use error::IdpError;
pub use types::{IdentityRecord, Introspection, NewIdentity, TokenSet};

/// Operations the gateway requires from an identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Returns a non-expired administrative token, obtaining one if needed.
    async fn admin_token(&self) -> Result<String, IdpError>;

    /// Registers a new identity with a non-temporary password and returns its id.
    ///
    /// Fails with [`IdpError::Conflict`] if the username or email is taken.
    async fn create_identity(&self, identity: &NewIdentity, password: &str)
    -> Result<String, IdpError>;

    /// Performs a password grant.
    ///
    /// Fails with [`IdpError::Unauthorized`] if the credentials are refused.
    async fn authenticate(&self, username: &str, password: &str) -> Result<TokenSet, IdpError>;

    /// Ends the session bound to `refresh_token`.
    async fn revoke_session(&self, refresh_token: &str) -> Result<(), IdpError>;

    /// Removes an identity.
    ///
    /// Fails with [`IdpError::NotFound`] if it is already gone; callers
    /// treat that as success.
    async fn delete_identity(&self, external_id: &str) -> Result<(), IdpError>;

    /// Reads an identity through the admin API.
    async fn fetch_identity(&self, external_id: &str) -> Result<IdentityRecord, IdpError>;

    /// Asks the provider whether `token` is still active.
    ///
    /// An inactive token is a normal result, not an error.
    async fn introspect_token(&self, token: &str) -> Result<Introspection, IdpError>;
}
