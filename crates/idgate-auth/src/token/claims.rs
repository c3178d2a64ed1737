//! Access token claims issued by the identity provider.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Claims read from a bearer token.
///
/// Only the fields the gateway uses are modelled; anything else in the
/// token is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject (identity id at the provider).
    pub sub: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Realm-level role assignments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realm_access: Option<RealmAccess>,

    /// Expiration time (Unix timestamp).
    pub exp: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

/// The `realm_access` claim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealmAccess {
    #[serde(default)]
    pub roles: Vec<String>,
}

impl AccessTokenClaims {
    /// Realm roles, empty when the claim is absent.
    #[must_use]
    pub fn roles(&self) -> BTreeSet<String> {
        self.realm_access
            .as_ref()
            .map(|access| access.roles.iter().cloned().collect())
            .unwrap_or_default()
    }
}
