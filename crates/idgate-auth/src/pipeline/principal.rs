//! The authenticated caller attached to a request.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::token::AccessTokenClaims;

/// Identity and roles of the caller, derived from the bearer token's own
/// signed claims. Lives for one request only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    /// Identity id at the provider (`sub`).
    pub subject: String,
    pub username: String,
    pub email: Option<String>,
    pub roles: BTreeSet<String>,
}

impl Principal {
    /// Builds a principal from verified token claims.
    ///
    /// The username falls back to the subject when `preferred_username` is absent.
    #[must_use]
    pub fn from_claims(claims: &AccessTokenClaims) -> Self {
        Self {
            subject: claims.sub.clone(),
            username: claims
                .preferred_username
                .clone()
                .unwrap_or_else(|| claims.sub.clone()),
            email: claims.email.clone(),
            roles: claims.roles(),
        }
    }

    /// Case-sensitive role membership.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// Returns `true` if the principal holds at least one of `required`.
    #[must_use]
    pub fn has_any_role(&self, required: &BTreeSet<String>) -> bool {
        !self.roles.is_disjoint(required)
    }
}
