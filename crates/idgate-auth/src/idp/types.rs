//! Wire types exchanged with the identity provider.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Attributes of an identity to be created at the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIdentity {
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub enabled: bool,
}

impl NewIdentity {
    /// Creates an enabled identity with the given username and email.
    #[must_use]
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            first_name: None,
            last_name: None,
            enabled: true,
        }
    }

    /// Sets the given and family names.
    #[must_use]
    pub fn with_names(mut self, first_name: Option<String>, last_name: Option<String>) -> Self {
        self.first_name = first_name;
        self.last_name = last_name;
        self
    }
}

/// Admin API user representation sent on create.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UserRepresentation<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub enabled: bool,
    pub email_verified: bool,
    pub credentials: [CredentialRepresentation<'a>; 1],
}

#[derive(Debug, Serialize)]
pub(crate) struct CredentialRepresentation<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub value: &'a str,
    pub temporary: bool,
}

impl<'a> UserRepresentation<'a> {
    pub(crate) fn new(identity: &'a NewIdentity, password: &'a str) -> Self {
        Self {
            username: &identity.username,
            email: &identity.email,
            first_name: identity.first_name.as_deref().unwrap_or_default(),
            last_name: identity.last_name.as_deref().unwrap_or_default(),
            enabled: identity.enabled,
            email_verified: true,
            credentials: [CredentialRepresentation {
                kind: "password",
                value: password,
                temporary: false,
            }],
        }
    }
}

/// Tokens issued by a password grant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenSet {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
    #[serde(default)]
    pub refresh_expires_in: Option<u64>,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// An identity as reported by the provider's admin API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRecord {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub email_verified: bool,
    /// Creation time in milliseconds since the epoch.
    #[serde(default)]
    pub created_timestamp: Option<i64>,
    /// Remaining provider-specific attributes.
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// Result of token introspection.
///
/// Only `active` is interpreted. The remaining claims are kept for callers
/// that want to log or inspect them but are never used to build a principal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Introspection {
    #[serde(default)]
    pub active: bool,
    #[serde(flatten)]
    pub claims: serde_json::Map<String, Value>,
}

impl Introspection {
    /// An inactive introspection result with no claims.
    #[must_use]
    pub fn inactive() -> Self {
        Self {
            active: false,
            claims: serde_json::Map::new(),
        }
    }

    /// Returns a string claim by name.
    #[must_use]
    pub fn claim_str(&self, name: &str) -> Option<&str> {
        self.claims.get(name).and_then(Value::as_str)
    }
}

/// OAuth error body returned by token, logout and introspection endpoints.
#[derive(Debug, Deserialize)]
pub(crate) struct OAuthErrorResponse {
    pub error: String,
    pub error_description: Option<String>,
}

/// Produces a readable message from an OAuth error body, falling back to the raw text.
pub(crate) fn describe_error_body(body: &str) -> String {
    match serde_json::from_str::<OAuthErrorResponse>(body) {
        Ok(err) => match err.error_description {
            Some(description) if !description.is_empty() => {
                format!("{}: {}", err.error, description)
            }
            _ => err.error,
        },
        Err(_) => body.to_string(),
    }
}
