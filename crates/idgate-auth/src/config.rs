//! Gateway configuration.
//!
//! Configuration is grouped into three sections: the identity provider
//! connection, bearer token verification, and user lifecycle defaults.
//!
//! # Example (TOML)
//!
//! ```toml
//! [auth.idp]
//! base_url = "https://sso.example.com"
//! realm = "acme"
//! client_id = "gateway"
//! client_secret = "s3cr3t"
//! request_timeout = "5s"
//!
//! [auth.token]
//! jwks = true
//! issuer = "https://sso.example.com/realms/acme"
//!
//! [auth.users]
//! default_roles = ["user"]
//! compensate_on_failure = true
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

/// Root gateway configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Identity provider connection settings.
    pub idp: IdpConfig,

    /// Bearer token verification settings.
    pub token: TokenConfig,

    /// User lifecycle settings.
    pub users: UsersConfig,
}

/// Identity provider connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IdpConfig {
    /// Base URL of the identity provider, without the realm path.
    pub base_url: String,

    /// Realm that holds the federated users.
    pub realm: String,

    /// Client identifier used for password grants, logout and introspection.
    pub client_id: String,

    /// Client secret. Only sent when non-empty.
    pub client_secret: Option<String>,

    /// Username of the realm administrator used for admin API calls.
    pub admin_username: String,

    /// Password of the realm administrator.
    pub admin_password: String,

    /// Timeout applied to every outbound request.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// A cached admin token is treated as expired this long before its real expiry.
    #[serde(with = "humantime_serde")]
    pub admin_token_skew: Duration,
}

impl Default for IdpConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            realm: "master".to_string(),
            client_id: "admin-cli".to_string(),
            client_secret: None,
            admin_username: "admin".to_string(),
            admin_password: "admin".to_string(),
            request_timeout: Duration::from_secs(10),
            admin_token_skew: Duration::from_secs(30),
        }
    }
}

impl IdpConfig {
    /// Creates a configuration pointing at the given base URL and realm.
    #[must_use]
    pub fn new(base_url: impl Into<String>, realm: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            realm: realm.into(),
            ..Self::default()
        }
    }

    /// Sets the client credentials.
    #[must_use]
    pub fn with_client(mut self, client_id: impl Into<String>, secret: Option<String>) -> Self {
        self.client_id = client_id.into();
        self.client_secret = secret;
        self
    }

    /// Sets the admin credentials.
    #[must_use]
    pub fn with_admin(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.admin_username = username.into();
        self.admin_password = password.into();
        self
    }

    /// Sets the outbound request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Returns the client secret if one is configured and non-empty.
    #[must_use]
    pub fn effective_client_secret(&self) -> Option<&str> {
        self.client_secret.as_deref().filter(|s| !s.is_empty())
    }
}

/// Bearer token verification settings.
///
/// Exactly one key source is used, in order of precedence: `jwks`,
/// `public_key_pem`, `secret`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Shared HS256 secret.
    pub secret: String,

    /// PEM-encoded RS256 public key.
    pub public_key_pem: Option<String>,

    /// Fetch verification keys from the realm's certificate endpoint.
    pub jwks: bool,

    /// Expected `iss` claim. Not validated when absent.
    pub issuer: Option<String>,

    /// Clock skew tolerance for `exp`.
    #[serde(with = "humantime_serde")]
    pub leeway: Duration,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            secret: "default-secret".to_string(),
            public_key_pem: None,
            jwks: false,
            issuer: None,
            leeway: Duration::from_secs(30),
        }
    }
}

/// User lifecycle settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UsersConfig {
    /// Roles assigned when a caller does not specify any.
    pub default_roles: Vec<String>,

    /// Delete the freshly created external identity when the local profile
    /// write fails.
    pub compensate_on_failure: bool,
}

impl Default for UsersConfig {
    fn default() -> Self {
        Self {
            default_roles: vec!["user".to_string()],
            compensate_on_failure: false,
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),
}

impl GatewayConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - The identity provider base URL cannot be parsed
    /// - The realm or client id is empty
    /// - No default roles are configured
    /// - The token secret is empty while no other key source is configured
    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.idp.base_url).map_err(|e| {
            ConfigError::InvalidValue(format!("idp.base_url '{}': {}", self.idp.base_url, e))
        })?;

        if self.idp.realm.trim().is_empty() {
            return Err(ConfigError::Missing("idp.realm".to_string()));
        }

        if self.idp.client_id.trim().is_empty() {
            return Err(ConfigError::Missing("idp.client_id".to_string()));
        }

        if self.idp.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "idp.request_timeout must be greater than zero".to_string(),
            ));
        }

        if self.users.default_roles.is_empty() {
            return Err(ConfigError::InvalidValue(
                "users.default_roles cannot be empty".to_string(),
            ));
        }

        if !self.token.jwks && self.token.public_key_pem.is_none() && self.token.secret.is_empty() {
            return Err(ConfigError::Missing(
                "token.secret, token.public_key_pem or token.jwks".to_string(),
            ));
        }

        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
