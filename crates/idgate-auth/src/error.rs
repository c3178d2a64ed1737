//! Gateway error types.
//!
//! Every failure the gateway can surface to a caller is expressed as a
//! [`GatewayError`]. Identity provider and storage failures are translated
//! into this taxonomy at the component boundary so handlers never see raw
//! transport errors.

use crate::idp::IdpError;
use crate::storage::StorageError;

/// Errors that can occur while federating identities or authorizing requests.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The identity provider rejected the username/password pair.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// No bearer token was supplied for a protected route.
    #[error("Missing bearer token")]
    MissingToken,

    /// The bearer token was present but malformed or failed verification.
    #[error("Invalid token: {message}")]
    InvalidToken {
        /// Description of why the token is invalid.
        message: String,
    },

    /// The identity provider reported the token as inactive.
    #[error("Token is not active")]
    TokenInactive,

    /// The authenticated principal lacks a required role.
    #[error("Forbidden: {message}")]
    Forbidden {
        /// Description of why access is forbidden.
        message: String,
    },

    /// The identity provider already holds an identity with this username or email.
    #[error("Identity conflict: {message}")]
    IdentityConflict {
        /// Description of the conflicting identity.
        message: String,
    },

    /// Authentication succeeded upstream but no local profile exists.
    #[error("No local profile for user '{username}'")]
    ProfileNotFound {
        /// The username that authenticated.
        username: String,
    },

    /// The requested resource does not exist.
    #[error("Not found: {message}")]
    NotFound {
        /// Description of the missing resource.
        message: String,
    },

    /// The identity provider could not be reached or answered unexpectedly.
    #[error("Identity provider unavailable: {message}")]
    UpstreamUnavailable {
        /// Description of the upstream failure.
        message: String,
    },

    /// The gateway could not obtain an administrative credential.
    #[error("Identity provider rejected admin credentials: {message}")]
    UpstreamAuthFailure {
        /// Description of the failure.
        message: String,
    },

    /// The identity provider and the local store disagree about a user.
    #[error("Internal inconsistency: {message}")]
    InternalInconsistency {
        /// Description of the divergence.
        message: String,
    },

    /// The identity provider refused to end the session.
    #[error("Logout failed: {message}")]
    LogoutFailure {
        /// Description of the failure.
        message: String,
    },

    /// The local profile store failed.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage error.
        message: String,
    },

    /// The gateway configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },
}

impl GatewayError {
    /// Creates a new `InvalidToken` error.
    #[must_use]
    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::InvalidToken {
            message: message.into(),
        }
    }

    /// Creates a new `Forbidden` error.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// Creates a new `IdentityConflict` error.
    #[must_use]
    pub fn identity_conflict(message: impl Into<String>) -> Self {
        Self::IdentityConflict {
            message: message.into(),
        }
    }

    /// Creates a new `ProfileNotFound` error.
    #[must_use]
    pub fn profile_not_found(username: impl Into<String>) -> Self {
        Self::ProfileNotFound {
            username: username.into(),
        }
    }

    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Creates a new `UpstreamUnavailable` error.
    #[must_use]
    pub fn upstream_unavailable(message: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            message: message.into(),
        }
    }

    /// Creates a new `UpstreamAuthFailure` error.
    #[must_use]
    pub fn upstream_auth_failure(message: impl Into<String>) -> Self {
        Self::UpstreamAuthFailure {
            message: message.into(),
        }
    }

    /// Creates a new `InternalInconsistency` error.
    #[must_use]
    pub fn internal_inconsistency(message: impl Into<String>) -> Self {
        Self::InternalInconsistency {
            message: message.into(),
        }
    }

    /// Creates a new `LogoutFailure` error.
    #[must_use]
    pub fn logout_failure(message: impl Into<String>) -> Self {
        Self::LogoutFailure {
            message: message.into(),
        }
    }

    /// Creates a new `Storage` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Stable machine-readable reason code, used as the `error` field of
    /// JSON error bodies.
    #[must_use]
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "invalid_credentials",
            Self::MissingToken => "missing_token",
            Self::InvalidToken { .. } => "invalid_token",
            Self::TokenInactive => "token_inactive",
            Self::Forbidden { .. } => "forbidden",
            Self::IdentityConflict { .. } => "identity_conflict",
            Self::ProfileNotFound { .. } => "profile_not_found",
            Self::NotFound { .. } => "not_found",
            Self::UpstreamUnavailable { .. } => "upstream_unavailable",
            Self::UpstreamAuthFailure { .. } => "upstream_auth_failure",
            Self::InternalInconsistency { .. } => "internal_inconsistency",
            Self::LogoutFailure { .. } => "logout_failure",
            Self::Storage { .. } => "storage_error",
            Self::Configuration { .. } => "configuration_error",
        }
    }

    /// Returns `true` if this error is caused by the caller.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredentials
                | Self::MissingToken
                | Self::InvalidToken { .. }
                | Self::TokenInactive
                | Self::Forbidden { .. }
                | Self::IdentityConflict { .. }
                | Self::ProfileNotFound { .. }
                | Self::NotFound { .. }
        )
    }

    /// Returns `true` if this error is a gateway-side or upstream failure.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        !self.is_client_error()
    }
}

impl From<IdpError> for GatewayError {
    fn from(err: IdpError) -> Self {
        match err {
            IdpError::Unauthorized => Self::InvalidCredentials,
            IdpError::Conflict(message) => Self::IdentityConflict { message },
            IdpError::NotFound(message) => Self::NotFound { message },
            IdpError::AdminAuthFailed(message) => Self::UpstreamAuthFailure { message },
            other @ (IdpError::Network(_)
            | IdpError::Status { .. }
            | IdpError::InvalidResponse(_)
            | IdpError::Url(_)) => Self::UpstreamUnavailable {
                message: other.to_string(),
            },
        }
    }
}

impl From<StorageError> for GatewayError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(message) => Self::NotFound { message },
            other => Self::Storage {
                message: other.to_string(),
            },
        }
    }
}

/// Result type alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

// =============================================================================
// Tests
// =============================================================================
