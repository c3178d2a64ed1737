//! Error types for identity provider calls.

/// Errors that can occur while talking to the identity provider.
///
/// These are transport-level classifications. Callers translate them into
/// [`GatewayError`](crate::error::GatewayError) at the component boundary.
#[derive(Debug, thiserror::Error)]
pub enum IdpError {
    /// The request could not be sent or the response could not be read.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The provider answered with an unexpected status code.
    #[error("Identity provider returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },

    /// An identity with the same username or email already exists.
    #[error("Identity already exists: {0}")]
    Conflict(String),

    /// The provider rejected user credentials.
    #[error("Unauthorized")]
    Unauthorized,

    /// The identity does not exist at the provider.
    #[error("Identity not found: {0}")]
    NotFound(String),

    /// The provider answered successfully but the payload is unusable.
    #[error("Invalid response from identity provider: {0}")]
    InvalidResponse(String),

    /// The provider rejected the administrative credentials.
    #[error("Admin authentication failed: {0}")]
    AdminAuthFailed(String),

    /// An endpoint URL could not be built.
    #[error("Invalid identity provider URL: {0}")]
    Url(#[from] url::ParseError),
}

impl IdpError {
    /// Returns `true` if this error means the identity is already gone.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
