//! Bearer token signature and expiry verification.
//!
//! Verification is purely structural: it proves the token was issued by the
//! realm and has not expired. Whether the token is still live is a separate
//! question answered by introspection.

use std::time::Duration;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};

use super::claims::AccessTokenClaims;
use super::jwks::{JwksError, RealmKeySet};
use crate::config::{IdpConfig, TokenConfig};
use crate::idp::RealmEndpoints;

/// Errors produced while verifying a bearer token.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// The token is not a well-formed JWT or its claims cannot be read.
    #[error("Malformed token: {0}")]
    Malformed(String),

    /// The signature does not match.
    #[error("Invalid signature")]
    InvalidSignature,

    /// The token is past its `exp` (plus leeway).
    #[error("Token expired")]
    Expired,

    /// The `iss` claim does not match the configured issuer.
    #[error("Invalid issuer")]
    InvalidIssuer,

    /// The token header carries no `kid` and the key set has no usable key.
    #[error("Token has no key id")]
    MissingKeyId,

    /// The verification key could not be obtained.
    #[error("Key error: {0}")]
    Jwks(#[from] JwksError),

    /// The configured verification key is unusable.
    #[error("Invalid verification key: {0}")]
    InvalidKey(String),
}

impl TokenError {
    /// Returns `true` if verification failed because the key set could not be
    /// fetched, rather than because of the token itself.
    #[must_use]
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::Jwks(err) if err.is_unavailable())
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            ErrorKind::InvalidIssuer => Self::InvalidIssuer,
            _ => Self::Malformed(err.to_string()),
        }
    }
}

enum KeySource {
    Static { key: DecodingKey, algorithm: Algorithm },
    Jwks(RealmKeySet),
}

/// Verifies bearer tokens against the realm's signing key.
pub struct TokenVerifier {
    source: KeySource,
    issuer: Option<String>,
    leeway: Duration,
}

impl TokenVerifier {
    /// Verifier for HS256 tokens signed with a shared secret.
    #[must_use]
    pub fn hs256(secret: &str) -> Self {
        Self::with_source(KeySource::Static {
            key: DecodingKey::from_secret(secret.as_bytes()),
            algorithm: Algorithm::HS256,
        })
    }

    /// Verifier for RS256 tokens signed with the given public key.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::InvalidKey` if the PEM cannot be parsed.
    pub fn rs256_pem(pem: &str) -> Result<Self, TokenError> {
        let key = DecodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|e| TokenError::InvalidKey(e.to_string()))?;
        Ok(Self::with_source(KeySource::Static {
            key,
            algorithm: Algorithm::RS256,
        }))
    }

    /// Verifier that looks keys up in a realm JWKS.
    #[must_use]
    pub fn jwks(keys: RealmKeySet) -> Self {
        Self::with_source(KeySource::Jwks(keys))
    }

    /// Builds a verifier from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured key cannot be parsed or the
    /// certificate URL cannot be built.
    pub fn from_config(token: &TokenConfig, idp: &IdpConfig) -> Result<Self, TokenError> {
        let verifier = if token.jwks {
            let endpoints = RealmEndpoints::new(&idp.base_url, &idp.realm)
                .map_err(|e| TokenError::InvalidKey(e.to_string()))?;
            let http = reqwest::Client::builder()
                .timeout(idp.request_timeout)
                .build()
                .map_err(|e| TokenError::InvalidKey(e.to_string()))?;
            Self::jwks(RealmKeySet::new(http, endpoints.certs))
        } else if let Some(pem) = &token.public_key_pem {
            Self::rs256_pem(pem)?
        } else {
            Self::hs256(&token.secret)
        };

        let verifier = verifier.with_leeway(token.leeway);
        Ok(match &token.issuer {
            Some(issuer) => verifier.with_issuer(issuer.clone()),
            None => verifier,
        })
    }

    fn with_source(source: KeySource) -> Self {
        Self {
            source,
            issuer: None,
            leeway: Duration::from_secs(30),
        }
    }

    /// Requires the `iss` claim to equal `issuer`.
    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Sets the clock skew tolerance for `exp`.
    #[must_use]
    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self
    }

    /// Verifies the token and returns its claims.
    ///
    /// # Errors
    ///
    /// Returns a `TokenError` describing why the token was rejected.
    pub async fn verify(&self, token: &str) -> Result<AccessTokenClaims, TokenError> {
        let header = decode_header(token)?;

        match &self.source {
            KeySource::Static { key, algorithm } => self.decode_with(token, key, *algorithm),
            KeySource::Jwks(keys) => match header.kid.as_deref() {
                Some(kid) => {
                    let (key, algorithm) = keys.get_key(kid).await?;
                    self.decode_with(token, &key, algorithm.unwrap_or(header.alg))
                }
                None => {
                    let candidates = keys.signing_keys().await?;
                    let mut last_err = TokenError::MissingKeyId;
                    for (key, algorithm) in &candidates {
                        match self.decode_with(token, key, algorithm.unwrap_or(header.alg)) {
                            Ok(claims) => return Ok(claims),
                            Err(err) => last_err = err,
                        }
                    }
                    Err(last_err)
                }
            },
        }
    }

    fn decode_with(
        &self,
        token: &str,
        key: &DecodingKey,
        algorithm: Algorithm,
    ) -> Result<AccessTokenClaims, TokenError> {
        let mut validation = Validation::new(algorithm);
        validation.leeway = self.leeway.as_secs();
        validation.validate_aud = false;
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
        }

        let data = decode::<AccessTokenClaims>(token, key, &validation)?;
        Ok(data.claims)
    }
}
