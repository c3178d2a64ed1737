//! Realm signing key fetching and caching.
//!
//! The realm publishes its signing keys as a JSON Web Key Set. Keys are
//! cached for the duration given by the response's `Cache-Control: max-age`
//! (clamped to [`MIN_TTL`]..[`MAX_TTL`]) and looked up by `kid`. An unknown
//! `kid` triggers exactly one refetch, which picks up rotated keys.

use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::jwk::{Jwk, JwkSet, KeyAlgorithm, PublicKeyUse};
use jsonwebtoken::{Algorithm, DecodingKey};
use tokio::sync::RwLock;
use url::Url;

/// TTL used when the response carries no `max-age`.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);
/// Lower bound on the cache TTL.
pub const MIN_TTL: Duration = Duration::from_secs(300);
/// Upper bound on the cache TTL.
pub const MAX_TTL: Duration = Duration::from_secs(86400);

/// Errors that can occur during JWKS operations.
#[derive(Debug, thiserror::Error)]
pub enum JwksError {
    /// A network error occurred while fetching the JWKS.
    #[error("Network error: {0}")]
    Network(String),

    /// The HTTP request returned a non-success status code.
    #[error("HTTP error: status {0}")]
    Http(u16),

    /// The JWKS response could not be parsed as JSON.
    #[error("Failed to parse JWKS: {0}")]
    Parse(String),

    /// The requested key was not found in the JWKS.
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// No usable signing keys were found in the JWKS.
    #[error("No signing keys found in JWKS")]
    NoSigningKeys,
}

impl JwksError {
    /// Returns `true` if the key set could not be retrieved at all.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Http(_) | Self::Parse(_))
    }
}

struct CachedJwks {
    jwks: JwkSet,
    expires_at: Instant,
}

/// Cached signing keys of a single realm.
#[derive(Clone)]
pub struct RealmKeySet {
    http: reqwest::Client,
    uri: Url,
    cache: Arc<RwLock<Option<CachedJwks>>>,
}

impl RealmKeySet {
    /// Creates a key set fetched from `uri` with the given client.
    #[must_use]
    pub fn new(http: reqwest::Client, uri: Url) -> Self {
        Self {
            http,
            uri,
            cache: Arc::new(RwLock::new(None)),
        }
    }

    /// Returns the JWKS endpoint.
    #[must_use]
    pub fn uri(&self) -> &Url {
        &self.uri
    }

    /// Gets a decoding key by key ID, refetching once if the key is unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the JWKS cannot be fetched or the key is absent
    /// after the refetch.
    pub async fn get_key(&self, kid: &str) -> Result<(DecodingKey, Option<Algorithm>), JwksError> {
        if let Some(found) = self.cached_key(kid).await {
            tracing::trace!(kid = %kid, "JWKS cache hit");
            return Ok(found);
        }

        tracing::debug!(kid = %kid, uri = %self.uri, "JWKS cache miss");
        self.refresh().await?;

        self.cached_key(kid)
            .await
            .ok_or_else(|| JwksError::KeyNotFound(kid.to_string()))
    }

    /// Returns every signing key, for tokens without a `kid`.
    ///
    /// # Errors
    ///
    /// Returns an error if the JWKS cannot be fetched or holds no signing keys.
    pub async fn signing_keys(&self) -> Result<Vec<(DecodingKey, Option<Algorithm>)>, JwksError> {
        let fresh = {
            let cache = self.cache.read().await;
            cache
                .as_ref()
                .is_some_and(|cached| Instant::now() < cached.expires_at)
        };
        if !fresh {
            self.refresh().await?;
        }

        let cache = self.cache.read().await;
        let keys: Vec<_> = cache
            .as_ref()
            .map(|cached| {
                cached
                    .jwks
                    .keys
                    .iter()
                    .filter(|k| !matches!(&k.common.public_key_use, Some(PublicKeyUse::Encryption)))
                    .filter_map(to_decoding_key)
                    .collect()
            })
            .unwrap_or_default();

        if keys.is_empty() {
            Err(JwksError::NoSigningKeys)
        } else {
            Ok(keys)
        }
    }

    async fn cached_key(&self, kid: &str) -> Option<(DecodingKey, Option<Algorithm>)> {
        let cache = self.cache.read().await;
        let cached = cache.as_ref()?;
        if Instant::now() >= cached.expires_at {
            return None;
        }
        cached
            .jwks
            .keys
            .iter()
            .find(|k| k.common.key_id.as_deref() == Some(kid))
            .and_then(to_decoding_key)
    }

    /// Fetches the JWKS and replaces the cached copy.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body is not a JWKS.
    pub async fn refresh(&self) -> Result<(), JwksError> {
        tracing::debug!(uri = %self.uri, "Fetching JWKS");

        let response = self
            .http
            .get(self.uri.clone())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(uri = %self.uri, error = %e, "Failed to fetch JWKS");
                JwksError::Network(e.to_string())
            })?;

        if !response.status().is_success() {
            return Err(JwksError::Http(response.status().as_u16()));
        }

        let ttl = cache_ttl(response.headers());
        let jwks: JwkSet = response
            .json()
            .await
            .map_err(|e| JwksError::Parse(e.to_string()))?;

        tracing::debug!(keys = jwks.keys.len(), ttl = ?ttl, "Cached JWKS");

        *self.cache.write().await = Some(CachedJwks {
            jwks,
            expires_at: Instant::now() + ttl,
        });

        Ok(())
    }

    /// Drops the cached key set.
    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
    }
}

/// TTL from `Cache-Control: max-age`, clamped to the configured bounds.
fn cache_ttl(headers: &reqwest::header::HeaderMap) -> Duration {
    headers
        .get(reqwest::header::CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            v.split(',').find_map(|directive| {
                directive
                    .trim()
                    .strip_prefix("max-age=")
                    .and_then(|secs| secs.parse::<u64>().ok())
            })
        })
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_TTL)
        .clamp(MIN_TTL, MAX_TTL)
}

fn to_decoding_key(jwk: &Jwk) -> Option<(DecodingKey, Option<Algorithm>)> {
    DecodingKey::from_jwk(jwk)
        .ok()
        .map(|key| (key, jwk_algorithm(jwk)))
}

fn jwk_algorithm(jwk: &Jwk) -> Option<Algorithm> {
    jwk.common.key_algorithm.as_ref().and_then(|alg| match alg {
        KeyAlgorithm::HS256 => Some(Algorithm::HS256),
        KeyAlgorithm::HS384 => Some(Algorithm::HS384),
        KeyAlgorithm::HS512 => Some(Algorithm::HS512),
        KeyAlgorithm::RS256 => Some(Algorithm::RS256),
        KeyAlgorithm::RS384 => Some(Algorithm::RS384),
        KeyAlgorithm::RS512 => Some(Algorithm::RS512),
        KeyAlgorithm::PS256 => Some(Algorithm::PS256),
        KeyAlgorithm::PS384 => Some(Algorithm::PS384),
        KeyAlgorithm::PS512 => Some(Algorithm::PS512),
        KeyAlgorithm::ES256 => Some(Algorithm::ES256),
        KeyAlgorithm::ES384 => Some(Algorithm::ES384),
        KeyAlgorithm::EdDSA => Some(Algorithm::EdDSA),
        _ => None,
    })
}
