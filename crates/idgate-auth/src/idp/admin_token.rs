//! Cached administrative credential.
//!
//! A single [`AdminTokenCache`] is owned by each identity provider client and
//! shared by every admin call it makes. Concurrent refreshes are not
//! deduplicated; the last writer wins.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

/// Upper bound applied to provider-reported admin token lifetimes.
pub const MAX_ADMIN_TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

/// Admin access token together with its local expiry.
#[derive(Debug, Clone)]
pub struct AdminCredential {
    token: String,
    lifetime: Duration,
    expires_at: Instant,
}

impl AdminCredential {
    /// Creates a credential that expires `lifetime` from now.
    ///
    /// Lifetimes above [`MAX_ADMIN_TOKEN_LIFETIME`] are clamped.
    #[must_use]
    pub fn new(token: impl Into<String>, lifetime: Duration) -> Self {
        let lifetime = lifetime.min(MAX_ADMIN_TOKEN_LIFETIME);
        let now = Instant::now();
        Self {
            token: token.into(),
            lifetime,
            expires_at: now.checked_add(lifetime).unwrap_or(now),
        }
    }

    /// Returns the bearer token.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Lifetime after clamping.
    #[must_use]
    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    // Short-lived tokens use half their lifetime as the margin instead of `skew`.
    fn is_fresh(&self, skew: Duration) -> bool {
        let margin = skew.min(self.lifetime / 2);
        Instant::now()
            .checked_add(margin)
            .is_some_and(|deadline| deadline < self.expires_at)
    }
}

/// Thread-safe holder for the current admin credential.
#[derive(Debug, Clone)]
pub struct AdminTokenCache {
    current: Arc<RwLock<Option<AdminCredential>>>,
    skew: Duration,
}

impl AdminTokenCache {
    /// Creates an empty cache.
    ///
    /// A cached token is reported as expired `skew` before its real expiry.
    #[must_use]
    pub fn new(skew: Duration) -> Self {
        Self {
            current: Arc::new(RwLock::new(None)),
            skew,
        }
    }

    /// Returns the cached token if it is still fresh.
    pub async fn get(&self) -> Option<String> {
        let guard = self.current.read().await;
        guard
            .as_ref()
            .filter(|cred| cred.is_fresh(self.skew))
            .map(|cred| cred.token.clone())
    }

    /// Replaces the cached credential.
    pub async fn store(&self, credential: AdminCredential) {
        if credential.lifetime() <= self.skew {
            tracing::warn!(
                lifetime_secs = credential.lifetime().as_secs(),
                skew_secs = self.skew.as_secs(),
                "Admin token lifetime does not exceed the expiry skew; caching for half its lifetime"
            );
        }
        *self.current.write().await = Some(credential);
    }

    /// Discards the cached credential if it still holds `token`.
    ///
    /// A credential stored by a concurrent refresh is left in place.
    pub async fn invalidate(&self, token: &str) {
        let mut guard = self.current.write().await;
        if guard.as_ref().is_some_and(|cred| cred.token == token) {
            *guard = None;
        }
    }
}
