//! Test doubles shared by unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::idp::{IdentityProvider, IdentityRecord, IdpError, Introspection, NewIdentity, TokenSet};
use crate::storage::{MemoryProfileStore, ProfileStore, StorageError, StorageResult, UserProfile};
use crate::token::{AccessTokenClaims, RealmAccess};

pub const TEST_SECRET: &str = "test-signing-secret";

/// Signs an HS256 access token with [`TEST_SECRET`].
pub fn sign_token(subject: &str, username: &str, roles: &[&str]) -> String {
    let claims = AccessTokenClaims {
        sub: subject.to_string(),
        preferred_username: Some(username.to_string()),
        email: Some(format!("{username}@example.com")),
        realm_access: Some(RealmAccess {
            roles: roles.iter().map(ToString::to_string).collect(),
        }),
        exp: OffsetDateTime::now_utc().unix_timestamp() + 300,
        iat: None,
        iss: None,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
    )
    .unwrap()
}

struct FakeIdentity {
    identity: NewIdentity,
    password: String,
}

/// In-memory identity provider.
#[derive(Default)]
pub struct FakeIdentityProvider {
    identities: Mutex<HashMap<String, FakeIdentity>>,
    active_tokens: Mutex<HashSet<String>>,
    revoked: Mutex<Vec<String>>,
    introspection_calls: AtomicUsize,
    delete_calls: AtomicUsize,
    fail_introspection: AtomicBool,
    fail_delete: AtomicBool,
    fail_create: AtomicBool,
}

impl FakeIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an identity directly, bypassing `create_identity`.
    pub fn seed(&self, username: &str, password: &str) -> String {
        let id = Uuid::new_v4().to_string();
        self.identities.lock().unwrap().insert(
            id.clone(),
            FakeIdentity {
                identity: NewIdentity::new(username, format!("{username}@example.com")),
                password: password.to_string(),
            },
        );
        id
    }

    pub fn activate(&self, token: &str) {
        self.active_tokens.lock().unwrap().insert(token.to_string());
    }

    pub fn fail_introspection(&self, fail: bool) {
        self.fail_introspection.store(fail, Ordering::SeqCst);
    }

    pub fn fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    pub fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn introspection_calls(&self) -> usize {
        self.introspection_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn identity_count(&self) -> usize {
        self.identities.lock().unwrap().len()
    }

    pub fn revoked(&self) -> Vec<String> {
        self.revoked.lock().unwrap().clone()
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentityProvider {
    async fn admin_token(&self) -> Result<String, IdpError> {
        Ok("admin-token".to_string())
    }

    async fn create_identity(
        &self,
        identity: &NewIdentity,
        password: &str,
    ) -> Result<String, IdpError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(IdpError::Status {
                status: 500,
                body: "boom".to_string(),
            });
        }

        let mut identities = self.identities.lock().unwrap();
        if identities.values().any(|existing| {
            existing.identity.username == identity.username
                || existing.identity.email == identity.email
        }) {
            return Err(IdpError::Conflict(format!(
                "user '{}' already exists",
                identity.username
            )));
        }

        let id = Uuid::new_v4().to_string();
        identities.insert(
            id.clone(),
            FakeIdentity {
                identity: identity.clone(),
                password: password.to_string(),
            },
        );
        Ok(id)
    }

    async fn authenticate(&self, username: &str, password: &str) -> Result<TokenSet, IdpError> {
        let identities = self.identities.lock().unwrap();
        let found = identities
            .values()
            .any(|fake| fake.identity.username == username && fake.password == password);
        if !found {
            return Err(IdpError::Unauthorized);
        }

        Ok(TokenSet {
            access_token: format!("access-{username}"),
            refresh_token: format!("refresh-{username}"),
            expires_in: 300,
            refresh_expires_in: Some(1800),
            token_type: Some("Bearer".to_string()),
        })
    }

    async fn revoke_session(&self, refresh_token: &str) -> Result<(), IdpError> {
        if !refresh_token.starts_with("refresh-") {
            return Err(IdpError::Status {
                status: 400,
                body: "invalid_grant".to_string(),
            });
        }
        self.revoked.lock().unwrap().push(refresh_token.to_string());
        Ok(())
    }

    async fn delete_identity(&self, external_id: &str) -> Result<(), IdpError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(IdpError::Status {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        match self.identities.lock().unwrap().remove(external_id) {
            Some(_) => Ok(()),
            None => Err(IdpError::NotFound(external_id.to_string())),
        }
    }

    async fn fetch_identity(&self, external_id: &str) -> Result<IdentityRecord, IdpError> {
        let identities = self.identities.lock().unwrap();
        let fake = identities
            .get(external_id)
            .ok_or_else(|| IdpError::NotFound(external_id.to_string()))?;
        Ok(IdentityRecord {
            id: external_id.to_string(),
            username: fake.identity.username.clone(),
            email: Some(fake.identity.email.clone()),
            first_name: fake.identity.first_name.clone(),
            last_name: fake.identity.last_name.clone(),
            enabled: fake.identity.enabled,
            email_verified: true,
            created_timestamp: None,
            extra: HashMap::new(),
        })
    }

    async fn introspect_token(&self, token: &str) -> Result<Introspection, IdpError> {
        self.introspection_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_introspection.load(Ordering::SeqCst) {
            return Err(IdpError::Status {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        if self.active_tokens.lock().unwrap().contains(token) {
            Ok(Introspection {
                active: true,
                claims: serde_json::Map::new(),
            })
        } else {
            Ok(Introspection::inactive())
        }
    }
}

/// Profile store whose writes can be made to fail.
#[derive(Default)]
pub struct FailingProfileStore {
    inner: MemoryProfileStore,
    fail_create: AtomicBool,
    fail_remove: AtomicBool,
}

impl FailingProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn fail_remove(&self, fail: bool) {
        self.fail_remove.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProfileStore for FailingProfileStore {
    async fn create(&self, profile: UserProfile) -> StorageResult<UserProfile> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(StorageError::backend("connection refused"));
        }
        self.inner.create(profile).await
    }

    async fn find_by_id(&self, id: Uuid) -> StorageResult<Option<UserProfile>> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_username(&self, username: &str) -> StorageResult<Option<UserProfile>> {
        self.inner.find_by_username(username).await
    }

    async fn find_by_email(&self, email: &str) -> StorageResult<Option<UserProfile>> {
        self.inner.find_by_email(email).await
    }

    async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> StorageResult<Option<UserProfile>> {
        self.inner.find_by_external_id(external_id).await
    }

    async fn list(&self) -> StorageResult<Vec<UserProfile>> {
        self.inner.list().await
    }

    async fn save(&self, profile: UserProfile) -> StorageResult<UserProfile> {
        self.inner.save(profile).await
    }

    async fn remove(&self, profile: &UserProfile) -> StorageResult<()> {
        if self.fail_remove.load(Ordering::SeqCst) {
            return Err(StorageError::backend("connection refused"));
        }
        self.inner.remove(profile).await
    }
}
