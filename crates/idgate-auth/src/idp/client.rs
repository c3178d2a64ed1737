//! HTTP client for a Keycloak-compatible identity provider.
//!
//! All admin calls share one cached admin credential. A `401` on an admin
//! call discards that credential and the call is retried exactly once with a
//! freshly obtained token. No other retries are performed.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::LOCATION;
use reqwest::{RequestBuilder, Response, StatusCode};
use url::Url;

use super::IdentityProvider;
use super::admin_token::{AdminCredential, AdminTokenCache};
use super::error::IdpError;
use super::types::{
    IdentityRecord, Introspection, NewIdentity, OAuthErrorResponse, TokenSet, UserRepresentation,
    describe_error_body,
};
use crate::config::IdpConfig;

// =============================================================================
// Endpoints
// =============================================================================

/// Realm-scoped endpoint URLs.
#[derive(Debug, Clone)]
pub struct RealmEndpoints {
    /// Token endpoint (password grant).
    pub token: Url,
    /// Session logout endpoint.
    pub logout: Url,
    /// Token introspection endpoint.
    pub introspect: Url,
    /// Realm signing keys.
    pub certs: Url,
    /// Admin users collection.
    pub admin_users: Url,
}

impl RealmEndpoints {
    /// Builds the endpoint set for `realm` under `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `IdpError::Url` if the base URL cannot be parsed.
    pub fn new(base_url: &str, realm: &str) -> Result<Self, IdpError> {
        let base = base_url.trim_end_matches('/');
        let oidc = format!("{base}/realms/{realm}/protocol/openid-connect");

        Ok(Self {
            token: Url::parse(&format!("{oidc}/token"))?,
            logout: Url::parse(&format!("{oidc}/logout"))?,
            introspect: Url::parse(&format!("{oidc}/token/introspect"))?,
            certs: Url::parse(&format!("{oidc}/certs"))?,
            admin_users: Url::parse(&format!("{base}/admin/realms/{realm}/users"))?,
        })
    }

    /// URL of a single user in the admin API.
    ///
    /// # Errors
    ///
    /// Returns `IdpError::Url` if the admin URL cannot carry path segments.
    pub fn admin_user(&self, external_id: &str) -> Result<Url, IdpError> {
        let mut url = self.admin_users.clone();
        url.path_segments_mut()
            .map_err(|()| IdpError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .push(external_id);
        Ok(url)
    }
}

// =============================================================================
// Client
// =============================================================================

/// Identity provider client speaking the Keycloak REST and OIDC APIs.
pub struct KeycloakClient {
    http: reqwest::Client,
    config: IdpConfig,
    endpoints: RealmEndpoints,
    admin_tokens: AdminTokenCache,
}

impl KeycloakClient {
    /// Creates a client for the configured realm.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint URLs cannot be built or the HTTP
    /// client cannot be initialized.
    pub fn new(config: IdpConfig) -> Result<Self, IdpError> {
        let endpoints = RealmEndpoints::new(&config.base_url, &config.realm)?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        let admin_tokens = AdminTokenCache::new(config.admin_token_skew);

        Ok(Self {
            http,
            config,
            endpoints,
            admin_tokens,
        })
    }

    /// Form parameters with the client id first and the secret last when configured.
    fn client_form<'a>(&'a self, params: &[(&'static str, &'a str)]) -> Vec<(&'static str, &'a str)> {
        let mut form = Vec::with_capacity(params.len() + 2);
        form.push(("client_id", self.config.client_id.as_str()));
        form.extend_from_slice(params);
        if let Some(secret) = self.config.effective_client_secret() {
            form.push(("client_secret", secret));
        }
        form
    }

    /// Password grant against the realm token endpoint.
    async fn password_grant(&self, username: &str, password: &str) -> Result<Response, IdpError> {
        let form = self.client_form(&[
            ("grant_type", "password"),
            ("username", username),
            ("password", password),
        ]);

        Ok(self
            .http
            .post(self.endpoints.token.clone())
            .form(&form)
            .send()
            .await?)
    }

    /// Obtains a fresh admin credential and caches it.
    async fn refresh_admin_token(&self) -> Result<String, IdpError> {
        tracing::debug!(realm = %self.config.realm, "Requesting admin token");

        let response = self
            .password_grant(&self.config.admin_username, &self.config.admin_password)
            .await?;

        if !response.status().is_success() {
            return Err(match grant_failure(response).await {
                Ok(message) => {
                    tracing::warn!(message = %message, "Identity provider rejected admin credentials");
                    IdpError::AdminAuthFailed(message)
                }
                Err(err) => err,
            });
        }

        let tokens: TokenSet = response.json().await.map_err(|e| {
            IdpError::InvalidResponse(format!("Failed to parse admin token response: {e}"))
        })?;

        self.admin_tokens
            .store(AdminCredential::new(
                tokens.access_token.clone(),
                Duration::from_secs(tokens.expires_in),
            ))
            .await;

        Ok(tokens.access_token)
    }

    /// Sends an admin request, retrying once with a fresh token on `401`.
    async fn send_admin<F>(&self, build: F) -> Result<Response, IdpError>
    where
        F: Fn(&str) -> RequestBuilder + Send + Sync,
    {
        let token = self.admin_token().await?;
        let response = build(&token).send().await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        tracing::debug!("Admin token rejected, refreshing and retrying once");
        self.admin_tokens.invalidate(&token).await;

        let token = self.refresh_admin_token().await?;
        let response = build(&token).send().await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            tracing::warn!("Admin call rejected after token refresh");
            return Err(IdpError::AdminAuthFailed(
                "admin token rejected after refresh".to_string(),
            ));
        }

        Ok(response)
    }
}

#[async_trait]
impl IdentityProvider for KeycloakClient {
    async fn admin_token(&self) -> Result<String, IdpError> {
        if let Some(token) = self.admin_tokens.get().await {
            tracing::trace!("Admin token cache hit");
            return Ok(token);
        }
        self.refresh_admin_token().await
    }

    async fn create_identity(
        &self,
        identity: &NewIdentity,
        password: &str,
    ) -> Result<String, IdpError> {
        let url = self.endpoints.admin_users.clone();
        let body = UserRepresentation::new(identity, password);

        let response = self
            .send_admin(|token| self.http.post(url.clone()).bearer_auth(token).json(&body))
            .await?;

        let status = response.status();
        if status == StatusCode::CONFLICT {
            let body = response.text().await.unwrap_or_default();
            return Err(IdpError::Conflict(conflict_message(&body, &identity.username)));
        }
        if !status.is_success() {
            return Err(status_error(response).await);
        }

        let external_id = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .and_then(id_from_location)
            .ok_or_else(|| {
                IdpError::InvalidResponse("create response has no usable Location header".into())
            })?;

        tracing::info!(
            username = %identity.username,
            external_id = %external_id,
            "Created identity at provider"
        );

        Ok(external_id)
    }

    async fn authenticate(&self, username: &str, password: &str) -> Result<TokenSet, IdpError> {
        let response = self.password_grant(username, password).await?;

        if !response.status().is_success() {
            return Err(match grant_failure(response).await {
                Ok(message) => {
                    tracing::debug!(username = %username, message = %message, "Password grant rejected");
                    IdpError::Unauthorized
                }
                Err(err) => err,
            });
        }

        response.json().await.map_err(|e| {
            IdpError::InvalidResponse(format!("Failed to parse token response: {e}"))
        })
    }

    async fn revoke_session(&self, refresh_token: &str) -> Result<(), IdpError> {
        let form = self.client_form(&[("refresh_token", refresh_token)]);

        let response = self
            .http
            .post(self.endpoints.logout.clone())
            .form(&form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        Ok(())
    }

    async fn delete_identity(&self, external_id: &str) -> Result<(), IdpError> {
        let url = self.endpoints.admin_user(external_id)?;

        let response = self
            .send_admin(|token| self.http.delete(url.clone()).bearer_auth(token))
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(IdpError::NotFound(external_id.to_string())),
            status if status.is_success() => {
                tracing::info!(external_id = %external_id, "Deleted identity at provider");
                Ok(())
            }
            _ => Err(status_error(response).await),
        }
    }

    async fn fetch_identity(&self, external_id: &str) -> Result<IdentityRecord, IdpError> {
        let url = self.endpoints.admin_user(external_id)?;

        let response = self
            .send_admin(|token| self.http.get(url.clone()).bearer_auth(token))
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(IdpError::NotFound(external_id.to_string())),
            status if status.is_success() => response.json().await.map_err(|e| {
                IdpError::InvalidResponse(format!("Failed to parse identity: {e}"))
            }),
            _ => Err(status_error(response).await),
        }
    }

    async fn introspect_token(&self, token: &str) -> Result<Introspection, IdpError> {
        let form = self.client_form(&[("token", token)]);

        let response = self
            .http
            .post(self.endpoints.introspect.clone())
            .form(&form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        response.json().await.map_err(|e| {
            IdpError::InvalidResponse(format!("Failed to parse introspection response: {e}"))
        })
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Reads a failed token endpoint response.
///
/// Returns `Ok(message)` when the grant itself was refused (`401`, or `400`
/// with `invalid_grant`), and the status error otherwise.
async fn grant_failure(response: Response) -> Result<String, IdpError> {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    let refused = status == StatusCode::UNAUTHORIZED
        || (status == StatusCode::BAD_REQUEST
            && serde_json::from_str::<OAuthErrorResponse>(&body)
                .is_ok_and(|err| err.error == "invalid_grant"));

    if refused {
        Ok(describe_error_body(&body))
    } else {
        tracing::warn!(status = status.as_u16(), body = %body, "Unexpected token endpoint response");
        Err(IdpError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

async fn status_error(response: Response) -> IdpError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    tracing::warn!(status, body = %body, "Unexpected identity provider response");
    IdpError::Status { status, body }
}

/// Last non-empty path segment of a `Location` header.
fn id_from_location(location: &str) -> Option<String> {
    location
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .map(ToString::to_string)
}

fn conflict_message(body: &str, username: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("errorMessage")
                .and_then(|m| m.as_str())
                .map(ToString::to_string)
        })
        .or_else(|| {
            serde_json::from_str::<OAuthErrorResponse>(body)
                .ok()
                .map(|err| err.error_description.unwrap_or(err.error))
        })
        .unwrap_or_else(|| format!("user '{username}' already exists"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_realm_endpoints() {
        let endpoints = RealmEndpoints::new("http://localhost:8080/", "acme").unwrap();
        assert_eq!(
            endpoints.token.as_str(),
            "http://localhost:8080/realms/acme/protocol/openid-connect/token"
        );
        assert_eq!(
            endpoints.logout.as_str(),
            "http://localhost:8080/realms/acme/protocol/openid-connect/logout"
        );
        assert_eq!(
            endpoints.introspect.as_str(),
            "http://localhost:8080/realms/acme/protocol/openid-connect/token/introspect"
        );
        assert_eq!(
            endpoints.admin_users.as_str(),
            "http://localhost:8080/admin/realms/acme/users"
        );
    }

    #[test]
    fn test_admin_user_url() {
        let endpoints = RealmEndpoints::new("http://localhost:8080", "acme").unwrap();
        let url = endpoints.admin_user("4b1f-99").unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/admin/realms/acme/users/4b1f-99"
        );
    }

    #[test]
    fn test_id_from_location() {
        assert_eq!(
            id_from_location("http://kc/admin/realms/acme/users/abc-123").as_deref(),
            Some("abc-123")
        );
        assert_eq!(
            id_from_location("http://kc/admin/realms/acme/users/abc-123/").as_deref(),
            Some("abc-123")
        );
        assert_eq!(id_from_location(""), None);
    }

    #[test]
    fn test_conflict_message() {
        assert_eq!(
            conflict_message(r#"{"errorMessage":"User exists with same username"}"#, "carol"),
            "User exists with same username"
        );
        assert_eq!(conflict_message("", "carol"), "user 'carol' already exists");
    }

    #[test]
    fn test_client_form_includes_secret_only_when_set() {
        let client = KeycloakClient::new(IdpConfig::default()).unwrap();
        let form = client.client_form(&[("token", "abc")]);
        assert_eq!(form, vec![("client_id", "admin-cli"), ("token", "abc")]);

        let config = IdpConfig::default().with_client("gw", Some("shh".into()));
        let client = KeycloakClient::new(config).unwrap();
        let form = client.client_form(&[("token", "abc")]);
        assert_eq!(
            form,
            vec![("client_id", "gw"), ("token", "abc"), ("client_secret", "shh")]
        );
    }
}
