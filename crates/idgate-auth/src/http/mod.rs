//! Axum HTTP handlers for the gateway endpoints.
//!
//! # Usage
//!
//! ```ignore
//! use idgate_auth::http::{GatewayState, router};
//!
//! let app = router(GatewayState::new(coordinator, gateway, pipeline));
//! ```
//!
//! Every route is served behind [`authorization_middleware`]; access rules
//! come from [`default_route_table`].

mod auth;
mod users;

use std::sync::Arc;

use axum::{
    Router,
    http::Method,
    middleware,
    routing::{get, patch, post},
};

pub use auth::{LoginRequest, LogoutRequest};
pub use users::{CreateUserRequest, RegisterRequest, UpdateStatusRequest};

use crate::gateway::AuthenticationGateway;
use crate::middleware::authorization_middleware;
use crate::pipeline::{AuthorizationPipeline, RouteTable};
use crate::users::UserLifecycleCoordinator;

/// Roles allowed on administrative user routes.
pub const ADMIN_ROLES: [&str; 2] = ["superadmin", "admin"];

/// Shared state for the gateway handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub coordinator: Arc<UserLifecycleCoordinator>,
    pub gateway: Arc<AuthenticationGateway>,
    pub pipeline: Arc<AuthorizationPipeline>,
}

impl GatewayState {
    #[must_use]
    pub fn new(
        coordinator: Arc<UserLifecycleCoordinator>,
        gateway: Arc<AuthenticationGateway>,
        pipeline: Arc<AuthorizationPipeline>,
    ) -> Self {
        Self {
            coordinator,
            gateway,
            pipeline,
        }
    }
}

/// Access rules for the routes served by [`router`].
///
/// `/users/profile` is listed before `/users/{id}` so it is not taken for an
/// id lookup.
#[must_use]
pub fn default_route_table() -> RouteTable {
    RouteTable::new()
        .public(Method::GET, "/healthz")
        .public(Method::POST, "/auth/login")
        .public(Method::POST, "/users/register")
        .authenticated(Method::POST, "/auth/logout")
        .authenticated(Method::POST, "/auth/verify")
        .authenticated(Method::GET, "/users/profile")
        .any_role(Method::POST, "/users", ADMIN_ROLES)
        .any_role(Method::GET, "/users", ADMIN_ROLES)
        .any_role(Method::GET, "/users/{id}", ADMIN_ROLES)
        .any_role(Method::DELETE, "/users/{id}", ADMIN_ROLES)
        .any_role(Method::PATCH, "/users/{id}/status", ADMIN_ROLES)
}

/// Builds the gateway router with the authorization layer applied.
pub fn router(state: GatewayState) -> Router {
    let pipeline = state.pipeline.clone();

    Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/verify", post(auth::verify))
        .route("/users/register", post(users::register))
        .route("/users/profile", get(users::profile))
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/users/{id}", get(users::get_user).delete(users::delete_user))
        .route("/users/{id}/status", patch(users::update_status))
        .layer(middleware::from_fn_with_state(
            pipeline,
            authorization_middleware,
        ))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::config::UsersConfig;
    use crate::storage::{MemoryProfileStore, MemoryReconciliationLog, ProfileStore};
    use crate::testing::{FakeIdentityProvider, TEST_SECRET, sign_token};
    use crate::token::TokenVerifier;

    struct Harness {
        app: Router,
        idp: Arc<FakeIdentityProvider>,
        store: Arc<MemoryProfileStore>,
    }

    fn harness() -> Harness {
        let idp = Arc::new(FakeIdentityProvider::new());
        let store = Arc::new(MemoryProfileStore::new());
        let coordinator = Arc::new(UserLifecycleCoordinator::new(
            idp.clone(),
            store.clone(),
            Arc::new(MemoryReconciliationLog::new()),
            UsersConfig::default(),
        ));
        let gateway = Arc::new(AuthenticationGateway::new(idp.clone(), store.clone()));
        let pipeline = Arc::new(AuthorizationPipeline::new(
            default_route_table(),
            idp.clone(),
            Arc::new(TokenVerifier::hs256(TEST_SECRET)),
        ));

        Harness {
            app: router(GatewayState::new(coordinator, gateway, pipeline)),
            idp,
            store,
        }
    }

    fn bearer(idp: &FakeIdentityProvider, username: &str, roles: &[&str]) -> String {
        let token = sign_token(&format!("sub-{username}"), username, roles);
        idp.activate(&token);
        format!("Bearer {token}")
    }

    fn json_request(method: Method, uri: &str, auth: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(auth) = auth {
            builder = builder.header(header::AUTHORIZATION, auth);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let h = harness();

        let response = h
            .app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/users/register",
                None,
                json!({
                    "username": "alice",
                    "email": "alice@example.com",
                    "firstName": "Alice",
                    "password": "secret"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["message"], "User registered successfully");
        assert_eq!(body["user"]["username"], "alice");
        assert_eq!(body["user"]["firstName"], "Alice");

        let response = h
            .app
            .oneshot(json_request(
                Method::POST,
                "/auth/login",
                None,
                json!({ "username": "alice", "password": "secret" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Login successful");
        assert_eq!(body["access_token"], "access-alice");
        assert_eq!(body["user"]["roles"], json!(["user"]));
    }

    #[tokio::test]
    async fn test_login_without_profile_is_404() {
        let h = harness();
        h.idp.seed("bob", "secret");

        let response = h
            .app
            .oneshot(json_request(
                Method::POST,
                "/auth/login",
                None,
                json!({ "username": "bob", "password": "secret" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], "profile_not_found");
    }

    #[tokio::test]
    async fn test_protected_route_requires_token() {
        let h = harness();
        let response = h
            .app
            .oneshot(
                Request::builder()
                    .uri("/users/profile")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));
    }

    #[tokio::test]
    async fn test_inactive_token_rejected() {
        let h = harness();
        let token = sign_token("sub-alice", "alice", &["user"]);

        let response = h
            .app
            .oneshot(json_request(
                Method::POST,
                "/auth/verify",
                Some(&format!("Bearer {token}")),
                json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"], "token_inactive");
    }

    #[tokio::test]
    async fn test_verify_returns_principal() {
        let h = harness();
        let auth = bearer(&h.idp, "alice", &["user"]);

        let response = h
            .app
            .oneshot(json_request(Method::POST, "/auth/verify", Some(&auth), json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Token is valid");
        assert_eq!(body["user"]["username"], "alice");
    }

    #[tokio::test]
    async fn test_user_role_cannot_list_users() {
        let h = harness();
        let auth = bearer(&h.idp, "alice", &["user"]);

        let response = h
            .app
            .oneshot(
                Request::builder()
                    .uri("/users")
                    .header(header::AUTHORIZATION, auth)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_admin_create_list_and_delete() {
        let h = harness();
        let auth = bearer(&h.idp, "root", &["admin"]);

        let response = h
            .app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/users",
                Some(&auth),
                json!({
                    "username": "dave",
                    "email": "dave@example.com",
                    "password": "pw",
                    "roles": ["admin", "user"]
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["message"], "User created successfully");
        assert_eq!(body["user"]["roles"], json!(["admin", "user"]));
        let id = body["user"]["id"].as_str().unwrap().to_string();

        let response = h
            .app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/users")
                    .header(header::AUTHORIZATION, &auth)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["users"].as_array().unwrap().len(), 1);

        let response = h
            .app
            .oneshot(
                Request::builder()
                    .method(Method::DELETE)
                    .uri(format!("/users/{id}"))
                    .header(header::AUTHORIZATION, &auth)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["message"], "User deleted successfully");
        assert!(h.store.list().await.unwrap().is_empty());
        assert_eq!(h.idp.identity_count(), 0);
    }

    #[tokio::test]
    async fn test_profile_of_caller() {
        let h = harness();
        h.app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/users/register",
                None,
                json!({ "username": "erin", "email": "erin@example.com", "password": "pw" }),
            ))
            .await
            .unwrap();
        let auth = bearer(&h.idp, "erin", &["user"]);

        let response = h
            .app
            .oneshot(
                Request::builder()
                    .uri("/users/profile")
                    .header(header::AUTHORIZATION, auth)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Profile retrieved successfully");
        assert_eq!(body["user"]["isActive"], true);
    }

    #[tokio::test]
    async fn test_update_status() {
        let h = harness();
        let auth = bearer(&h.idp, "root", &["superadmin"]);
        let response = h
            .app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/users/register",
                None,
                json!({ "username": "frank", "email": "frank@example.com", "password": "pw" }),
            ))
            .await
            .unwrap();
        let id = body_json(response).await["user"]["id"]
            .as_str()
            .unwrap()
            .to_string();

        let response = h
            .app
            .oneshot(json_request(
                Method::PATCH,
                &format!("/users/{id}/status"),
                Some(&auth),
                json!({ "isActive": false }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["user"]["isActive"], false);
    }
}
