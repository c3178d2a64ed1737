//! Full router against a mock identity provider.

use std::time::{SystemTime, UNIX_EPOCH};

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::{Value, json};
use tower::ServiceExt;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use idgate_auth::IdpConfig;
use idgate_server::{AppConfig, build_app, build_state};

const SECRET: &str = "e2e-signing-secret";
const TOKEN_PATH: &str = "/realms/demo/protocol/openid-connect/token";
const INTROSPECT_PATH: &str = "/realms/demo/protocol/openid-connect/token/introspect";
const USERS_PATH: &str = "/admin/realms/demo/users";

fn sign(sub: &str, username: &str, roles: &[&str]) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs();
    let claims = json!({
        "sub": sub,
        "preferred_username": username,
        "email": format!("{username}@example.com"),
        "realm_access": { "roles": roles },
        "iat": now,
        "exp": now + 300,
    });
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

async fn app_for(server: &MockServer) -> Router {
    let mut cfg = AppConfig::default();
    cfg.auth.idp = IdpConfig::new(server.uri(), "demo").with_client("gateway", None);
    cfg.auth.token.secret = SECRET.to_string();

    let state = build_state(&cfg).await.unwrap();
    build_app(&cfg, state)
}

async fn mount_admin_grant(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("username=admin"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "admin-token",
            "expires_in": 300
        })))
        .mount(server)
        .await;
}

async fn mount_active(server: &MockServer, token: &str) {
    Mock::given(method("POST"))
        .and(path(INTROSPECT_PATH))
        .and(body_string_contains(format!("token={token}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "active": true })))
        .mount(server)
        .await;
}

async fn mount_inactive_fallback(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(INTROSPECT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "active": false })))
        .mount(server)
        .await;
}

fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn healthz_is_public_and_carries_request_id() {
    let server = MockServer::start().await;
    let app = app_for(&server).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .header("x-request-id", "req-42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-request-id"], "req-42");
    assert_eq!(json_body(response).await["status"], "ok");
}

#[tokio::test]
async fn register_login_verify_profile_logout() {
    let server = MockServer::start().await;
    mount_admin_grant(&server).await;

    Mock::given(method("POST"))
        .and(path(USERS_PATH))
        .respond_with(ResponseTemplate::new(201).insert_header(
            "Location",
            format!("{}{USERS_PATH}/ext-carol", server.uri()).as_str(),
        ))
        .expect(1)
        .mount(&server)
        .await;

    let access_token = sign("ext-carol", "carol", &["user"]);
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("username=carol"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": access_token,
            "refresh_token": "rt-carol",
            "expires_in": 300,
            "token_type": "Bearer"
        })))
        .mount(&server)
        .await;
    mount_active(&server, &access_token).await;
    mount_inactive_fallback(&server).await;

    Mock::given(method("POST"))
        .and(path("/realms/demo/protocol/openid-connect/logout"))
        .and(body_string_contains("refresh_token=rt-carol"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let app = app_for(&server).await;

    // Register
    let response = app
        .clone()
        .oneshot(request(
            Method::POST,
            "/users/register",
            None,
            Some(json!({ "username": "carol", "email": "c@x.com", "password": "pw" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;
    assert_eq!(body["user"]["externalId"], "ext-carol");

    // Login
    let response = app
        .clone()
        .oneshot(request(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "username": "carol", "password": "pw" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["user"]["username"], "carol");
    assert_eq!(body["refresh_token"], "rt-carol");
    let token = body["access_token"].as_str().unwrap().to_string();

    // Verify
    let response = app
        .clone()
        .oneshot(request(Method::POST, "/auth/verify", Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["user"]["roles"], json!(["user"]));

    // Profile
    let response = app
        .clone()
        .oneshot(request(Method::GET, "/users/profile", Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["user"]["email"], "c@x.com");

    // Role-gated route
    let response = app
        .clone()
        .oneshot(request(Method::GET, "/users", Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Logout
    let response = app
        .oneshot(request(
            Method::POST,
            "/auth/logout",
            Some(&token),
            Some(json!({ "refresh_token": "rt-carol" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["message"], "Logout successful");
}

#[tokio::test]
async fn inactive_token_is_rejected() {
    let server = MockServer::start().await;
    mount_inactive_fallback(&server).await;
    let app = app_for(&server).await;

    let token = sign("ext-dave", "dave", &["admin"]);
    let response = app
        .oneshot(request(Method::GET, "/users", Some(&token), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["error"], "token_inactive");
}

#[tokio::test]
async fn introspection_outage_is_bad_gateway() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(INTROSPECT_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let app = app_for(&server).await;

    let token = sign("ext-dave", "dave", &["admin"]);
    let response = app
        .oneshot(request(Method::GET, "/users", Some(&token), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(json_body(response).await["error"], "upstream_unavailable");
}

#[tokio::test]
async fn duplicate_registration_is_conflict() {
    let server = MockServer::start().await;
    mount_admin_grant(&server).await;
    Mock::given(method("POST"))
        .and(path(USERS_PATH))
        .respond_with(
            ResponseTemplate::new(409)
                .set_body_json(json!({ "errorMessage": "User exists with same username" })),
        )
        .mount(&server)
        .await;
    let app = app_for(&server).await;

    let response = app
        .oneshot(request(
            Method::POST,
            "/users/register",
            None,
            Some(json!({ "username": "carol", "email": "c@x.com", "password": "pw" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(json_body(response).await["error"], "identity_conflict");
}

#[tokio::test]
async fn admin_deletes_user_across_both_systems() {
    let server = MockServer::start().await;
    mount_admin_grant(&server).await;
    Mock::given(method("POST"))
        .and(path(USERS_PATH))
        .respond_with(ResponseTemplate::new(201).insert_header(
            "Location",
            format!("{}{USERS_PATH}/ext-erin", server.uri()).as_str(),
        ))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("{USERS_PATH}/ext-erin")))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let admin_token = sign("ext-root", "root", &["superadmin"]);
    mount_active(&server, &admin_token).await;
    let app = app_for(&server).await;

    let response = app
        .clone()
        .oneshot(request(
            Method::POST,
            "/users",
            Some(&admin_token),
            Some(json!({
                "username": "erin",
                "email": "erin@example.com",
                "password": "pw",
                "roles": ["admin"]
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let id = json_body(response).await["user"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .clone()
        .oneshot(request(
            Method::DELETE,
            &format!("/users/{id}"),
            Some(&admin_token),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(request(
            Method::GET,
            &format!("/users/{id}"),
            Some(&admin_token),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
