//! Error response handling.
//!
//! Implements `IntoResponse` for `GatewayError` so handlers and middleware
//! can return it directly. Bodies are `{ "error": <reason code>, "message": ... }`.

use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::error::GatewayError;

// =============================================================================
// IntoResponse Implementation
// =============================================================================

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = status_code(&self);
        let code = self.reason_code();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(error = code, message = %message, "Request failed");
        }

        let mut headers = HeaderMap::new();
        if status == StatusCode::UNAUTHORIZED {
            let www_auth = build_www_authenticate_header(code, &message);
            if let Ok(value) = HeaderValue::from_str(&www_auth) {
                headers.insert(header::WWW_AUTHENTICATE, value);
            }
        }

        let body = json!({
            "error": code,
            "message": message,
        });

        (status, headers, Json(body)).into_response()
    }
}

/// HTTP status for each error kind.
pub fn status_code(error: &GatewayError) -> StatusCode {
    match error {
        GatewayError::InvalidCredentials
        | GatewayError::MissingToken
        | GatewayError::InvalidToken { .. }
        | GatewayError::TokenInactive => StatusCode::UNAUTHORIZED,
        GatewayError::Forbidden { .. } => StatusCode::FORBIDDEN,
        GatewayError::ProfileNotFound { .. } | GatewayError::NotFound { .. } => {
            StatusCode::NOT_FOUND
        }
        GatewayError::IdentityConflict { .. } => StatusCode::CONFLICT,
        GatewayError::UpstreamUnavailable { .. }
        | GatewayError::UpstreamAuthFailure { .. }
        | GatewayError::LogoutFailure { .. } => StatusCode::BAD_GATEWAY,
        GatewayError::InternalInconsistency { .. }
        | GatewayError::Storage { .. }
        | GatewayError::Configuration { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Builds the WWW-Authenticate header value for 401 responses.
fn build_www_authenticate_header(error_code: &str, description: &str) -> String {
    let escaped = description.replace('\\', "\\\\").replace('"', "\\\"");
    format!(r#"Bearer error="{error_code}", error_description="{escaped}""#)
}

// =============================================================================
// Tests
// =============================================================================
