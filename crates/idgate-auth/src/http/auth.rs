//! `/auth/*` handlers.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use super::GatewayState;
use crate::error::GatewayResult;
use crate::gateway::LoginResponse;
use crate::middleware::CurrentPrincipal;
use crate::pipeline::Principal;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub(super) struct LoginBody {
    message: &'static str,
    #[serde(flatten)]
    login: LoginResponse,
}

#[derive(Debug, Serialize)]
pub(super) struct MessageBody {
    message: &'static str,
}

#[derive(Debug, Serialize)]
pub(super) struct VerifyBody {
    message: &'static str,
    user: Principal,
}

/// POST /auth/login
pub(super) async fn login(
    State(state): State<GatewayState>,
    Json(request): Json<LoginRequest>,
) -> GatewayResult<Json<LoginBody>> {
    let login = state
        .gateway
        .login(&request.username, &request.password)
        .await?;

    Ok(Json(LoginBody {
        message: "Login successful",
        login,
    }))
}

/// POST /auth/logout
pub(super) async fn logout(
    State(state): State<GatewayState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Json(request): Json<LogoutRequest>,
) -> GatewayResult<Json<MessageBody>> {
    state.gateway.logout(&request.refresh_token).await?;
    tracing::info!(username = %principal.username, "User logged out");

    Ok(Json(MessageBody {
        message: "Logout successful",
    }))
}

/// POST /auth/verify
pub(super) async fn verify(CurrentPrincipal(principal): CurrentPrincipal) -> Json<VerifyBody> {
    Json(VerifyBody {
        message: "Token is valid",
        user: principal,
    })
}
