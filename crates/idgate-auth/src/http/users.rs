//! `/users/*` handlers.

use std::collections::BTreeSet;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::GatewayState;
use crate::error::GatewayResult;
use crate::middleware::CurrentPrincipal;
use crate::storage::{ProfileFields, ProfileSummary, UserProfile};

/// Self-registration body.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(flatten)]
    pub fields: ProfileFields,
    pub password: String,
}

/// Administrative creation body. Omitted roles fall back to the defaults.
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    #[serde(flatten)]
    pub fields: ProfileFields,
    pub password: String,
    #[serde(default)]
    pub roles: Option<BTreeSet<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub is_active: bool,
}

#[derive(Debug, Serialize)]
pub(super) struct SummaryBody {
    message: &'static str,
    user: ProfileSummary,
}

#[derive(Debug, Serialize)]
pub(super) struct ProfileBody {
    message: &'static str,
    user: UserProfile,
}

#[derive(Debug, Serialize)]
pub(super) struct ProfileListBody {
    message: &'static str,
    users: Vec<UserProfile>,
}

#[derive(Debug, Serialize)]
pub(super) struct MessageBody {
    message: &'static str,
}

/// POST /users/register
pub(super) async fn register(
    State(state): State<GatewayState>,
    Json(request): Json<RegisterRequest>,
) -> GatewayResult<(StatusCode, Json<SummaryBody>)> {
    let profile = state
        .coordinator
        .register(request.fields, &request.password)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SummaryBody {
            message: "User registered successfully",
            user: profile.summary(),
        }),
    ))
}

/// GET /users/profile
pub(super) async fn profile(
    State(state): State<GatewayState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> GatewayResult<Json<ProfileBody>> {
    let profile = state
        .coordinator
        .find_by_username(&principal.username)
        .await?;

    Ok(Json(ProfileBody {
        message: "Profile retrieved successfully",
        user: profile,
    }))
}

/// POST /users
pub(super) async fn create_user(
    State(state): State<GatewayState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Json(request): Json<CreateUserRequest>,
) -> GatewayResult<(StatusCode, Json<ProfileBody>)> {
    let profile = state
        .coordinator
        .create_user(request.fields, &request.password, request.roles)
        .await?;
    tracing::info!(
        admin = %principal.username,
        user_id = %profile.id,
        "User created by administrator"
    );

    Ok((
        StatusCode::CREATED,
        Json(ProfileBody {
            message: "User created successfully",
            user: profile,
        }),
    ))
}

/// GET /users
pub(super) async fn list_users(
    State(state): State<GatewayState>,
) -> GatewayResult<Json<ProfileListBody>> {
    let users = state.coordinator.list_users().await?;
    Ok(Json(ProfileListBody {
        message: "Users retrieved successfully",
        users,
    }))
}

/// GET /users/{id}
pub(super) async fn get_user(
    State(state): State<GatewayState>,
    Path(id): Path<Uuid>,
) -> GatewayResult<Json<ProfileBody>> {
    let profile = state.coordinator.get_user(id).await?;
    Ok(Json(ProfileBody {
        message: "User retrieved successfully",
        user: profile,
    }))
}

/// DELETE /users/{id}
pub(super) async fn delete_user(
    State(state): State<GatewayState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<Uuid>,
) -> GatewayResult<Json<MessageBody>> {
    state.coordinator.delete_user(id).await?;
    tracing::info!(admin = %principal.username, user_id = %id, "User deleted by administrator");

    Ok(Json(MessageBody {
        message: "User deleted successfully",
    }))
}

/// PATCH /users/{id}/status
pub(super) async fn update_status(
    State(state): State<GatewayState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> GatewayResult<Json<ProfileBody>> {
    let profile = state.coordinator.set_active(id, request.is_active).await?;
    Ok(Json(ProfileBody {
        message: "User status updated successfully",
        user: profile,
    }))
}
