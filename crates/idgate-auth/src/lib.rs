//! # idgate-auth
//!
//! Identity federation and request authorization for the IdGate gateway.
//!
//! This crate provides:
//! - A client for a Keycloak-compatible identity provider
//! - User lifecycle coordination across the provider and the local profile store
//! - Password login and logout
//! - A per-request authorization pipeline turning bearer tokens into principals
//!
//! ## Modules
//!
//! - [`config`] - Identity provider, token and user settings
//! - [`idp`] - Identity provider client and admin credential cache
//! - [`token`] - Access token claims and signature verification
//! - [`storage`] - Profile and reconciliation storage traits
//! - [`users`] - Two-step user creation and deletion
//! - [`gateway`] - Login and logout
//! - [`pipeline`] - Guard chain for request authorization
//! - [`middleware`] - Axum middleware and extractors
//! - [`http`] - Axum HTTP handlers

pub mod config;
pub mod error;
pub mod gateway;
pub mod http;
pub mod idp;
pub mod middleware;
pub mod pipeline;
pub mod storage;
pub mod token;
pub mod users;

#[cfg(test)]
mod testing;

pub use config::{ConfigError, GatewayConfig, IdpConfig, TokenConfig, UsersConfig};
pub use error::{GatewayError, GatewayResult};
pub use gateway::{AuthenticationGateway, LoginResponse};
pub use http::{GatewayState, default_route_table, router};
pub use idp::{IdentityProvider, IdpError, KeycloakClient};
pub use middleware::{CurrentPrincipal, authorization_middleware};
pub use pipeline::{AuthRequest, Authorization, AuthorizationPipeline, Principal, Rejection};
pub use storage::{
    MemoryProfileStore, MemoryReconciliationLog, ProfileFields, ProfileStore, ReconciliationLog,
    StorageError, UserProfile,
};
pub use token::TokenVerifier;
pub use users::UserLifecycleCoordinator;
