//! Axum integration for the authorization pipeline.
//!
//! - [`authorization_middleware`] - runs the pipeline per request
//! - [`CurrentPrincipal`] - extracts the authenticated caller in handlers
//! - `IntoResponse` for [`GatewayError`](crate::error::GatewayError)

mod auth;
mod error;

pub use auth::{CurrentPrincipal, authorization_middleware};
pub use error::status_code;
