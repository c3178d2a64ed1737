//! Authorization middleware and principal extractor.
//!
//! # Example
//!
//! ```ignore
//! use axum::{Router, middleware, routing::get};
//! use idgate_auth::middleware::{CurrentPrincipal, authorization_middleware};
//!
//! async fn whoami(CurrentPrincipal(principal): CurrentPrincipal) -> String {
//!     principal.username
//! }
//!
//! let app = Router::new()
//!     .route("/whoami", get(whoami))
//!     .layer(middleware::from_fn_with_state(pipeline, authorization_middleware));
//! ```

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::GatewayError;
use crate::pipeline::{AuthRequest, Authorization, AuthorizationPipeline, Principal};

/// Runs the authorization pipeline for every request.
///
/// On success the [`Principal`] (if any) is stored in the request
/// extensions; on rejection the matching error response is returned.
pub async fn authorization_middleware(
    State(pipeline): State<Arc<AuthorizationPipeline>>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth_request = auth_request_from(&request);

    match pipeline.authorize(&auth_request).await {
        Ok(Authorization::Principal(principal)) => {
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        Ok(Authorization::Public) => next.run(request).await,
        Err(rejection) => GatewayError::from(rejection).into_response(),
    }
}

fn auth_request_from(request: &Request) -> AuthRequest {
    let auth_request = AuthRequest::new(request.method().clone(), request.uri().path());
    match request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
    {
        Some(value) => auth_request.with_authorization(value),
        None => auth_request,
    }
}

/// Extractor for the principal established by [`authorization_middleware`].
///
/// Rejects with `MissingToken` on routes where no principal was attached.
#[derive(Debug, Clone)]
pub struct CurrentPrincipal(pub Principal);

impl<S> FromRequestParts<S> for CurrentPrincipal
where
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .map(CurrentPrincipal)
            .ok_or_else(|| {
                tracing::debug!("No principal attached to request");
                GatewayError::MissingToken
            })
    }
}
