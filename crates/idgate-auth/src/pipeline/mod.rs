//! Per-request authorization.
//!
//! The pipeline moves each request through
//! `Unauthenticated -> TokenExtracted -> Introspected -> Authorized`, or into
//! `Rejected` at any step. The default guard chain is:
//!
//! 1. [`PublicRouteGuard`] - public routes are authorized immediately
//! 2. [`BearerTokenGuard`] - read the bearer token
//! 3. [`IntrospectionGuard`] - ask the identity provider if the token is live
//! 4. [`ClaimsGuard`] - verify the token and build the [`Principal`]
//! 5. [`RoleGuard`] - enforce role-gated routes
//!
//! Introspection runs before claims are decoded, so an inactive token is
//! reported as inactive whatever it contains. The principal is always built
//! from the token's own claims, never from the introspection response.

pub mod guard;
pub mod principal;
pub mod route;

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::http::Method;

pub use guard::{
    BearerTokenGuard, ClaimsGuard, Guard, GuardContext, GuardOutcome, IntrospectionGuard,
    PublicRouteGuard, RoleGuard, extract_bearer,
};
pub use principal::Principal;
pub use route::{PathPattern, RouteAccess, RouteRule, RouteTable};

use crate::error::GatewayError;
use crate::idp::IdentityProvider;
use crate::token::TokenVerifier;

/// The parts of an inbound request the pipeline looks at.
#[derive(Debug, Clone)]
pub struct AuthRequest {
    pub method: Method,
    pub path: String,
    /// Raw `Authorization` header value.
    pub authorization: Option<String>,
}

impl AuthRequest {
    /// Request without an `Authorization` header.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            authorization: None,
        }
    }

    /// Sets the raw `Authorization` header value.
    #[must_use]
    pub fn with_authorization(mut self, value: impl Into<String>) -> Self {
        self.authorization = Some(value.into());
        self
    }
}

/// Pipeline position of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Unauthenticated,
    TokenExtracted,
    Introspected,
    Authorized,
    Rejected,
}

/// Why a request was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    MissingToken,
    InvalidToken(String),
    TokenInactive,
    UpstreamUnavailable(String),
    Forbidden { required: BTreeSet<String> },
}

impl Rejection {
    /// Reason code matching the equivalent [`GatewayError`].
    #[must_use]
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::MissingToken => "missing_token",
            Self::InvalidToken(_) => "invalid_token",
            Self::TokenInactive => "token_inactive",
            Self::UpstreamUnavailable(_) => "upstream_unavailable",
            Self::Forbidden { .. } => "forbidden",
        }
    }
}

impl From<Rejection> for GatewayError {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::MissingToken => Self::MissingToken,
            Rejection::InvalidToken(message) => Self::invalid_token(message),
            Rejection::TokenInactive => Self::TokenInactive,
            Rejection::UpstreamUnavailable(message) => Self::upstream_unavailable(message),
            Rejection::Forbidden { required } => Self::forbidden(format!(
                "requires one of: {}",
                required.into_iter().collect::<Vec<_>>().join(", ")
            )),
        }
    }
}

/// Successful authorization outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authorization {
    /// Public route; no principal.
    Public,
    /// Authenticated caller.
    Principal(Principal),
}

impl Authorization {
    /// The principal, if the route was not public.
    #[must_use]
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            Self::Public => None,
            Self::Principal(principal) => Some(principal),
        }
    }
}

/// Ordered guard chain applied to every request.
pub struct AuthorizationPipeline {
    routes: RouteTable,
    guards: Vec<Arc<dyn Guard>>,
}

impl AuthorizationPipeline {
    /// Pipeline with the default guard chain.
    #[must_use]
    pub fn new(
        routes: RouteTable,
        idp: Arc<dyn IdentityProvider>,
        verifier: Arc<TokenVerifier>,
    ) -> Self {
        Self::with_guards(
            routes,
            vec![
                Arc::new(PublicRouteGuard),
                Arc::new(BearerTokenGuard),
                Arc::new(IntrospectionGuard::new(idp)),
                Arc::new(ClaimsGuard::new(verifier)),
                Arc::new(RoleGuard),
            ],
        )
    }

    /// Pipeline with a custom guard chain.
    #[must_use]
    pub fn with_guards(routes: RouteTable, guards: Vec<Arc<dyn Guard>>) -> Self {
        Self { routes, guards }
    }

    /// The route table in use.
    #[must_use]
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Runs the guard chain.
    ///
    /// # Errors
    ///
    /// Returns the [`Rejection`] of the first guard that rejects.
    pub async fn authorize(&self, request: &AuthRequest) -> Result<Authorization, Rejection> {
        let access = self.routes.resolve(&request.method, &request.path);
        let mut ctx = GuardContext::new(request, access);

        for guard in &self.guards {
            match guard.check(&mut ctx).await {
                GuardOutcome::Continue => {}
                GuardOutcome::Authorized => return Ok(finish(ctx)),
                GuardOutcome::Reject(rejection) => {
                    ctx.state = PipelineState::Rejected;
                    tracing::debug!(
                        method = %request.method,
                        path = %request.path,
                        guard = guard.name(),
                        reason = rejection.reason_code(),
                        "Request rejected"
                    );
                    return Err(rejection);
                }
            }
        }

        if ctx.principal.is_none() {
            return Err(Rejection::InvalidToken(
                "no principal established".to_string(),
            ));
        }
        Ok(finish(ctx))
    }
}

fn finish(ctx: GuardContext<'_>) -> Authorization {
    match ctx.principal {
        Some(principal) => {
            tracing::debug!(
                subject = %principal.subject,
                username = %principal.username,
                "Request authorized"
            );
            Authorization::Principal(principal)
        }
        None => Authorization::Public,
    }
}

// =============================================================================
// Tests
// =============================================================================
