//! Request guards.
//!
//! Each guard inspects the [`GuardContext`], may enrich it, and either lets
//! the next guard run, ends the chain successfully, or rejects the request.

use std::sync::Arc;

use async_trait::async_trait;

use super::principal::Principal;
use super::route::RouteAccess;
use super::{AuthRequest, PipelineState, Rejection};
use crate::idp::IdentityProvider;
use crate::token::TokenVerifier;

/// Mutable per-request state threaded through the guards.
#[derive(Debug)]
pub struct GuardContext<'a> {
    pub request: &'a AuthRequest,
    pub access: &'a RouteAccess,
    pub state: PipelineState,
    pub token: Option<String>,
    pub principal: Option<Principal>,
}

impl<'a> GuardContext<'a> {
    /// Fresh context in the `Unauthenticated` state.
    #[must_use]
    pub fn new(request: &'a AuthRequest, access: &'a RouteAccess) -> Self {
        Self {
            request,
            access,
            state: PipelineState::Unauthenticated,
            token: None,
            principal: None,
        }
    }
}

/// Result of a single guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    /// Run the next guard.
    Continue,
    /// Stop and authorize the request.
    Authorized,
    /// Stop and reject the request.
    Reject(Rejection),
}

/// A step of the authorization pipeline.
#[async_trait]
pub trait Guard: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Evaluates the guard.
    async fn check(&self, ctx: &mut GuardContext<'_>) -> GuardOutcome;
}

// =============================================================================
// Public routes
// =============================================================================

/// Authorizes public routes without looking at the request further.
#[derive(Debug, Default)]
pub struct PublicRouteGuard;

#[async_trait]
impl Guard for PublicRouteGuard {
    fn name(&self) -> &'static str {
        "public_route"
    }

    async fn check(&self, ctx: &mut GuardContext<'_>) -> GuardOutcome {
        if ctx.access.is_public() {
            GuardOutcome::Authorized
        } else {
            GuardOutcome::Continue
        }
    }
}

// =============================================================================
// Bearer extraction
// =============================================================================

/// Reads the bearer token from the `Authorization` header.
#[derive(Debug, Default)]
pub struct BearerTokenGuard;

/// Extracts the token from an `Authorization: Bearer <token>` value.
///
/// The scheme is matched case-insensitively.
#[must_use]
pub fn extract_bearer(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[async_trait]
impl Guard for BearerTokenGuard {
    fn name(&self) -> &'static str {
        "bearer_token"
    }

    async fn check(&self, ctx: &mut GuardContext<'_>) -> GuardOutcome {
        match ctx.request.authorization.as_deref().and_then(extract_bearer) {
            Some(token) => {
                ctx.token = Some(token.to_string());
                ctx.state = PipelineState::TokenExtracted;
                GuardOutcome::Continue
            }
            None => GuardOutcome::Reject(Rejection::MissingToken),
        }
    }
}

// =============================================================================
// Introspection
// =============================================================================

/// Confirms with the identity provider that the token is still active.
pub struct IntrospectionGuard {
    idp: Arc<dyn IdentityProvider>,
}

impl IntrospectionGuard {
    /// Creates the guard.
    #[must_use]
    pub fn new(idp: Arc<dyn IdentityProvider>) -> Self {
        Self { idp }
    }
}

#[async_trait]
impl Guard for IntrospectionGuard {
    fn name(&self) -> &'static str {
        "introspection"
    }

    async fn check(&self, ctx: &mut GuardContext<'_>) -> GuardOutcome {
        let Some(token) = ctx.token.as_deref() else {
            return GuardOutcome::Reject(Rejection::MissingToken);
        };

        match self.idp.introspect_token(token).await {
            Ok(result) if result.active => {
                ctx.state = PipelineState::Introspected;
                GuardOutcome::Continue
            }
            Ok(_) => GuardOutcome::Reject(Rejection::TokenInactive),
            Err(err) => {
                tracing::warn!(error = %err, "Token introspection failed");
                GuardOutcome::Reject(Rejection::UpstreamUnavailable(err.to_string()))
            }
        }
    }
}

// =============================================================================
// Claims
// =============================================================================

/// Builds the principal from the token's own verified claims.
pub struct ClaimsGuard {
    verifier: Arc<TokenVerifier>,
}

impl ClaimsGuard {
    /// Creates the guard.
    #[must_use]
    pub fn new(verifier: Arc<TokenVerifier>) -> Self {
        Self { verifier }
    }
}

#[async_trait]
impl Guard for ClaimsGuard {
    fn name(&self) -> &'static str {
        "claims"
    }

    async fn check(&self, ctx: &mut GuardContext<'_>) -> GuardOutcome {
        let Some(token) = ctx.token.as_deref() else {
            return GuardOutcome::Reject(Rejection::MissingToken);
        };

        match self.verifier.verify(token).await {
            Ok(claims) => {
                ctx.principal = Some(Principal::from_claims(&claims));
                ctx.state = PipelineState::Authorized;
                GuardOutcome::Continue
            }
            Err(err) if err.is_upstream() => {
                GuardOutcome::Reject(Rejection::UpstreamUnavailable(err.to_string()))
            }
            Err(err) => GuardOutcome::Reject(Rejection::InvalidToken(err.to_string())),
        }
    }
}

// =============================================================================
// Roles
// =============================================================================

/// Enforces role-gated routes.
#[derive(Debug, Default)]
pub struct RoleGuard;

#[async_trait]
impl Guard for RoleGuard {
    fn name(&self) -> &'static str {
        "role"
    }

    async fn check(&self, ctx: &mut GuardContext<'_>) -> GuardOutcome {
        let RouteAccess::AnyRole(required) = ctx.access else {
            return GuardOutcome::Continue;
        };

        match &ctx.principal {
            Some(principal) if principal.has_any_role(required) => GuardOutcome::Continue,
            Some(_) => GuardOutcome::Reject(Rejection::Forbidden {
                required: required.clone(),
            }),
            None => GuardOutcome::Reject(Rejection::MissingToken),
        }
    }
}
