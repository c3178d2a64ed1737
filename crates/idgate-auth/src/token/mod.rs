//! Bearer token handling.
//!
//! - [`TokenVerifier`] - signature, expiry and issuer checks
//! - [`AccessTokenClaims`] - the claims the gateway reads
//! - [`RealmKeySet`] - cached realm signing keys

pub mod claims;
pub mod jwks;
pub mod verifier;

pub use claims::{AccessTokenClaims, RealmAccess};
pub use jwks::{JwksError, RealmKeySet};
pub use verifier::{TokenError, TokenVerifier};
