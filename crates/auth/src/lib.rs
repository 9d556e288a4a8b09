//! `profilehub-auth`: authentication and authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage: it mints and
//! checks tokens, hashes passwords, and answers "may this principal do that?".

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod password;
pub mod principal;

pub use authorize::{AuthzError, ensure_active, ensure_owner_or_superuser, ensure_superuser};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256Jwt, JwtValidator, TokenError, TokenIssuer};
pub use password::{PasswordError, hash_password, verify_password};
pub use principal::Principal;
