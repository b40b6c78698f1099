//! `pvz-auth` — authentication/authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage: it knows the
//! two roles, which role may perform which action, how passwords are hashed,
//! and how bearer tokens are minted and verified.

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod password;
pub mod roles;
pub mod user;

pub use authorize::{Action, AuthzError, authorize};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256Jwt, JwtIssuer, JwtValidator, TokenError};
pub use password::{PasswordError, PasswordHasher, check_password_policy};
pub use roles::Role;
pub use user::{Email, User};
