//! `cakestore-auth`: stateless authentication/access-control boundary.
//!
//! This crate is decoupled from HTTP and storage: it decides *which* requests
//! need a credential, mints/validates bearer tokens, and hashes passwords.
//! Looking users up is the caller's job.

pub mod access;
pub mod claims;
pub mod jwt;
pub mod password;
pub mod user;

pub use access::{Access, AccessPolicy, AccessRule, PathPattern};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256Jwt, IssuedToken, JwtValidator, TokenError};
pub use password::{PasswordError, PasswordHasher};
pub use user::{Credentials, User};
