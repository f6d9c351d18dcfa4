//! `addressbook-auth` — credentials, tokens and role checks.
//!
//! This crate is decoupled from HTTP and storage: persistence reaches it only
//! through the `TokenBlacklist` capability.

pub mod authorize;
pub mod claims;
pub mod password;
pub mod principal;
pub mod roles;
pub mod token;
pub mod user;

pub use authorize::{require_role, AuthzError};
pub use claims::{validate_claims, AccessClaims};
pub use password::{Argon2Hasher, CredentialHasher, PasswordError};
pub use principal::Principal;
pub use roles::{Role, RoleDefinition};
pub use token::{
    read_expiry_unverified, BlacklistError, IssuedToken, TokenBlacklist, TokenError, TokenService,
    TokenSettings,
};
pub use user::{NewUser, Registration, User};
