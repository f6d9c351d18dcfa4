//! `addressbook-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod error;
pub mod id;
pub mod pagination;

pub use error::{require_present, DomainError, DomainResult};
pub use id::{AddressId, RoleId, UserId};
pub use pagination::{Page, PageRequest};
