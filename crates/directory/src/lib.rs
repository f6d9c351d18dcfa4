//! Address directory domain module.
//!
//! This crate contains the rules for postal address records, implemented purely
//! as deterministic domain logic (no IO, no HTTP, no storage).

pub mod address;
pub mod search;

pub use address::{Address, AddressDraft};
pub use search::{AddressSearch, SearchText};
