//! Infrastructure layer: configuration and storage adapters.

pub mod config;
pub mod store;

pub use config::{AppConfig, ConfigError};
pub use store::{
    addresses::AddressStore,
    credentials::CredentialStore,
    memory::{InMemoryAddressStore, InMemoryCredentialStore},
    postgres::{apply_schema, PostgresAddressStore, PostgresCredentialStore},
    StoreError,
};
