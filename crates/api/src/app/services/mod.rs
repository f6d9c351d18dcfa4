//! Service wiring: stores, token service and the three request-facing services.

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;

use addressbook_auth::{Argon2Hasher, Role, TokenService};
use addressbook_infra::{
    apply_schema, AddressStore, AppConfig, CredentialStore, InMemoryAddressStore,
    InMemoryCredentialStore, PostgresAddressStore, PostgresCredentialStore, StoreError,
};

pub mod addresses;
pub mod admin;
pub mod auth;

pub use addresses::AddressService;
pub use admin::AdminService;
pub use auth::{AuthService, SessionTokens};

pub struct AppServices {
    pub auth: AuthService,
    pub admin: AdminService,
    pub addresses: AddressService,
    pub tokens: Arc<TokenService>,
}

impl AppServices {
    /// Services over in-memory stores (tests/dev).
    pub async fn in_memory(config: &AppConfig) -> Result<Self, StoreError> {
        Self::assemble(
            Arc::new(InMemoryCredentialStore::new()),
            Arc::new(InMemoryAddressStore::new()),
            config,
        )
        .await
    }

    /// Services over Postgres. Creates missing tables before use.
    pub async fn postgres(config: &AppConfig, database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Backend(format!("failed to connect to Postgres: {e}")))?;
        apply_schema(&pool).await?;

        Self::assemble(
            Arc::new(PostgresCredentialStore::new(pool.clone())),
            Arc::new(PostgresAddressStore::new(pool)),
            config,
        )
        .await
    }

    async fn assemble<C>(
        credentials: Arc<C>,
        addresses: Arc<dyn AddressStore>,
        config: &AppConfig,
    ) -> Result<Self, StoreError>
    where
        C: CredentialStore + 'static,
    {
        for role in [Role::admin(), Role::user()] {
            credentials.ensure_role(&role).await?;
        }

        let tokens = Arc::new(TokenService::new(config.tokens.clone(), credentials.clone()));
        let store: Arc<dyn CredentialStore> = credentials;

        Ok(Self {
            auth: AuthService::new(
                store.clone(),
                tokens.clone(),
                Arc::new(Argon2Hasher),
                config.bootstrap_admins.clone(),
            ),
            admin: AdminService::new(store),
            addresses: AddressService::new(addresses),
            tokens,
        })
    }
}

/// Build services from configuration (`USE_PERSISTENT_STORES` selects Postgres).
pub async fn build_services(config: &AppConfig) -> Result<AppServices, StoreError> {
    match config.database_url.as_deref() {
        Some(url) => {
            tracing::info!("using Postgres-backed stores");
            AppServices::postgres(config, url).await
        }
        None => {
            tracing::info!("using in-memory stores");
            AppServices::in_memory(config).await
        }
    }
}
