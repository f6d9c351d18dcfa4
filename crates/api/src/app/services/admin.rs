use std::sync::Arc;

use addressbook_auth::{require_role, Principal, Role, RoleDefinition, User};
use addressbook_core::{require_present, RoleId};
use addressbook_infra::{CredentialStore, StoreError};

use crate::app::errors::ApiError;

/// User and role administration.
pub struct AdminService {
    store: Arc<dyn CredentialStore>,
}

impl AdminService {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    pub async fn list_users(&self) -> Result<Vec<User>, ApiError> {
        Ok(self.store.list_users().await?)
    }

    pub async fn list_roles(&self) -> Result<Vec<RoleDefinition>, ApiError> {
        Ok(self.store.list_roles().await?)
    }

    pub async fn create_role(&self, caller: &Principal, name: &str) -> Result<RoleDefinition, ApiError> {
        require_role(caller, Role::ADMIN)?;
        require_present("name", name)?;

        let role = RoleDefinition {
            id: RoleId::new(),
            name: Role::new(name.trim().to_string()),
        };
        match self.store.create_role(&role).await {
            Ok(()) => {
                tracing::info!(role = %role.name, by = %caller.user_id, "role created");
                Ok(role)
            }
            Err(StoreError::Conflict(_)) => Err(ApiError::Conflict(format!(
                "Role '{}' already exists",
                role.name
            ))),
            Err(e) => Err(e.into()),
        }
    }
}
