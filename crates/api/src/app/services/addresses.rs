use std::sync::Arc;

use addressbook_core::{AddressId, Page, PageRequest};
use addressbook_directory::{Address, AddressDraft, AddressSearch};
use addressbook_infra::AddressStore;

use crate::app::errors::ApiError;

/// Address CRUD over an [`AddressStore`].
pub struct AddressService {
    store: Arc<dyn AddressStore>,
}

impl AddressService {
    pub fn new(store: Arc<dyn AddressStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self, page: PageRequest) -> Result<Page<Address>, ApiError> {
        Ok(self.store.search(&AddressSearch::all(page)).await?)
    }

    pub async fn filter(&self, search: AddressSearch) -> Result<Page<Address>, ApiError> {
        Ok(self.store.search(&search).await?)
    }

    pub async fn get(&self, id: AddressId) -> Result<Address, ApiError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| ApiError::not_found("Address not found"))
    }

    pub async fn create(&self, draft: AddressDraft) -> Result<Address, ApiError> {
        let address = Address::create(draft)?;
        self.store.insert(&address).await?;
        tracing::debug!(address_id = %address.id, "address created");
        Ok(address)
    }

    pub async fn update(&self, id: AddressId, draft: AddressDraft) -> Result<Address, ApiError> {
        let address = Address::from_parts(id, draft.validated()?);
        if !self.store.update(&address).await? {
            return Err(ApiError::not_found("Address not found"));
        }
        Ok(address)
    }

    pub async fn delete(&self, id: AddressId) -> Result<(), ApiError> {
        if !self.store.delete(id).await? {
            return Err(ApiError::not_found("Address not found"));
        }
        Ok(())
    }
}
