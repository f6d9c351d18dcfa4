use async_trait::async_trait;

use addressbook_core::{AddressId, Page};
use addressbook_directory::{Address, AddressSearch};

use super::StoreError;

/// Address persistence.
///
/// Listings are ordered by id, which for UUIDv7 ids is creation order.
#[async_trait]
pub trait AddressStore: Send + Sync {
    /// One page of addresses matching the search text.
    async fn search(&self, search: &AddressSearch) -> Result<Page<Address>, StoreError>;

    async fn get(&self, id: AddressId) -> Result<Option<Address>, StoreError>;

    async fn insert(&self, address: &Address) -> Result<(), StoreError>;

    /// Replace the stored row. Returns `false` if no address has that id.
    async fn update(&self, address: &Address) -> Result<bool, StoreError>;

    /// Returns `false` if no address has that id.
    async fn delete(&self, id: AddressId) -> Result<bool, StoreError>;
}
