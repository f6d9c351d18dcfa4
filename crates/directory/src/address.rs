use serde::{Deserialize, Serialize};

use addressbook_core::{require_present, AddressId, DomainResult};

/// Mutable fields of an address, as supplied by a caller on create or update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressDraft {
    pub street_address: String,
    pub street_address2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
}

impl AddressDraft {
    /// Check that every required field is present and normalize surrounding
    /// whitespace. A blank second street line is stored as `None`.
    pub fn validated(self) -> DomainResult<Self> {
        require_present("streetAddress", &self.street_address)?;
        require_present("city", &self.city)?;
        require_present("state", &self.state)?;
        require_present("postalCode", &self.postal_code)?;

        Ok(Self {
            street_address: self.street_address.trim().to_string(),
            street_address2: self
                .street_address2
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            city: self.city.trim().to_string(),
            state: self.state.trim().to_string(),
            postal_code: self.postal_code.trim().to_string(),
        })
    }
}

/// A stored postal address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub id: AddressId,
    pub street_address: String,
    pub street_address2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
}

impl Address {
    /// Create a new address from a validated draft.
    pub fn create(draft: AddressDraft) -> DomainResult<Self> {
        let draft = draft.validated()?;
        Ok(Self::from_parts(AddressId::new(), draft))
    }

    /// Full replace of the mutable fields; the id is preserved.
    pub fn replace(&self, draft: AddressDraft) -> DomainResult<Self> {
        let draft = draft.validated()?;
        Ok(Self::from_parts(self.id, draft))
    }

    pub fn from_parts(id: AddressId, draft: AddressDraft) -> Self {
        Self {
            id,
            street_address: draft.street_address,
            street_address2: draft.street_address2,
            city: draft.city,
            state: draft.state,
            postal_code: draft.postal_code,
        }
    }
}
