//! Free-text address search.
//!
//! A search matches when the (trimmed, case-folded) text is a substring of the
//! first or second street line, the city, or the state. Blank text matches
//! every address. Results are ordered by id so a given page is stable.

use addressbook_core::PageRequest;

use crate::Address;

/// Normalized search text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchText(String);

impl SearchText {
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_lowercase())
    }

    pub fn is_blank(&self) -> bool {
        self.0.is_empty()
    }

    /// Lower-cased needle, suitable for `LIKE` patterns or substring checks.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn matches(&self, address: &Address) -> bool {
        if self.is_blank() {
            return true;
        }

        let needle = self.0.as_str();
        let contains = |field: &str| field.to_lowercase().contains(needle);

        contains(&address.street_address)
            || address.street_address2.as_deref().is_some_and(contains)
            || contains(&address.city)
            || contains(&address.state)
    }
}

/// A filter request over the address directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressSearch {
    pub text: SearchText,
    pub page: PageRequest,
}

impl AddressSearch {
    pub fn new(text: &str, page: PageRequest) -> Self {
        Self {
            text: SearchText::new(text),
            page,
        }
    }

    /// Everything on one page of the directory, unfiltered.
    pub fn all(page: PageRequest) -> Self {
        Self {
            text: SearchText::default(),
            page,
        }
    }
}
