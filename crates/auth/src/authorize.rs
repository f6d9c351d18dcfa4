use thiserror::Error;

use crate::Principal;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing role '{0}'")]
    MissingRole(String),
}

/// Require `role` on the principal.
///
/// - No IO
/// - No panics
pub fn require_role(principal: &Principal, role: &str) -> Result<(), AuthzError> {
    if principal.has_role(role) {
        Ok(())
    } else {
        Err(AuthzError::MissingRole(role.to_string()))
    }
}
