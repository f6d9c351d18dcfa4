use async_trait::async_trait;
use chrono::{DateTime, Utc};

use addressbook_auth::{IssuedToken, Role, RoleDefinition, TokenBlacklist, User};
use addressbook_core::{RoleId, UserId};

use super::StoreError;

/// Users, roles, role assignments and refresh tokens.
///
/// Implementations also carry the access-token blacklist, so one store
/// instance backs both this trait and [`TokenBlacklist`].
#[async_trait]
pub trait CredentialStore: TokenBlacklist {
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    async fn find_user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError>;

    /// Persist a new user together with its initial roles.
    ///
    /// Fails with `Conflict` when the username or email is taken and with
    /// `NotFound` when one of the roles does not exist.
    async fn create_user(&self, user: &User) -> Result<(), StoreError>;

    /// All users ordered by username.
    async fn list_users(&self) -> Result<Vec<User>, StoreError>;

    /// Look up a role by name, creating it if absent.
    async fn ensure_role(&self, name: &Role) -> Result<RoleDefinition, StoreError>;

    async fn find_role_by_id(&self, id: RoleId) -> Result<Option<RoleDefinition>, StoreError>;

    /// All roles ordered by name.
    async fn list_roles(&self) -> Result<Vec<RoleDefinition>, StoreError>;

    /// Fails with `Conflict` on a duplicate name.
    async fn create_role(&self, role: &RoleDefinition) -> Result<(), StoreError>;

    /// Link a role to a user. Assigning an already held role is a no-op.
    async fn assign_role(&self, user_id: UserId, role_id: RoleId) -> Result<(), StoreError>;

    /// Store `token` as the user's only refresh token, replacing any previous one.
    async fn store_refresh_token(&self, user_id: UserId, token: &IssuedToken) -> Result<(), StoreError>;

    /// Atomically replace the user's refresh token with `next`, provided the
    /// stored value equals `presented` and has not expired at `now`.
    ///
    /// Returns `false` (and changes nothing) otherwise.
    async fn rotate_refresh_token(
        &self,
        user_id: UserId,
        presented: &str,
        next: &IssuedToken,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;
}
