//! Login, registration, refresh-token rotation, logout and role assignment.
//!
//! Per login attempt: `Unauthenticated -> Verifying -> {Authenticated, Rejected}`.
//! Every failure is terminal for the request; store faults surface as
//! internal errors, never as authentication failures.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::OnceCell;

use addressbook_auth::{
    read_expiry_unverified, require_role, CredentialHasher, IssuedToken, Principal, Registration,
    Role, TokenService, User,
};
use addressbook_core::{RoleId, UserId};
use addressbook_infra::{CredentialStore, StoreError};

use crate::app::errors::ApiError;

/// Same message for unknown usernames and wrong passwords.
pub const INVALID_CREDENTIALS: &str = "Invalid username or password";

pub const INVALID_REFRESH_TOKEN: &str = "Invalid refresh token";

/// Verified against when the username is unknown, so both rejection paths
/// cost one hash verification.
const DECOY_PASSWORD: &str = "decoy-password-never-issued";

/// Outcome of a successful login or refresh.
#[derive(Debug, Clone)]
pub struct SessionTokens {
    pub user: User,
    pub access: IssuedToken,
    pub refresh: IssuedToken,
}

pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    tokens: Arc<TokenService>,
    hasher: Arc<dyn CredentialHasher>,
    bootstrap_admins: Vec<String>,
    decoy_hash: OnceCell<String>,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        tokens: Arc<TokenService>,
        hasher: Arc<dyn CredentialHasher>,
        bootstrap_admins: Vec<String>,
    ) -> Self {
        Self {
            store,
            tokens,
            hasher,
            bootstrap_admins,
            decoy_hash: OnceCell::new(),
        }
    }

    pub async fn login(
        &self,
        username: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<SessionTokens, ApiError> {
        let username = username.trim();
        let Some(user) = self.store.find_user_by_username(username).await? else {
            let decoy = self
                .decoy_hash
                .get_or_try_init(|| self.hash_password(DECOY_PASSWORD.to_string()))
                .await?;
            self.verify_password(password, decoy).await?;
            tracing::warn!(username, "login rejected: unknown username");
            return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
        };

        if !self.verify_password(password, &user.password_hash).await? {
            tracing::warn!(username, "login rejected: wrong password");
            return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
        }

        let access = self.tokens.issue_access_token(&user, now)?;
        let refresh = self.tokens.issue_refresh_token(now);
        self.store.store_refresh_token(user.id, &refresh).await?;

        tracing::info!(user_id = %user.id, "login succeeded");
        Ok(SessionTokens {
            user,
            access,
            refresh,
        })
    }

    /// Create an account. No token is issued; the caller logs in afterwards.
    pub async fn register(&self, registration: Registration) -> Result<User, ApiError> {
        let (new_user, password) = registration.validated()?;
        let password_hash = self.hash_password(password).await?;

        let mut roles = vec![Role::user()];
        if self.bootstrap_admins.iter().any(|name| *name == new_user.username) {
            roles.push(Role::admin());
        }

        let user = User {
            id: UserId::new(),
            username: new_user.username,
            email: new_user.email,
            password_hash,
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            roles,
        };

        match self.store.create_user(&user).await {
            Ok(()) => {
                tracing::info!(user_id = %user.id, username = %user.username, "user registered");
                Ok(user)
            }
            Err(StoreError::Conflict(detail)) => {
                tracing::debug!(%detail, "registration conflict");
                Err(ApiError::Conflict("Username or email is already taken".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Exchange the current refresh token for a new token pair.
    ///
    /// The stored token is swapped in one conditional write, so a token can be
    /// redeemed at most once.
    pub async fn refresh(
        &self,
        user_id: UserId,
        presented: &str,
        now: DateTime<Utc>,
    ) -> Result<SessionTokens, ApiError> {
        let user = self
            .store
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| ApiError::not_found("User not found"))?;

        if presented.is_empty() {
            return Err(ApiError::unauthorized(INVALID_REFRESH_TOKEN));
        }

        let access = self.tokens.issue_access_token(&user, now)?;
        let refresh = self.tokens.issue_refresh_token(now);

        if !self
            .store
            .rotate_refresh_token(user.id, presented, &refresh, now)
            .await?
        {
            tracing::warn!(user_id = %user.id, "refresh rejected: token mismatch or expired");
            return Err(ApiError::unauthorized(INVALID_REFRESH_TOKEN));
        }

        Ok(SessionTokens {
            user,
            access,
            refresh,
        })
    }

    /// Blacklist `access_token` until its own expiry.
    pub async fn logout(&self, access_token: &str, now: DateTime<Utc>) -> Result<(), ApiError> {
        let token = access_token.trim();
        let expires_at = read_expiry_unverified(token)
            .map_err(|e| ApiError::validation(format!("Token could not be decoded: {e}")))?;

        self.tokens.blacklist(token, expires_at, now).await?;
        Ok(())
    }

    pub async fn get_user(&self, user_id: UserId) -> Result<User, ApiError> {
        self.store
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| ApiError::not_found("User not found"))
    }

    pub async fn assign_role(
        &self,
        caller: &Principal,
        user_id: UserId,
        role_id: RoleId,
    ) -> Result<(), ApiError> {
        require_role(caller, Role::ADMIN)?;

        if self.store.find_user_by_id(user_id).await?.is_none() {
            return Err(ApiError::not_found("User not found"));
        }
        if self.store.find_role_by_id(role_id).await?.is_none() {
            return Err(ApiError::not_found("Role not found"));
        }

        self.store.assign_role(user_id, role_id).await?;
        tracing::info!(%user_id, %role_id, by = %caller.user_id, "role assigned");
        Ok(())
    }

    async fn hash_password(&self, password: String) -> Result<String, ApiError> {
        let hasher = self.hasher.clone();
        let hash = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| ApiError::internal(format!("hashing task failed: {e}")))??;
        Ok(hash)
    }

    async fn verify_password(&self, password: &str, stored_hash: &str) -> Result<bool, ApiError> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        let stored_hash = stored_hash.to_string();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &stored_hash))
            .await
            .map_err(|e| ApiError::internal(format!("verification task failed: {e}")))
    }
}
