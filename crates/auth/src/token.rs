//! Access-token issuance and validation, refresh-token minting, revocation.
//!
//! Access tokens are HS256 JWTs signed with a symmetric key from
//! configuration. Refresh tokens are opaque random strings; their persistence
//! is the caller's concern. Revoked access tokens are recorded through the
//! [`TokenBlacklist`] capability and rejected until their natural expiry.

use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use rand::{rngs::OsRng, RngCore};
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::{validate_claims, AccessClaims, User};

/// Size of a refresh token before base64 encoding.
pub const REFRESH_TOKEN_BYTES: usize = 32;

/// Token lifetimes and signing parameters.
#[derive(Clone)]
pub struct TokenSettings {
    /// Symmetric signing key. Issuance and validation fail while it is absent.
    pub secret: Option<String>,
    pub issuer: String,
    pub audience: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
}

impl core::fmt::Debug for TokenSettings {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenSettings")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("access_token_ttl", &self.access_token_ttl)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .finish()
    }
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            secret: None,
            issuer: "addressbook".to_string(),
            audience: "addressbook-clients".to_string(),
            access_token_ttl: Duration::minutes(15),
            refresh_token_ttl: Duration::days(7),
        }
    }
}

/// A minted token and the moment it stops being valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("blacklist storage failure: {0}")]
pub struct BlacklistError(pub String);

/// Store of revoked-but-not-yet-expired access tokens.
#[async_trait]
pub trait TokenBlacklist: Send + Sync {
    /// Record `token` as revoked until `expires_at`. Inserting the same token
    /// twice is not an error. Entries that expired at or before `now` are
    /// dropped as part of the same call, so the store only ever holds live
    /// revocations.
    async fn insert(
        &self,
        token: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), BlacklistError>;

    /// Whether `token` has a blacklist entry that has not expired at `now`.
    async fn contains(&self, token: &str, now: DateTime<Utc>) -> Result<bool, BlacklistError>;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("no signing key configured")]
    MissingSigningKey,

    #[error("token could not be signed: {0}")]
    Encoding(String),

    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("token signature is invalid")]
    BadSignature,

    #[error("token issuer is not accepted")]
    WrongIssuer,

    #[error("token audience is not accepted")]
    WrongAudience,

    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued in the future)")]
    NotYetValid,

    #[error("invalid token time window (exp <= iat)")]
    InvalidTimeWindow,

    #[error("token has been revoked")]
    Revoked,

    #[error(transparent)]
    Blacklist(#[from] BlacklistError),
}

impl TokenError {
    /// Whether the error means "the caller is not authenticated" as opposed to
    /// a server-side fault.
    pub fn is_authentication_failure(&self) -> bool {
        !matches!(
            self,
            TokenError::MissingSigningKey | TokenError::Encoding(_) | TokenError::Blacklist(_)
        )
    }
}

/// Issues and validates tokens.
pub struct TokenService {
    settings: TokenSettings,
    revocations: Arc<dyn TokenBlacklist>,
}

impl TokenService {
    pub fn new(settings: TokenSettings, revocations: Arc<dyn TokenBlacklist>) -> Self {
        Self {
            settings,
            revocations,
        }
    }

    fn signing_key(&self) -> Result<&[u8], TokenError> {
        self.settings
            .secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(str::as_bytes)
            .ok_or(TokenError::MissingSigningKey)
    }

    /// Mint a signed access token for `user` carrying its id, display name,
    /// email and roles.
    pub fn issue_access_token(&self, user: &User, now: DateTime<Utc>) -> Result<IssuedToken, TokenError> {
        let key = self.signing_key()?;
        let expires_at = now + self.settings.access_token_ttl;

        let claims = AccessClaims {
            sub: user.id,
            name: user.display_name(),
            email: user.email.clone(),
            roles: user.roles.clone(),
            iss: self.settings.issuer.clone(),
            aud: self.settings.audience.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(key))
            .map_err(|e| TokenError::Encoding(e.to_string()))?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Mint an opaque refresh token: 32 bytes from the OS RNG, base64 encoded.
    pub fn issue_refresh_token(&self, now: DateTime<Utc>) -> IssuedToken {
        let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);

        IssuedToken {
            token: STANDARD.encode(bytes),
            expires_at: self.refresh_token_expiry(now),
        }
    }

    pub fn refresh_token_expiry(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + self.settings.refresh_token_ttl
    }

    /// Check signature, issuer, audience, expiry and blacklist membership.
    pub async fn validate_access_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<AccessClaims, TokenError> {
        let key = self.signing_key()?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.settings.issuer]);
        validation.set_audience(&[&self.settings.audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        // Expiry is checked against the caller's clock by `validate_claims`.
        validation.validate_exp = false;

        let data = decode::<AccessClaims>(token, &DecodingKey::from_secret(key), &validation)
            .map_err(map_jwt_error)?;

        validate_claims(&data.claims, now)?;

        if self.revocations.contains(token, now).await? {
            return Err(TokenError::Revoked);
        }

        Ok(data.claims)
    }

    /// Revoke `token` until `expires_at`.
    ///
    /// `expires_at` comes from an unverified token, so it is capped at one
    /// access-token lifetime from `now`; nothing this service signs outlives
    /// that. Tokens already past their expiry are not recorded.
    pub async fn blacklist(
        &self,
        token: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), TokenError> {
        if expires_at <= now {
            tracing::debug!(%expires_at, "token already expired; not blacklisted");
            return Ok(());
        }

        let until = expires_at.min(now + self.settings.access_token_ttl);
        self.revocations.insert(token, until, now).await?;
        tracing::debug!(%until, "access token blacklisted");
        Ok(())
    }
}

/// Read the `exp` claim of a token without checking its signature.
///
/// Only suitable for revocation, where the token is being made less useful.
pub fn read_expiry_unverified(token: &str) -> Result<DateTime<Utc>, TokenError> {
    #[derive(Deserialize)]
    struct Expiry {
        exp: i64,
    }

    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data = decode::<Expiry>(token, &DecodingKey::from_secret(&[]), &validation)
        .map_err(map_jwt_error)?;

    DateTime::from_timestamp(data.claims.exp, 0)
        .ok_or_else(|| TokenError::Malformed("exp is out of range".to_string()))
}

fn map_jwt_error(err: jsonwebtoken::errors::Error) -> TokenError {
    match err.kind() {
        ErrorKind::InvalidSignature => TokenError::BadSignature,
        ErrorKind::InvalidIssuer => TokenError::WrongIssuer,
        ErrorKind::InvalidAudience => TokenError::WrongAudience,
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::ImmatureSignature => TokenError::NotYetValid,
        _ => TokenError::Malformed(err.to_string()),
    }
}
