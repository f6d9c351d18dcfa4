use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use addressbook_core::UserId;

use crate::{Role, TokenError};

/// Claims carried by a signed access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject: the user id.
    pub sub: UserId,

    /// Display name ("first last").
    pub name: String,

    pub email: String,

    pub roles: Vec<Role>,

    pub iss: String,
    pub aud: String,

    /// Issued-at, seconds since the epoch.
    pub iat: i64,

    /// Expiry, seconds since the epoch.
    pub exp: i64,

    /// Unique token id; two tokens minted in the same second still differ.
    pub jti: Uuid,
}

/// Deterministically validate the time window of decoded claims.
///
/// Signature, issuer and audience are checked by the decoder; this covers the
/// clock-dependent part so callers can pass their own `now`.
pub fn validate_claims(claims: &AccessClaims, now: DateTime<Utc>) -> Result<(), TokenError> {
    if claims.exp <= claims.iat {
        return Err(TokenError::InvalidTimeWindow);
    }
    if now.timestamp() < claims.iat {
        return Err(TokenError::NotYetValid);
    }
    if now.timestamp() >= claims.exp {
        return Err(TokenError::Expired);
    }
    Ok(())
}
