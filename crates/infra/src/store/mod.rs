//! Storage abstractions and their in-memory / Postgres implementations.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (foreign key violation) | `23503` | `NotFound` |
//! | Database (other) | any other | `Backend` |
//! | PoolClosed / other | N/A | `Backend` |

use thiserror::Error;

pub mod addresses;
pub mod credentials;
pub mod memory;
pub mod postgres;

/// Provider name under which refresh tokens are stored.
pub const REFRESH_TOKEN_PROVIDER: &str = "Bearer";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A uniqueness rule was violated (duplicate username, email, role name).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A referenced record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The backing store failed (connection, poisoned lock, bad row).
    #[error("storage backend error: {0}")]
    Backend(String),
}

pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(
                    db_err
                        .constraint()
                        .map(|c| format!("duplicate value violates {c}"))
                        .unwrap_or(msg),
                ),
                Some("23503") => StoreError::NotFound(
                    db_err
                        .constraint()
                        .map(|c| format!("referenced row missing for {c}"))
                        .unwrap_or(msg),
                ),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}
