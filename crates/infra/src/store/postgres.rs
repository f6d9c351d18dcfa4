//! Postgres-backed stores.
//!
//! ## Thread Safety
//!
//! Both stores are `Send + Sync` and cheap to clone; all access goes through
//! the SQLx connection pool.
//!
//! ## Refresh Rotation
//!
//! `rotate_refresh_token` is a single conditional `UPDATE` keyed on the
//! presented token, so two concurrent refreshes with the same token cannot
//! both succeed.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, FromRow, PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use addressbook_auth::{BlacklistError, IssuedToken, Role, RoleDefinition, TokenBlacklist, User};
use addressbook_core::{AddressId, Page, RoleId, UserId};
use addressbook_directory::{Address, AddressSearch};

use super::{
    addresses::AddressStore, credentials::CredentialStore, map_sqlx_error, StoreError,
    REFRESH_TOKEN_PROVIDER,
};

const SCHEMA: &str = include_str!("../../sql/schema.sql");

/// Create the tables if they do not exist yet.
pub async fn apply_schema(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::raw_sql(SCHEMA)
        .execute(pool)
        .await
        .map_err(|e| map_sqlx_error("apply_schema", e))?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Credentials
// ─────────────────────────────────────────────────────────────────────────────

struct UserRow {
    id: Uuid,
    username: String,
    email: String,
    password_hash: String,
    first_name: String,
    last_name: String,
}

impl<'r> FromRow<'r, PgRow> for UserRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(UserRow {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
        })
    }
}

impl UserRow {
    fn into_user(self, roles: Vec<Role>) -> User {
        User {
            id: UserId::from_uuid(self.id),
            username: self.username,
            email: self.email,
            password_hash: self.password_hash,
            first_name: self.first_name,
            last_name: self.last_name,
            roles,
        }
    }
}

const USER_COLUMNS: &str = "id, username, email, password_hash, first_name, last_name";

#[derive(Debug, Clone)]
pub struct PostgresCredentialStore {
    pool: Arc<PgPool>,
}

impl PostgresCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    async fn roles_of(&self, user_id: Uuid) -> Result<Vec<Role>, StoreError> {
        let names: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT r.name
            FROM user_roles ur
            JOIN roles r ON r.id = ur.role_id
            WHERE ur.user_id = $1
            ORDER BY r.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("roles_of", e))?;

        Ok(names.into_iter().map(Role::new).collect())
    }

    async fn hydrate(&self, row: Option<PgRow>) -> Result<Option<User>, StoreError> {
        let Some(row) = row else {
            return Ok(None);
        };
        let row = UserRow::from_row(&row)
            .map_err(|e| StoreError::Backend(format!("failed to decode user row: {e}")))?;
        let roles = self.roles_of(row.id).await?;
        Ok(Some(row.into_user(roles)))
    }
}

#[async_trait]
impl CredentialStore for PostgresCredentialStore {
    #[instrument(skip(self), err)]
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1"))
            .bind(username)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_user_by_username", e))?;
        self.hydrate(row).await
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn find_user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_user_by_id", e))?;
        self.hydrate(row).await
    }

    #[instrument(skip(self, user), fields(user_id = %user.id, username = %user.username), err)]
    async fn create_user(&self, user: &User) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("create_user", e))?;

        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, password_hash, first_name, last_name)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("create_user", e))?;

        let names: Vec<String> = user.roles.iter().map(|r| r.as_str().to_string()).collect();
        let linked = sqlx::query(
            r#"
            INSERT INTO user_roles (user_id, role_id)
            SELECT $1, id FROM roles WHERE name = ANY($2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&names)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("create_user", e))?
        .rows_affected();

        let mut distinct = names.clone();
        distinct.sort();
        distinct.dedup();
        if linked != distinct.len() as u64 {
            // Dropping the transaction rolls back the user row.
            return Err(StoreError::NotFound("one or more roles".to_string()));
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("create_user", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY username"))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_users", e))?;

        let links = sqlx::query(
            r#"
            SELECT ur.user_id, r.name
            FROM user_roles ur
            JOIN roles r ON r.id = ur.role_id
            ORDER BY r.name
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_users", e))?;

        let mut roles: HashMap<Uuid, Vec<Role>> = HashMap::new();
        for link in links {
            let user_id: Uuid = link
                .try_get("user_id")
                .map_err(|e| map_sqlx_error("list_users", e))?;
            let name: String = link
                .try_get("name")
                .map_err(|e| map_sqlx_error("list_users", e))?;
            roles.entry(user_id).or_default().push(Role::new(name));
        }

        rows.iter()
            .map(|row| -> Result<User, StoreError> {
                let row = UserRow::from_row(row)
                    .map_err(|e| map_sqlx_error("list_users", e))?;
                let held = roles.remove(&row.id).unwrap_or_default();
                Ok(row.into_user(held))
            })
            .collect()
    }

    #[instrument(skip(self), fields(role = %name), err)]
    async fn ensure_role(&self, name: &Role) -> Result<RoleDefinition, StoreError> {
        sqlx::query("INSERT INTO roles (id, name) VALUES ($1, $2) ON CONFLICT (name) DO NOTHING")
            .bind(RoleId::new().as_uuid())
            .bind(name.as_str())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_role", e))?;

        let id: Uuid = sqlx::query_scalar("SELECT id FROM roles WHERE name = $1")
            .bind(name.as_str())
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_role", e))?;

        Ok(RoleDefinition {
            id: RoleId::from_uuid(id),
            name: name.clone(),
        })
    }

    #[instrument(skip(self), fields(role_id = %id), err)]
    async fn find_role_by_id(&self, id: RoleId) -> Result<Option<RoleDefinition>, StoreError> {
        let name: Option<String> = sqlx::query_scalar("SELECT name FROM roles WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_role_by_id", e))?;

        Ok(name.map(|name| RoleDefinition {
            id,
            name: Role::new(name),
        }))
    }

    #[instrument(skip(self), err)]
    async fn list_roles(&self) -> Result<Vec<RoleDefinition>, StoreError> {
        let rows = sqlx::query("SELECT id, name FROM roles ORDER BY name")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_roles", e))?;

        rows.iter()
            .map(|row| -> Result<RoleDefinition, StoreError> {
                let id: Uuid = row.try_get("id").map_err(|e| map_sqlx_error("list_roles", e))?;
                let name: String = row.try_get("name").map_err(|e| map_sqlx_error("list_roles", e))?;
                Ok(RoleDefinition {
                    id: RoleId::from_uuid(id),
                    name: Role::new(name),
                })
            })
            .collect()
    }

    #[instrument(skip(self, role), fields(role = %role.name), err)]
    async fn create_role(&self, role: &RoleDefinition) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO roles (id, name) VALUES ($1, $2)")
            .bind(role.id.as_uuid())
            .bind(role.name.as_str())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("create_role", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn assign_role(&self, user_id: UserId, role_id: RoleId) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO user_roles (user_id, role_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(role_id.as_uuid())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("assign_role", e))?;
        Ok(())
    }

    #[instrument(skip(self, token), err)]
    async fn store_refresh_token(&self, user_id: UserId, token: &IssuedToken) -> Result<(), StoreError> {
        // An unknown user surfaces as a foreign-key violation, mapped to NotFound.
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (user_id, provider, token, expires_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, provider)
            DO UPDATE SET token = EXCLUDED.token, expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(REFRESH_TOKEN_PROVIDER)
        .bind(&token.token)
        .bind(token.expires_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("store_refresh_token", e))?;
        Ok(())
    }

    #[instrument(skip(self, presented, next), err)]
    async fn rotate_refresh_token(
        &self,
        user_id: UserId,
        presented: &str,
        next: &IssuedToken,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET token = $4, expires_at = $5
            WHERE user_id = $1 AND provider = $2 AND token = $3 AND expires_at > $6
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(REFRESH_TOKEN_PROVIDER)
        .bind(presented)
        .bind(&next.token)
        .bind(next.expires_at)
        .bind(now)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("rotate_refresh_token", e))?;

        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl TokenBlacklist for PostgresCredentialStore {
    #[instrument(skip(self, token), err)]
    async fn insert(
        &self,
        token: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), BlacklistError> {
        sqlx::query(
            r#"
            WITH pruned AS (
                DELETE FROM blacklisted_tokens WHERE expires_at <= $3
            )
            INSERT INTO blacklisted_tokens (token, expires_at)
            SELECT $1, $2
            WHERE $2 > $3
            ON CONFLICT (token) DO NOTHING
            "#,
        )
        .bind(token)
        .bind(expires_at)
        .bind(now)
        .execute(&*self.pool)
        .await
        .map_err(|e| BlacklistError(map_sqlx_error("blacklist_insert", e).to_string()))?;
        Ok(())
    }

    async fn contains(&self, token: &str, now: DateTime<Utc>) -> Result<bool, BlacklistError> {
        sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM blacklisted_tokens WHERE token = $1 AND expires_at > $2)",
        )
        .bind(token)
        .bind(now)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| BlacklistError(map_sqlx_error("blacklist_contains", e).to_string()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Addresses
// ─────────────────────────────────────────────────────────────────────────────

struct AddressRow {
    id: Uuid,
    street_address: String,
    street_address2: Option<String>,
    city: String,
    state: String,
    postal_code: String,
}

impl<'r> FromRow<'r, PgRow> for AddressRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(AddressRow {
            id: row.try_get("id")?,
            street_address: row.try_get("street_address")?,
            street_address2: row.try_get("street_address2")?,
            city: row.try_get("city")?,
            state: row.try_get("state")?,
            postal_code: row.try_get("postal_code")?,
        })
    }
}

impl From<AddressRow> for Address {
    fn from(row: AddressRow) -> Self {
        Address {
            id: AddressId::from_uuid(row.id),
            street_address: row.street_address,
            street_address2: row.street_address2,
            city: row.city,
            state: row.state,
            postal_code: row.postal_code,
        }
    }
}

// `strpos` avoids LIKE wildcard escaping; an empty needle matches every row.
const ADDRESS_MATCH: &str = r#"
    (strpos(lower(street_address), $1) > 0
     OR strpos(lower(coalesce(street_address2, '')), $1) > 0
     OR strpos(lower(city), $1) > 0
     OR strpos(lower(state), $1) > 0)
"#;

#[derive(Debug, Clone)]
pub struct PostgresAddressStore {
    pool: Arc<PgPool>,
}

impl PostgresAddressStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait]
impl AddressStore for PostgresAddressStore {
    #[instrument(skip(self, search), fields(page = search.page.number, size = search.page.size), err)]
    async fn search(&self, search: &AddressSearch) -> Result<Page<Address>, StoreError> {
        let needle = search.text.as_str();

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM addresses WHERE {ADDRESS_MATCH}"
        ))
        .bind(needle)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("search_addresses", e))?;

        let rows = sqlx::query(&format!(
            r#"
            SELECT id, street_address, street_address2, city, state, postal_code
            FROM addresses
            WHERE {ADDRESS_MATCH}
            ORDER BY id
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(needle)
        .bind(search.page.limit() as i64)
        .bind(search.page.offset() as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("search_addresses", e))?;

        let items = rows
            .iter()
            .map(|row| {
                AddressRow::from_row(row)
                    .map(Address::from)
                    .map_err(|e| map_sqlx_error("search_addresses", e))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page {
            items,
            request: search.page,
            total_count: total.max(0) as u64,
        })
    }

    #[instrument(skip(self), fields(address_id = %id), err)]
    async fn get(&self, id: AddressId) -> Result<Option<Address>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, street_address, street_address2, city, state, postal_code
            FROM addresses
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_address", e))?;

        row.map(|row| {
            AddressRow::from_row(&row)
                .map(Address::from)
                .map_err(|e| map_sqlx_error("get_address", e))
        })
        .transpose()
    }

    #[instrument(skip(self, address), fields(address_id = %address.id), err)]
    async fn insert(&self, address: &Address) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO addresses (id, street_address, street_address2, city, state, postal_code)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(address.id.as_uuid())
        .bind(&address.street_address)
        .bind(&address.street_address2)
        .bind(&address.city)
        .bind(&address.state)
        .bind(&address.postal_code)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_address", e))?;
        Ok(())
    }

    #[instrument(skip(self, address), fields(address_id = %address.id), err)]
    async fn update(&self, address: &Address) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE addresses
            SET street_address = $2, street_address2 = $3, city = $4, state = $5, postal_code = $6
            WHERE id = $1
            "#,
        )
        .bind(address.id.as_uuid())
        .bind(&address.street_address)
        .bind(&address.street_address2)
        .bind(&address.city)
        .bind(&address.state)
        .bind(&address.postal_code)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_address", e))?;

        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self), fields(address_id = %id), err)]
    async fn delete(&self, id: AddressId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM addresses WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_address", e))?;

        Ok(result.rows_affected() == 1)
    }
}
