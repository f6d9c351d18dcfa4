//! In-memory stores for tests/dev.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use addressbook_auth::{BlacklistError, IssuedToken, Role, RoleDefinition, TokenBlacklist, User};
use addressbook_core::{AddressId, Page, RoleId, UserId};
use addressbook_directory::{Address, AddressSearch};

use super::{addresses::AddressStore, credentials::CredentialStore, StoreError};

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>, StoreError> {
    lock.read()
        .map_err(|_| StoreError::Backend("in-memory store lock poisoned".to_string()))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>, StoreError> {
    lock.write()
        .map_err(|_| StoreError::Backend("in-memory store lock poisoned".to_string()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Credentials
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct UserRow {
    id: UserId,
    username: String,
    email: String,
    password_hash: String,
    first_name: String,
    last_name: String,
}

#[derive(Debug, Default)]
struct CredentialTables {
    users: HashMap<UserId, UserRow>,
    roles: HashMap<RoleId, Role>,
    user_roles: HashMap<UserId, Vec<RoleId>>,
    refresh_tokens: HashMap<UserId, IssuedToken>,
}

impl CredentialTables {
    fn hydrate(&self, row: &UserRow) -> User {
        let mut roles: Vec<Role> = self
            .user_roles
            .get(&row.id)
            .into_iter()
            .flatten()
            .filter_map(|role_id| self.roles.get(role_id).cloned())
            .collect();
        roles.sort();

        User {
            id: row.id,
            username: row.username.clone(),
            email: row.email.clone(),
            password_hash: row.password_hash.clone(),
            first_name: row.first_name.clone(),
            last_name: row.last_name.clone(),
            roles,
        }
    }

    fn role_id(&self, name: &Role) -> Option<RoleId> {
        self.roles
            .iter()
            .find_map(|(id, role)| (role == name).then_some(*id))
    }
}

/// In-memory credential store and token blacklist.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    tables: RwLock<CredentialTables>,
    blacklist: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let tables = read(&self.tables)?;
        Ok(tables
            .users
            .values()
            .find(|row| row.username == username)
            .map(|row| tables.hydrate(row)))
    }

    async fn find_user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let tables = read(&self.tables)?;
        Ok(tables.users.get(&id).map(|row| tables.hydrate(row)))
    }

    async fn create_user(&self, user: &User) -> Result<(), StoreError> {
        let mut tables = write(&self.tables)?;

        if tables.users.contains_key(&user.id) {
            return Err(StoreError::Conflict(format!("user id {} already exists", user.id)));
        }
        if tables.users.values().any(|row| row.username == user.username) {
            return Err(StoreError::Conflict("username already exists".to_string()));
        }
        if tables.users.values().any(|row| row.email == user.email) {
            return Err(StoreError::Conflict("email already exists".to_string()));
        }

        let mut role_ids = Vec::with_capacity(user.roles.len());
        for role in &user.roles {
            let id = tables
                .role_id(role)
                .ok_or_else(|| StoreError::NotFound(format!("role '{role}'")))?;
            if !role_ids.contains(&id) {
                role_ids.push(id);
            }
        }

        tables.users.insert(
            user.id,
            UserRow {
                id: user.id,
                username: user.username.clone(),
                email: user.email.clone(),
                password_hash: user.password_hash.clone(),
                first_name: user.first_name.clone(),
                last_name: user.last_name.clone(),
            },
        );
        tables.user_roles.insert(user.id, role_ids);
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let tables = read(&self.tables)?;
        let mut users: Vec<User> = tables.users.values().map(|row| tables.hydrate(row)).collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    async fn ensure_role(&self, name: &Role) -> Result<RoleDefinition, StoreError> {
        let mut tables = write(&self.tables)?;
        let id = match tables.role_id(name) {
            Some(id) => id,
            None => {
                let id = RoleId::new();
                tables.roles.insert(id, name.clone());
                id
            }
        };
        Ok(RoleDefinition {
            id,
            name: name.clone(),
        })
    }

    async fn find_role_by_id(&self, id: RoleId) -> Result<Option<RoleDefinition>, StoreError> {
        let tables = read(&self.tables)?;
        Ok(tables.roles.get(&id).map(|name| RoleDefinition {
            id,
            name: name.clone(),
        }))
    }

    async fn list_roles(&self) -> Result<Vec<RoleDefinition>, StoreError> {
        let tables = read(&self.tables)?;
        let mut roles: Vec<RoleDefinition> = tables
            .roles
            .iter()
            .map(|(id, name)| RoleDefinition {
                id: *id,
                name: name.clone(),
            })
            .collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn create_role(&self, role: &RoleDefinition) -> Result<(), StoreError> {
        let mut tables = write(&self.tables)?;
        if tables.role_id(&role.name).is_some() || tables.roles.contains_key(&role.id) {
            return Err(StoreError::Conflict(format!("role '{}' already exists", role.name)));
        }
        tables.roles.insert(role.id, role.name.clone());
        Ok(())
    }

    async fn assign_role(&self, user_id: UserId, role_id: RoleId) -> Result<(), StoreError> {
        let mut tables = write(&self.tables)?;
        if !tables.users.contains_key(&user_id) {
            return Err(StoreError::NotFound(format!("user {user_id}")));
        }
        if !tables.roles.contains_key(&role_id) {
            return Err(StoreError::NotFound(format!("role {role_id}")));
        }

        let held = tables.user_roles.entry(user_id).or_default();
        if !held.contains(&role_id) {
            held.push(role_id);
        }
        Ok(())
    }

    async fn store_refresh_token(&self, user_id: UserId, token: &IssuedToken) -> Result<(), StoreError> {
        let mut tables = write(&self.tables)?;
        if !tables.users.contains_key(&user_id) {
            return Err(StoreError::NotFound(format!("user {user_id}")));
        }
        tables.refresh_tokens.insert(user_id, token.clone());
        Ok(())
    }

    async fn rotate_refresh_token(
        &self,
        user_id: UserId,
        presented: &str,
        next: &IssuedToken,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut tables = write(&self.tables)?;
        match tables.refresh_tokens.get_mut(&user_id) {
            Some(current) if current.token == presented && current.expires_at > now => {
                *current = next.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl TokenBlacklist for InMemoryCredentialStore {
    async fn insert(
        &self,
        token: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), BlacklistError> {
        let mut entries = self
            .blacklist
            .write()
            .map_err(|_| BlacklistError("blacklist lock poisoned".to_string()))?;
        entries.retain(|_, until| *until > now);
        if expires_at > now {
            entries.entry(token.to_string()).or_insert(expires_at);
        }
        Ok(())
    }

    async fn contains(&self, token: &str, now: DateTime<Utc>) -> Result<bool, BlacklistError> {
        let entries = self
            .blacklist
            .read()
            .map_err(|_| BlacklistError("blacklist lock poisoned".to_string()))?;
        Ok(entries.get(token).is_some_and(|expires_at| *expires_at > now))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Addresses
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory address store. A `BTreeMap` keyed by id keeps listings in
/// creation order.
#[derive(Debug, Default)]
pub struct InMemoryAddressStore {
    inner: RwLock<BTreeMap<AddressId, Address>>,
}

impl InMemoryAddressStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AddressStore for InMemoryAddressStore {
    async fn search(&self, search: &AddressSearch) -> Result<Page<Address>, StoreError> {
        let map = read(&self.inner)?;
        let matching: Vec<Address> = map
            .values()
            .filter(|address| search.text.matches(address))
            .cloned()
            .collect();
        Ok(Page::from_ordered(matching, search.page))
    }

    async fn get(&self, id: AddressId) -> Result<Option<Address>, StoreError> {
        Ok(read(&self.inner)?.get(&id).cloned())
    }

    async fn insert(&self, address: &Address) -> Result<(), StoreError> {
        let mut map = write(&self.inner)?;
        if map.contains_key(&address.id) {
            return Err(StoreError::Conflict(format!("address {} already exists", address.id)));
        }
        map.insert(address.id, address.clone());
        Ok(())
    }

    async fn update(&self, address: &Address) -> Result<bool, StoreError> {
        let mut map = write(&self.inner)?;
        match map.get_mut(&address.id) {
            Some(stored) => {
                *stored = address.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: AddressId) -> Result<bool, StoreError> {
        Ok(write(&self.inner)?.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use addressbook_core::PageRequest;
    use addressbook_directory::AddressDraft;
    use chrono::Duration;

    fn user(username: &str, email: &str, roles: Vec<Role>) -> User {
        User {
            id: UserId::new(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash: "$argon2id$stub".to_string(),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            roles,
        }
    }

    async fn seeded() -> InMemoryCredentialStore {
        let store = InMemoryCredentialStore::new();
        store.ensure_role(&Role::user()).await.unwrap();
        store.ensure_role(&Role::admin()).await.unwrap();
        store
    }

    fn token(value: &str, expires_at: DateTime<Utc>) -> IssuedToken {
        IssuedToken {
            token: value.to_string(),
            expires_at,
        }
    }

    #[tokio::test]
    async fn duplicate_username_or_email_conflicts_and_keeps_first_user() {
        let store = seeded().await;
        let first = user("ada", "ada@example.com", vec![Role::user()]);
        store.create_user(&first).await.unwrap();

        let same_name = user("ada", "other@example.com", vec![Role::user()]);
        assert!(matches!(store.create_user(&same_name).await, Err(StoreError::Conflict(_))));

        let same_email = user("lovelace", "ada@example.com", vec![Role::user()]);
        assert!(matches!(store.create_user(&same_email).await, Err(StoreError::Conflict(_))));

        let found = store.find_user_by_username("ada").await.unwrap().unwrap();
        assert_eq!(found, first);
        assert_eq!(store.list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn ensure_role_is_idempotent() {
        let store = seeded().await;
        let a = store.ensure_role(&Role::admin()).await.unwrap();
        let b = store.ensure_role(&Role::admin()).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(store.list_roles().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn create_role_rejects_duplicate_name() {
        let store = seeded().await;
        let dup = RoleDefinition {
            id: RoleId::new(),
            name: Role::admin(),
        };
        assert!(matches!(store.create_role(&dup).await, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn assign_role_is_idempotent_and_checks_both_sides() {
        let store = seeded().await;
        let ada = user("ada", "ada@example.com", vec![Role::user()]);
        store.create_user(&ada).await.unwrap();
        let admin = store.ensure_role(&Role::admin()).await.unwrap();

        store.assign_role(ada.id, admin.id).await.unwrap();
        store.assign_role(ada.id, admin.id).await.unwrap();

        let found = store.find_user_by_id(ada.id).await.unwrap().unwrap();
        assert_eq!(found.roles, vec![Role::admin(), Role::user()]);

        assert!(matches!(
            store.assign_role(UserId::new(), admin.id).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.assign_role(ada.id, RoleId::new()).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn refresh_rotation_is_compare_and_swap() {
        let store = seeded().await;
        let ada = user("ada", "ada@example.com", vec![Role::user()]);
        store.create_user(&ada).await.unwrap();

        let now = Utc::now();
        let week = now + Duration::days(7);
        store.store_refresh_token(ada.id, &token("first", week)).await.unwrap();

        assert!(store
            .rotate_refresh_token(ada.id, "first", &token("second", week), now)
            .await
            .unwrap());
        // The rotated-away value no longer matches.
        assert!(!store
            .rotate_refresh_token(ada.id, "first", &token("third", week), now)
            .await
            .unwrap());
        assert!(store
            .rotate_refresh_token(ada.id, "second", &token("third", week), now)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn expired_refresh_token_does_not_rotate() {
        let store = seeded().await;
        let ada = user("ada", "ada@example.com", vec![Role::user()]);
        store.create_user(&ada).await.unwrap();

        let now = Utc::now();
        store
            .store_refresh_token(ada.id, &token("old", now - Duration::seconds(1)))
            .await
            .unwrap();

        assert!(!store
            .rotate_refresh_token(ada.id, "old", &token("new", now + Duration::days(7)), now)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn blacklist_entries_lapse_at_expiry() {
        let store = InMemoryCredentialStore::new();
        let now = Utc::now();
        store.insert("tok", now + Duration::minutes(5), now).await.unwrap();
        store.insert("tok", now + Duration::minutes(5), now).await.unwrap();

        assert!(store.contains("tok", now).await.unwrap());
        assert!(!store.contains("tok", now + Duration::minutes(5)).await.unwrap());
        assert!(!store.contains("other", now).await.unwrap());
    }

    #[tokio::test]
    async fn blacklist_insert_prunes_expired_entries() {
        let store = InMemoryCredentialStore::new();
        let now = Utc::now();

        for i in 0..1000 {
            store
                .insert(&format!("dead-{i}"), now - Duration::seconds(1), now)
                .await
                .unwrap();
        }
        store.insert("early", now + Duration::minutes(1), now).await.unwrap();
        store.insert("live", now + Duration::minutes(10), now).await.unwrap();
        assert_eq!(store.blacklist.read().unwrap().len(), 2);

        let later = now + Duration::minutes(5);
        store.insert("fresh", later + Duration::minutes(10), later).await.unwrap();

        let entries = store.blacklist.read().unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.contains_key("live"));
        assert!(entries.contains_key("fresh"));
    }

    fn address(street: &str, city: &str) -> Address {
        Address::create(AddressDraft {
            street_address: street.to_string(),
            street_address2: None,
            city: city.to_string(),
            state: "OR".to_string(),
            postal_code: "97201".to_string(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn address_crud() {
        let store = InMemoryAddressStore::new();
        let a = address("1 Main St", "Portland");
        store.insert(&a).await.unwrap();

        assert_eq!(store.get(a.id).await.unwrap(), Some(a.clone()));

        let mut moved = a.clone();
        moved.city = "Salem".to_string();
        assert!(store.update(&moved).await.unwrap());
        assert_eq!(store.get(a.id).await.unwrap().unwrap().city, "Salem");

        assert!(store.delete(a.id).await.unwrap());
        assert!(!store.delete(a.id).await.unwrap());
        assert!(!store.update(&moved).await.unwrap());
        assert_eq!(store.get(a.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn search_is_case_insensitive_and_pages_in_creation_order() {
        let store = InMemoryAddressStore::new();
        let mut created = Vec::new();
        for i in 0..5 {
            let a = address(&format!("{i} Elm Street"), "Portland");
            store.insert(&a).await.unwrap();
            created.push(a);
        }
        store.insert(&address("9 Oak Ave", "Eugene")).await.unwrap();

        let page = PageRequest::new(Some(2), Some(2)).unwrap();
        let search = AddressSearch::new("  ELM ", page);

        let first = store.search(&search).await.unwrap();
        let again = store.search(&search).await.unwrap();
        assert_eq!(first, again);
        assert_eq!(first.total_count, 5);
        assert_eq!(first.items, created[2..4].to_vec());

        let all = store.search(&AddressSearch::all(PageRequest::default())).await.unwrap();
        assert_eq!(all.total_count, 6);
    }
}
