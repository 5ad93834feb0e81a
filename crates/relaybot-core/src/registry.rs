//! Store-backed identity sets: the user allow-list and the destination groups.
//!
//! Both are plain CRUD. Callers check `Authorizer` before invoking them.

use crate::{
    domain::{normalize_identity, ChatId},
    errors::Error,
    store::{classify_delete, classify_insert, Insert, Removal, Store},
    Result,
};

/// One single-column UNIQUE table.
#[derive(Clone, Copy, Debug)]
struct KeyTable {
    table: &'static str,
    column: &'static str,
}

impl KeyTable {
    async fn add(&self, store: &Store, key: &str) -> Result<Insert> {
        let sql = format!("INSERT INTO {} ({}) VALUES (?)", self.table, self.column);
        classify_insert(sqlx::query(&sql).bind(key).execute(store.pool()).await)
    }

    async fn remove(&self, store: &Store, key: &str) -> Result<Removal> {
        let sql = format!("DELETE FROM {} WHERE {} = ?", self.table, self.column);
        let res = sqlx::query(&sql).bind(key).execute(store.pool()).await?;
        Ok(classify_delete(&res))
    }

    async fn list(&self, store: &Store) -> Result<Vec<String>> {
        let sql = format!("SELECT {} FROM {} ORDER BY id", self.column, self.table);
        let rows: Vec<(String,)> = sqlx::query_as(&sql).fetch_all(store.pool()).await?;
        Ok(rows.into_iter().map(|(k,)| k).collect())
    }

    async fn contains_any(&self, store: &Store, keys: &[String]) -> Result<bool> {
        if keys.is_empty() {
            return Ok(false);
        }
        let placeholders = vec!["?"; keys.len()].join(", ");
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE {} IN ({placeholders}))",
            self.table, self.column
        );
        let mut q = sqlx::query_as::<_, (i64,)>(&sql);
        for k in keys {
            q = q.bind(k.as_str());
        }
        let (found,) = q.fetch_one(store.pool()).await?;
        Ok(found != 0)
    }
}

const USERS: KeyTable = KeyTable {
    table: "users",
    column: "username",
};

const GROUPS: KeyTable = KeyTable {
    table: "groups",
    column: "group_id",
};

fn require_identity(raw: &str) -> Result<String> {
    normalize_identity(raw).ok_or_else(|| Error::InvalidIdentity(raw.to_string()))
}

/// Non-admin users granted authorization.
#[derive(Clone, Debug)]
pub struct AllowList {
    store: Store,
}

impl AllowList {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Add a username. A leading `@` is stripped.
    pub async fn add(&self, username: &str) -> Result<Insert> {
        USERS.add(&self.store, &require_identity(username)?).await
    }

    pub async fn remove(&self, username: &str) -> Result<Removal> {
        USERS.remove(&self.store, &require_identity(username)?).await
    }

    pub async fn list(&self) -> Result<Vec<String>> {
        USERS.list(&self.store).await
    }

    pub async fn contains(&self, identity: &str) -> Result<bool> {
        self.contains_any(&[identity.to_string()]).await
    }

    pub(crate) async fn contains_any(&self, identities: &[String]) -> Result<bool> {
        USERS.contains_any(&self.store, identities).await
    }
}

/// Destination groups for relay fan-out.
#[derive(Clone, Debug)]
pub struct GroupRegistry {
    store: Store,
}

impl GroupRegistry {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn add(&self, group: &ChatId) -> Result<Insert> {
        GROUPS.add(&self.store, &require_group(group)?).await
    }

    pub async fn remove(&self, group: &ChatId) -> Result<Removal> {
        GROUPS.remove(&self.store, &require_group(group)?).await
    }

    pub async fn list(&self) -> Result<Vec<ChatId>> {
        Ok(GROUPS
            .list(&self.store)
            .await?
            .into_iter()
            .map(ChatId)
            .collect())
    }
}

// Group ids keep their `@` (public channel handles are addressed that way).
fn require_group(group: &ChatId) -> Result<String> {
    let id = group.as_str().trim();
    if id.is_empty() {
        return Err(Error::InvalidIdentity(group.0.clone()));
    }
    Ok(id.to_string())
}
