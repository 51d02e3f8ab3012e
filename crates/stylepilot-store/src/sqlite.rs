//! SQLite state backend bound to one host-session scope.
//!
//! Every row records the scope that wrote it. Opening the store with a new
//! scope purges rows from all other scopes, so state left behind by a host
//! session that ended without cleaning up is never resumed by a later one.

use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::db::Database;
use crate::error::StoreResult;
use crate::state::{StateStore, validate_key};

/// Durable [`StateStore`] whose contents are scoped to one host session.
#[derive(Clone)]
pub struct SqliteStateStore {
    db: Database,
    scope: String,
}

impl SqliteStateStore {
    /// Open (or create) the database at `path` for `scope`.
    pub async fn open(path: impl AsRef<Path>, scope: impl Into<String>) -> StoreResult<Self> {
        let db = Database::open_and_migrate(path).await?;
        Self::with_database(db, scope).await
    }

    /// Bind an already-migrated database to `scope`, purging foreign rows.
    pub async fn with_database(db: Database, scope: impl Into<String>) -> StoreResult<Self> {
        let store = Self {
            db,
            scope: scope.into(),
        };
        let purged = store.purge_other_scopes().await?;
        if purged > 0 {
            info!(scope = %store.scope, purged, "discarded state from previous host sessions");
        }
        Ok(store)
    }

    /// The host-session scope this handle writes under.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Delete every row not written under the current scope.
    #[instrument(skip(self), fields(scope = %self.scope))]
    pub async fn purge_other_scopes(&self) -> StoreResult<usize> {
        let scope = self.scope.clone();
        self.db
            .execute(move |conn| {
                let deleted = conn.execute(
                    "DELETE FROM session_state WHERE scope <> ?1",
                    rusqlite::params![scope],
                )?;
                Ok(deleted)
            })
            .await
    }
}

#[async_trait]
impl StateStore for SqliteStateStore {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        validate_key(key)?;
        let key = key.to_owned();
        let scope = self.scope.clone();
        let raw: Option<String> = self
            .db
            .execute(move |conn| {
                let result = conn.query_row(
                    "SELECT value FROM session_state WHERE key = ?1 AND scope = ?2",
                    rusqlite::params![key, scope],
                    |row| row.get(0),
                );
                match result {
                    Ok(value) => Ok(Some(value)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await?;

        match raw {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, value))]
    async fn set(&self, key: &str, value: Value) -> StoreResult<()> {
        validate_key(key)?;
        let key = key.to_owned();
        let scope = self.scope.clone();
        let raw = serde_json::to_string(&value)?;
        self.db
            .execute(move |conn| {
                conn.execute(
                    "INSERT INTO session_state (key, value, scope, updated_at) VALUES (?1, ?2, ?3, ?4) \
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value, \
                     scope = excluded.scope, updated_at = excluded.updated_at",
                    rusqlite::params![key, raw, scope, chrono::Utc::now().timestamp_millis()],
                )?;
                debug!(key = %key, bytes = raw.len(), "state written");
                Ok(())
            })
            .await
    }

    #[instrument(skip(self))]
    async fn remove(&self, key: &str) -> StoreResult<bool> {
        validate_key(key)?;
        let key = key.to_owned();
        self.db
            .execute(move |conn| {
                let deleted = conn.execute(
                    "DELETE FROM session_state WHERE key = ?1",
                    rusqlite::params![key],
                )?;
                Ok(deleted > 0)
            })
            .await
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn setup(scope: &str) -> SqliteStateStore {
        let db = Database::open_in_memory().unwrap();
        db.run_migrations().await.unwrap();
        SqliteStateStore::with_database(db, scope).await.unwrap()
    }

    #[tokio::test]
    async fn get_nonexistent_returns_none() {
        let store = setup("s1").await;
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_overwrites() {
        let store = setup("s1").await;
        store.set("k", json!({"v": 1})).await.unwrap();
        store.set("k", json!({"v": 2})).await.unwrap();

        assert_eq!(store.get("k").await.unwrap(), Some(json!({"v": 2})));
    }

    #[tokio::test]
    async fn remove_existing_and_missing() {
        let store = setup("s1").await;
        store.set("k", json!(true)).await.unwrap();

        assert!(store.remove("k").await.unwrap());
        assert!(!store.remove("k").await.unwrap());
    }

    #[tokio::test]
    async fn rows_from_other_scopes_are_invisible_and_purged() {
        let db = Database::open_in_memory().unwrap();
        db.run_migrations().await.unwrap();

        let old = SqliteStateStore::with_database(db.clone(), "old-session")
            .await
            .unwrap();
        old.set("checkpoint", json!({"turn": 3})).await.unwrap();

        let fresh = SqliteStateStore::with_database(db.clone(), "new-session")
            .await
            .unwrap();
        assert!(fresh.get("checkpoint").await.unwrap().is_none());

        let remaining: i64 = db
            .execute(|conn| {
                Ok(conn.query_row("SELECT count(*) FROM session_state", [], |row| row.get(0))?)
            })
            .await
            .unwrap();
        assert_eq!(remaining, 0);
    }
}
