//! SQLite-backed store
//!
//! One table of versioned blobs. Transactions record the version of every key
//! they read (0 when absent) and commit through conditional statements inside
//! a SQL transaction, so two processes creating the same key cannot both win.

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use super::{Store, StoreError, StoreKey, StoreResult, StoreTransaction};

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS tokengate_entries (
    kind TEXT NOT NULL,
    name TEXT NOT NULL,
    value BLOB NOT NULL,
    version INTEGER NOT NULL,
    PRIMARY KEY (kind, name)
)";

/// Store persisting entries in SQLite
#[derive(Debug, Clone)]
pub struct SqlStore {
    pool: SqlitePool,
}

impl SqlStore {
    /// Connect to a SQLite database, creating the file if needed
    ///
    /// # Errors
    ///
    /// Returns an error if the url is invalid or the database cannot be opened.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

        // every connection to :memory: is its own database, keep exactly one alive
        let pool = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(options)
                .await?
        };

        Ok(Self { pool })
    }

    /// Wrap an existing pool
    #[must_use]
    pub const fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the entries table if it does not exist
    ///
    /// # Errors
    ///
    /// Returns an error if the statement fails.
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        Ok(())
    }

    async fn read(&self, key: &StoreKey) -> StoreResult<Option<(Vec<u8>, i64)>> {
        let row = sqlx::query_as::<_, (Vec<u8>, i64)>(
            "SELECT value, version FROM tokengate_entries WHERE kind = ?1 AND name = ?2",
        )
        .bind(key.kind())
        .bind(key.name())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

#[async_trait]
impl Store for SqlStore {
    async fn get(&self, key: &StoreKey) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.read(key).await?.map(|(value, _)| value))
    }

    async fn put(&self, key: &StoreKey, value: Vec<u8>) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO tokengate_entries (kind, name, value, version) VALUES (?1, ?2, ?3, 1)
             ON CONFLICT (kind, name)
             DO UPDATE SET value = excluded.value, version = tokengate_entries.version + 1",
        )
        .bind(key.kind())
        .bind(key.name())
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        Ok(Box::new(SqlTransaction {
            store: self.clone(),
            reads: HashMap::new(),
            writes: HashMap::new(),
        }))
    }
}

struct SqlTransaction {
    store: SqlStore,
    reads: HashMap<StoreKey, i64>,
    writes: HashMap<StoreKey, Vec<u8>>,
}

#[async_trait]
impl StoreTransaction for SqlTransaction {
    async fn get(&mut self, key: &StoreKey) -> StoreResult<Option<Vec<u8>>> {
        if let Some(pending) = self.writes.get(key) {
            return Ok(Some(pending.clone()));
        }

        let row = self.store.read(key).await?;
        let version = row.as_ref().map_or(0, |(_, version)| *version);
        self.reads.entry(key.clone()).or_insert(version);
        Ok(row.map(|(value, _)| value))
    }

    fn put(&mut self, key: &StoreKey, value: Vec<u8>) {
        self.writes.insert(key.clone(), value);
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let Self {
            store,
            reads,
            writes,
        } = *self;
        let mut tx = store.pool.begin().await?;

        for (key, seen) in &reads {
            if writes.contains_key(key) {
                continue;
            }
            let current = sqlx::query_as::<_, (i64,)>(
                "SELECT version FROM tokengate_entries WHERE kind = ?1 AND name = ?2",
            )
            .bind(key.kind())
            .bind(key.name())
            .fetch_optional(&mut *tx)
            .await?
            .map_or(0, |(version,)| version);
            if current != *seen {
                return Err(StoreError::Conflict(key.to_string()));
            }
        }

        for (key, value) in writes {
            let affected = match reads.get(&key).copied() {
                Some(0) => sqlx::query(
                    "INSERT INTO tokengate_entries (kind, name, value, version)
                     VALUES (?1, ?2, ?3, 1)
                     ON CONFLICT (kind, name) DO NOTHING",
                )
                .bind(key.kind())
                .bind(key.name())
                .bind(value)
                .execute(&mut *tx)
                .await?
                .rows_affected(),
                Some(seen) => sqlx::query(
                    "UPDATE tokengate_entries SET value = ?3, version = version + 1
                     WHERE kind = ?1 AND name = ?2 AND version = ?4",
                )
                .bind(key.kind())
                .bind(key.name())
                .bind(value)
                .bind(seen)
                .execute(&mut *tx)
                .await?
                .rows_affected(),
                None => sqlx::query(
                    "INSERT INTO tokengate_entries (kind, name, value, version)
                     VALUES (?1, ?2, ?3, 1)
                     ON CONFLICT (kind, name)
                     DO UPDATE SET value = excluded.value,
                                   version = tokengate_entries.version + 1",
                )
                .bind(key.kind())
                .bind(key.name())
                .bind(value)
                .execute(&mut *tx)
                .await?
                .rows_affected(),
            };

            // dropping `tx` rolls back whatever was applied so far
            if affected != 1 {
                return Err(StoreError::Conflict(key.to_string()));
            }
        }

        tx.commit().await?;
        Ok(())
    }

    fn rollback(self: Box<Self>) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_store() -> SqlStore {
        let store = SqlStore::connect("sqlite::memory:").await.unwrap();
        store.migrate().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let store = memory_store().await;
        let key = StoreKey::token_secret();

        store.put(&key, vec![1; 32]).await.unwrap();
        store.put(&key, vec![2; 32]).await.unwrap();

        assert_eq!(store.get(&key).await.unwrap().unwrap(), vec![2; 32]);
    }

    #[tokio::test]
    async fn test_create_if_absent_conflicts_for_second_writer() {
        let store = memory_store().await;
        let key = StoreKey::token_secret();

        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();
        assert!(first.get(&key).await.unwrap().is_none());
        assert!(second.get(&key).await.unwrap().is_none());

        first.put(&key, b"winner".to_vec());
        second.put(&key, b"loser".to_vec());

        first.commit().await.unwrap();
        assert!(matches!(
            second.commit().await.unwrap_err(),
            StoreError::Conflict(_)
        ));
        assert_eq!(store.get(&key).await.unwrap().unwrap(), b"winner");
    }

    #[tokio::test]
    async fn test_versioned_update_detects_concurrent_put() {
        let store = memory_store().await;
        let key = StoreKey::identity("7");
        store.put(&key, b"v1".to_vec()).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.get(&key).await.unwrap().unwrap(), b"v1");
        store.put(&key, b"v2".to_vec()).await.unwrap();
        tx.put(&key, b"v1-edit".to_vec());

        assert!(matches!(
            tx.commit().await.unwrap_err(),
            StoreError::Conflict(_)
        ));
        assert_eq!(store.get(&key).await.unwrap().unwrap(), b"v2");
    }

    #[tokio::test]
    async fn test_file_database_survives_reconnect() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("tokengate.db").display());
        let key = StoreKey::client_credentials();

        {
            let store = SqlStore::connect(&url).await.unwrap();
            store.migrate().await.unwrap();
            let mut tx = store.begin().await.unwrap();
            assert!(tx.get(&key).await.unwrap().is_none());
            tx.put(&key, b"creds".to_vec());
            tx.commit().await.unwrap();
        }

        let reopened = SqlStore::connect(&url).await.unwrap();
        reopened.migrate().await.unwrap();
        assert_eq!(reopened.get(&key).await.unwrap().unwrap(), b"creds");
    }
}
