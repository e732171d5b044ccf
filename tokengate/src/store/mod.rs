//! Durable key/value storage for secrets and identities
//!
//! Everything tokengate persists lives under a two-part [`StoreKey`]
//! (`kind`, `name`):
//!
//! | Key | Value |
//! |---|---|
//! | `("NaCl", "prod")` | 32-byte token secret |
//! | `("OAuth", "prod")` | JSON [`crate::secrets::ClientCredentials`] |
//! | `("User", <id>)` | JSON [`crate::identity::Identity`] |
//!
//! Writers that must not clobber each other use [`Store::begin`] and commit
//! with optimistic concurrency: a commit fails with [`StoreError::Conflict`]
//! when any key read inside the transaction changed since it was read.

mod memory;
#[cfg(feature = "sqlite")]
mod sql;
mod traits;

use std::fmt;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use crate::config::StoreSettings;

pub use memory::MemoryStore;
#[cfg(feature = "sqlite")]
pub use sql::SqlStore;
pub use traits::{Store, StoreTransaction};

#[cfg(test)]
pub use traits::MockStore;

/// Kind under which the token secret is stored
pub const TOKEN_SECRET_KIND: &str = "NaCl";

/// Kind under which OAuth client credentials are stored
pub const CLIENT_CREDENTIALS_KIND: &str = "OAuth";

/// Kind under which identities are stored
pub const IDENTITY_KIND: &str = "User";

/// Name of the single production slot for secrets
pub const PROD_SLOT: &str = "prod";

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// A key read inside a transaction changed before commit
    #[error("Transaction conflict on {0}")]
    Conflict(String),

    /// Backend failure
    #[error("Database error: {0}")]
    Database(String),

    /// Value could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),
}

#[cfg(feature = "sqlite")]
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Two-part storage key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreKey {
    kind: String,
    name: String,
}

impl StoreKey {
    /// Create a key from its parts
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Slot holding the token secret
    #[must_use]
    pub fn token_secret() -> Self {
        Self::new(TOKEN_SECRET_KIND, PROD_SLOT)
    }

    /// Slot holding the OAuth client credentials
    #[must_use]
    pub fn client_credentials() -> Self {
        Self::new(CLIENT_CREDENTIALS_KIND, PROD_SLOT)
    }

    /// Slot holding the identity with the given external id
    pub fn identity(id: impl Into<String>) -> Self {
        Self::new(IDENTITY_KIND, id)
    }

    /// Key kind
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Key name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.name)
    }
}

/// Encode a value as JSON bytes for storage
pub fn to_json<V: Serialize>(value: &V) -> StoreResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// Decode JSON bytes read from storage
pub fn from_json<V: DeserializeOwned>(bytes: &[u8]) -> StoreResult<V> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// Open the store described by the settings
///
/// `memory://` gives a process-local [`MemoryStore`]; anything else is handed
/// to [`SqlStore`], which creates its table on first use.
///
/// # Errors
///
/// Returns an error if the database cannot be opened or migrated, or if a
/// SQL url is given while the `sqlite` feature is disabled.
pub async fn open(settings: &StoreSettings) -> StoreResult<Arc<dyn Store>> {
    if settings.database_url.starts_with("memory:") {
        tracing::warn!("using in-memory store, secrets will not survive a restart");
        return Ok(Arc::new(MemoryStore::new()));
    }
    open_sql(&settings.database_url).await
}

#[cfg(feature = "sqlite")]
async fn open_sql(url: &str) -> StoreResult<Arc<dyn Store>> {
    let store = SqlStore::connect(url).await?;
    store.migrate().await?;
    tracing::info!(url, "opened sqlite store");
    Ok(Arc::new(store))
}

#[cfg(not(feature = "sqlite"))]
async fn open_sql(url: &str) -> StoreResult<Arc<dyn Store>> {
    Err(StoreError::Database(format!(
        "cannot open {url}: built without the sqlite feature"
    )))
}
