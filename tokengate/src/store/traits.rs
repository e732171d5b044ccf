//! Storage traits

use async_trait::async_trait;

use super::{StoreKey, StoreResult};

/// Durable key/value store
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Store: Send + Sync {
    /// Read a value
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    async fn get(&self, key: &StoreKey) -> StoreResult<Option<Vec<u8>>>;

    /// Write a value unconditionally
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    async fn put(&self, key: &StoreKey, value: Vec<u8>) -> StoreResult<()>;

    /// Start an optimistic transaction
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>>;
}

/// Optimistic transaction
///
/// Reads are recorded with the version they observed (absent keys included).
/// Writes are buffered until [`commit`](Self::commit), which applies them
/// atomically only if none of the recorded reads is stale.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Read a value, seeing this transaction's own buffered writes
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    async fn get(&mut self, key: &StoreKey) -> StoreResult<Option<Vec<u8>>>;

    /// Buffer a write
    fn put(&mut self, key: &StoreKey, value: Vec<u8>);

    /// Apply buffered writes
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if a recorded read is stale, or a
    /// backend error.
    async fn commit(self: Box<Self>) -> StoreResult<()>;

    /// Discard buffered writes
    fn rollback(self: Box<Self>);
}
