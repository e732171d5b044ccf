//! Process-local store

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{Store, StoreError, StoreKey, StoreResult, StoreTransaction};

#[derive(Debug, Clone)]
struct Entry {
    version: u64,
    value: Vec<u8>,
}

type Entries = Arc<Mutex<HashMap<StoreKey, Entry>>>;

/// In-memory store with versioned entries
///
/// Clones share the same map, so several caches (standing in for several
/// server processes) can race against one store in tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Entries,
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True when nothing is stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &StoreKey) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.entries.lock().get(key).map(|e| e.value.clone()))
    }

    async fn put(&self, key: &StoreKey, value: Vec<u8>) -> StoreResult<()> {
        let mut entries = self.entries.lock();
        let version = entries.get(key).map_or(0, |e| e.version) + 1;
        entries.insert(key.clone(), Entry { version, value });
        Ok(())
    }

    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        Ok(Box::new(MemoryTransaction {
            entries: Arc::clone(&self.entries),
            reads: HashMap::new(),
            writes: HashMap::new(),
        }))
    }
}

struct MemoryTransaction {
    entries: Entries,
    // version observed per key, 0 when absent
    reads: HashMap<StoreKey, u64>,
    writes: HashMap<StoreKey, Vec<u8>>,
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn get(&mut self, key: &StoreKey) -> StoreResult<Option<Vec<u8>>> {
        if let Some(pending) = self.writes.get(key) {
            return Ok(Some(pending.clone()));
        }

        let entries = self.entries.lock();
        let entry = entries.get(key);
        self.reads
            .entry(key.clone())
            .or_insert_with(|| entry.map_or(0, |e| e.version));
        Ok(entry.map(|e| e.value.clone()))
    }

    fn put(&mut self, key: &StoreKey, value: Vec<u8>) {
        self.writes.insert(key.clone(), value);
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let Self {
            entries,
            reads,
            writes,
        } = *self;
        let mut entries = entries.lock();

        for (key, seen) in &reads {
            let current = entries.get(key).map_or(0, |e| e.version);
            if current != *seen {
                return Err(StoreError::Conflict(key.to_string()));
            }
        }

        for (key, value) in writes {
            let version = entries.get(&key).map_or(0, |e| e.version) + 1;
            entries.insert(key, Entry { version, value });
        }
        Ok(())
    }

    fn rollback(self: Box<Self>) {}
}
