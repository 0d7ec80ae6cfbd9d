use crate::{RecordOrigin, Result, RocksDBStore, ScoreboardError};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::path::Path;
use std::sync::Arc;

/// Persistent counters keyed by string, owned by the runtime.
///
/// `increment_and_get` must be atomic per key. When an `origin` is given the
/// store remembers the highest offset applied for that topic partition in the
/// same write as the counter, and an origin at or below it leaves the counter
/// untouched. That is what keeps redelivered input from counting twice.
pub trait CounterStore: Send + Sync {
    fn increment_and_get(&self, key: &str, by: i64, origin: Option<RecordOrigin<'_>>) -> Result<i64>;

    /// Current value, zero when the key was never incremented.
    fn counter(&self, key: &str) -> Result<i64>;

    fn applied_offset(&self, topic: &str, partition: i32) -> Result<Option<i64>>;
}

pub(crate) fn add_checked(key: &str, current: i64, by: i64) -> Result<i64> {
    current
        .checked_add(by)
        .ok_or_else(|| ScoreboardError::CounterOverflow(key.to_string()))
}

// In-memory counter store, for tests and throwaway local runs
#[derive(Default)]
pub struct InMemoryCounterStore {
    counters: Arc<DashMap<String, i64>>,
    applied: Arc<DashMap<(String, i32), i64>>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    fn bump(&self, key: &str, by: i64) -> Result<i64> {
        match self.counters.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                let next = add_checked(key, *entry.get(), by)?;
                entry.insert(next);
                Ok(next)
            }
            Entry::Vacant(entry) => {
                let next = add_checked(key, 0, by)?;
                entry.insert(next);
                Ok(next)
            }
        }
    }
}

impl Clone for InMemoryCounterStore {
    fn clone(&self) -> Self {
        Self {
            counters: Arc::clone(&self.counters),
            applied: Arc::clone(&self.applied),
        }
    }
}

impl CounterStore for InMemoryCounterStore {
    fn increment_and_get(&self, key: &str, by: i64, origin: Option<RecordOrigin<'_>>) -> Result<i64> {
        let Some(origin) = origin else {
            return self.bump(key, by);
        };

        // The partition entry stays locked until the counter is updated,
        // so the offset and the counter move together.
        match self.applied.entry((origin.topic.to_string(), origin.partition)) {
            Entry::Occupied(mut entry) => {
                if origin.offset <= *entry.get() {
                    return self.counter(key);
                }
                let next = self.bump(key, by)?;
                entry.insert(origin.offset);
                Ok(next)
            }
            Entry::Vacant(entry) => {
                let next = self.bump(key, by)?;
                entry.insert(origin.offset);
                Ok(next)
            }
        }
    }

    fn counter(&self, key: &str) -> Result<i64> {
        Ok(self.counters.get(key).map(|entry| *entry.value()).unwrap_or(0))
    }

    fn applied_offset(&self, topic: &str, partition: i32) -> Result<Option<i64>> {
        Ok(self
            .applied
            .get(&(topic.to_string(), partition))
            .map(|entry| *entry.value()))
    }
}

// State store that can use either in-memory or RocksDB
#[derive(Clone)]
pub enum StateStoreBackend {
    InMemory(InMemoryCounterStore),
    RocksDB(Arc<RocksDBStore>),
}

impl StateStoreBackend {
    pub fn new_in_memory() -> Self {
        Self::InMemory(InMemoryCounterStore::new())
    }

    pub fn new_rocksdb<P: AsRef<Path>>(path: P) -> Result<Self> {
        std::fs::create_dir_all(&path)?;
        let store = RocksDBStore::new(path)?;
        Ok(Self::RocksDB(Arc::new(store)))
    }

    pub fn rocksdb(&self) -> Option<Arc<RocksDBStore>> {
        match self {
            Self::RocksDB(store) => Some(Arc::clone(store)),
            Self::InMemory(_) => None,
        }
    }
}

impl CounterStore for StateStoreBackend {
    fn increment_and_get(&self, key: &str, by: i64, origin: Option<RecordOrigin<'_>>) -> Result<i64> {
        match self {
            Self::InMemory(store) => store.increment_and_get(key, by, origin),
            Self::RocksDB(store) => store.increment_and_get(key, by, origin),
        }
    }

    fn counter(&self, key: &str) -> Result<i64> {
        match self {
            Self::InMemory(store) => store.counter(key),
            Self::RocksDB(store) => store.counter(key),
        }
    }

    fn applied_offset(&self, topic: &str, partition: i32) -> Result<Option<i64>> {
        match self {
            Self::InMemory(store) => store.applied_offset(topic, partition),
            Self::RocksDB(store) => store.applied_offset(topic, partition),
        }
    }
}
