use crate::kafka::streams::add_checked;
use crate::{CounterStore, RecordOrigin, Result, ScoreboardError};
use rocksdb::{Options, WriteBatch, DB};
use serde::Deserialize;
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

fn counter_entry(key: &str) -> String {
    format!("counter:{}", key)
}

fn applied_entry(topic: &str, partition: i32) -> String {
    format!("applied:{}:{}", topic, partition)
}

/// RocksDB-based state store for persistent storage
pub struct RocksDBStore {
    db: DB,
    // Serialises read-modify-write cycles; RocksDB itself has no increment
    write_lock: Mutex<()>,
}

impl RocksDBStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_max_open_files(1024);
        opts.set_use_fsync(false);
        opts.set_bytes_per_sync(8388608);
        opts.optimize_for_point_lookup(64);
        opts.set_max_write_buffer_number(4);
        opts.set_write_buffer_size(64 * 1024 * 1024);

        let db = DB::open(&opts, path)?;
        Ok(Self {
            db,
            write_lock: Mutex::new(()),
        })
    }

    pub fn get<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: for<'de> Deserialize<'de>,
    {
        match self.db.get(key)? {
            Some(value) => {
                let deserialized: T = serde_json::from_slice(&value)?;
                Ok(Some(deserialized))
            }
            None => Ok(None),
        }
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

impl CounterStore for RocksDBStore {
    fn increment_and_get(&self, key: &str, by: i64, origin: Option<RecordOrigin<'_>>) -> Result<i64> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| ScoreboardError::StateStore("counter write lock poisoned".to_string()))?;

        let entry = counter_entry(key);
        let current: i64 = self.get(&entry)?.unwrap_or(0);

        let mut batch = WriteBatch::default();
        if let Some(origin) = origin {
            let applied = applied_entry(origin.topic, origin.partition);
            if let Some(offset) = self.get::<i64>(&applied)? {
                if origin.offset <= offset {
                    debug!(
                        "Offset {} on {}/{} already applied, counter {} unchanged",
                        origin.offset, origin.topic, origin.partition, key
                    );
                    return Ok(current);
                }
            }
            batch.put(applied, serde_json::to_vec(&origin.offset)?);
        }

        let next = add_checked(key, current, by)?;
        batch.put(entry, serde_json::to_vec(&next)?);
        self.db.write(batch)?;

        Ok(next)
    }

    fn counter(&self, key: &str) -> Result<i64> {
        Ok(self.get(&counter_entry(key))?.unwrap_or(0))
    }

    fn applied_offset(&self, topic: &str, partition: i32) -> Result<Option<i64>> {
        self.get(&applied_entry(topic, partition))
    }
}

impl Drop for RocksDBStore {
    fn drop(&mut self) {
        let _ = self.db.flush();
    }
}
