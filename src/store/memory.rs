//! Memory Store Module
//!
//! In-process backend: a HashMap guarded by one reader/writer lock.
//! Expired items are skipped on read and only dropped by `remove` or `flush`.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::debug;

use crate::error::{CacheError, Result};
use crate::store::{apply_delta, negate, Item, Store, Value};

// == Memory Store ==
/// In-memory cache backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Key-item storage
    items: RwLock<HashMap<String, Item>>,
}

impl MemoryStore {
    // == Constructor ==
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    // == Item ==
    /// Returns a copy of the live item under `key`.
    fn item(&self, key: &str) -> Result<Item> {
        let items = self.items.read();
        match items.get(key) {
            Some(item) if !item.is_expired() => Ok(item.clone()),
            _ => Err(CacheError::NotFound(key.to_string())),
        }
    }

    // == Counter ==
    /// Read-modify-write of a counter under the write lock.
    fn add(&self, key: &str, delta: i64) -> Result<i64> {
        let mut items = self.items.write();

        let live = items.get(key).filter(|item| !item.is_expired());
        let next = apply_delta(key, live.map(|item| &item.object), delta)?;
        let expiration = live.map_or(crate::store::NEVER, |item| item.expiration);

        items.insert(
            key.to_string(),
            Item {
                object: Value::Int(next),
                expiration,
            },
        );

        debug!(key, delta, value = next, "Updated counter");
        Ok(next)
    }

    // == Length ==
    /// Returns the number of stored items, expired ones included.
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    // == Is Empty ==
    /// Returns true if the store holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

impl Store for MemoryStore {
    fn flush(&self) -> Result<()> {
        let mut items = self.items.write();
        let count = items.len();
        items.clear();
        debug!(count, "Flushed memory store");
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Value> {
        self.item(key).map(|item| item.object)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut items = self.items.write();
        match items.remove(key) {
            Some(item) if !item.is_expired() => Ok(()),
            _ => Err(CacheError::NotFound(key.to_string())),
        }
    }

    fn set(&self, key: &str, value: Value, expiration: Duration) -> Result<()> {
        let item = Item::new(value, expiration);
        debug!(key, kind = item.object.kind(), ttl = ?item.ttl_remaining(), "Stored item");
        self.items.write().insert(key.to_string(), item);
        Ok(())
    }

    fn increment(&self, key: &str, by: i64) -> Result<i64> {
        self.add(key, by)
    }

    fn decrement(&self, key: &str, by: i64) -> Result<i64> {
        self.add(key, negate(key, by)?)
    }

    fn number(&self, key: &str) -> Result<i64> {
        self.item(key)?
            .object
            .as_i64()
            .ok_or_else(|| CacheError::TypeMismatch(key.to_string()))
    }
}
