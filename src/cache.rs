//! Cache Facade
//!
//! The user-facing type. It owns exactly one store and forwards every call,
//! filling in the default expiration and counter step.

use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::info;

use crate::config::{BackendKind, Config};
use crate::error::{CacheError, Result};
use crate::store::{MemoryStore, Store, StoreExt, Value};

// == Cache ==
/// A cache backed by one storage engine, fixed for its lifetime.
pub struct Cache {
    store: Box<dyn Store>,
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache").finish_non_exhaustive()
    }
}

impl Cache {
    // == Constructors ==
    /// Wraps an existing store.
    pub fn new(store: impl Store + 'static) -> Self {
        Self {
            store: Box::new(store),
        }
    }

    /// Creates a cache over an in-process map.
    pub fn memory() -> Self {
        Self::new(MemoryStore::new())
    }

    /// Creates a cache over a sled database.
    #[cfg(feature = "sled-backend")]
    pub fn sled(options: &crate::store::SledOptions) -> Result<Self> {
        Ok(Self::new(crate::store::SledStore::open(options)?))
    }

    /// Creates a cache over a Redis connection.
    #[cfg(feature = "redis-backend")]
    pub fn redis(options: &crate::store::RedisOptions) -> Result<Self> {
        Ok(Self::new(crate::store::RedisStore::connect(options)?))
    }

    /// Creates the cache selected by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        info!(backend = ?config.backend, "Initializing cache");

        match config.backend {
            BackendKind::Memory => Ok(Self::memory()),
            #[cfg(feature = "sled-backend")]
            BackendKind::Sled => Self::sled(&config.sled_options()),
            #[cfg(feature = "redis-backend")]
            BackendKind::Redis => Self::redis(&config.redis_options()),
            #[allow(unreachable_patterns)]
            other => Err(CacheError::Config(format!(
                "Backend {other:?} is not compiled in"
            ))),
        }
    }

    // == Operations ==
    /// Removes all items from the cache.
    pub fn flush(&self) -> Result<()> {
        self.store.flush()
    }

    /// Retrieves an item from the cache.
    pub fn get(&self, key: &str) -> Result<Value> {
        self.store.get(key)
    }

    /// Retrieves an item and decodes it into `T`.
    pub fn result<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        self.store.result(key)
    }

    /// Removes an item from the cache.
    pub fn remove(&self, key: &str) -> Result<()> {
        self.store.remove(key)
    }

    /// Stores an item that never expires.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        self.set_with_expiration(key, value, Duration::ZERO)
    }

    /// Stores an item expiring after `expiration`. Zero never expires.
    pub fn set_with_expiration(
        &self,
        key: &str,
        value: impl Into<Value>,
        expiration: Duration,
    ) -> Result<()> {
        self.store.set(key, value.into(), expiration)
    }

    /// Increments the counter at `key` by one.
    pub fn increment(&self, key: &str) -> Result<i64> {
        self.store.increment(key, 1)
    }

    /// Increments the counter at `key` by `by`.
    pub fn increment_by(&self, key: &str, by: i64) -> Result<i64> {
        self.store.increment(key, by)
    }

    /// Decrements the counter at `key` by one.
    pub fn decrement(&self, key: &str) -> Result<i64> {
        self.store.decrement(key, 1)
    }

    /// Decrements the counter at `key` by `by`.
    pub fn decrement_by(&self, key: &str, by: i64) -> Result<i64> {
        self.store.decrement(key, by)
    }

    /// Retrieves the counter set by increment and decrement.
    pub fn number(&self, key: &str) -> Result<i64> {
        self.store.number(key)
    }

    /// Retrieves an item, storing the producer's result first if it is missing.
    pub fn remember<F, V>(&self, key: &str, expiration: Duration, producer: F) -> Result<Value>
    where
        F: FnOnce() -> V,
        V: Into<Value>,
    {
        self.store
            .remember(key, expiration, Box::new(move || -> Value { producer().into() }))
    }

    /// Releases the underlying store.
    pub fn close(&self) -> Result<()> {
        self.store.close()
    }
}
