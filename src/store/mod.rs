//! Store Module
//!
//! The contract every storage backend implements, plus the value model and
//! codec they share.
//!
//! Backends:
//! - **memory**: a `HashMap` behind a single lock, always available
//! - **sled**: embedded file-backed store (feature `sled-backend`)
//! - **redis**: remote Redis server (feature `redis-backend`)

mod codec;
mod item;
mod memory;
mod value;

#[cfg(feature = "redis-backend")]
mod redis_store;
#[cfg(feature = "sled-backend")]
mod sled_store;


use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{CacheError, Result};

// Re-export public types
pub use codec::{decode, encode, is_tagged, Format, TAG_BINARY, TAG_TEXT};
pub use item::{expiration_from_ttl, expired_at, now_nanos, Item, NEVER};
pub use memory::MemoryStore;
pub use value::Value;

#[cfg(feature = "redis-backend")]
pub use redis_store::{RedisOptions, RedisStore};
#[cfg(feature = "sled-backend")]
pub use sled_store::{SledOptions, SledStore};

/// Producer invoked by [`Store::remember`] on a cache miss.
pub type RememberFn<'a> = Box<dyn FnOnce() -> Value + 'a>;

// == Store Contract ==
/// Interface implemented by every cache backend.
///
/// A zero `expiration` means the item never expires. Counter operations seed
/// absent keys at zero; every other read reports `NotFound` for absent or
/// expired keys.
pub trait Store: Send + Sync {
    /// Removes every key.
    fn flush(&self) -> Result<()>;

    /// Returns the value stored under `key`.
    fn get(&self, key: &str) -> Result<Value>;

    /// Deletes `key`, failing with `NotFound` if it is absent or expired.
    fn remove(&self, key: &str) -> Result<()>;

    /// Stores `value` under `key`, replacing any previous value and expiry.
    fn set(&self, key: &str, value: Value, expiration: Duration) -> Result<()>;

    /// Adds `by` to the counter at `key` and returns the new value.
    fn increment(&self, key: &str, by: i64) -> Result<i64>;

    /// Subtracts `by` from the counter at `key` and returns the new value.
    fn decrement(&self, key: &str, by: i64) -> Result<i64>;

    /// Returns the counter stored under `key`.
    fn number(&self, key: &str) -> Result<i64>;

    /// Returns the cached value, or runs `producer` and caches its result.
    ///
    /// Misses and unreadable entries both run the producer. No lock is held
    /// while it runs, so concurrent callers may each run their own producer;
    /// the last write wins.
    fn remember(&self, key: &str, expiration: Duration, producer: RememberFn<'_>) -> Result<Value> {
        match self.get(key) {
            Ok(value) => return Ok(value),
            Err(CacheError::NotFound(_)) => {}
            Err(CacheError::Decode(reason)) => {
                debug!(key, %reason, "Replacing unreadable item");
            }
            Err(err) => return Err(err),
        }

        let value = producer();
        self.set(key, value.clone(), expiration)?;
        Ok(value)
    }

    /// Releases the backend handle. Further use is backend-defined.
    fn close(&self) -> Result<()> {
        Ok(())
    }
}

// == Typed Access ==
/// Typed helpers available on every store.
pub trait StoreExt: Store {
    /// Decodes the value under `key` into `T`.
    fn result<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        self.get(key)?.deserialize_into()
    }
}

impl<S: Store + ?Sized> StoreExt for S {}

// == Counter Arithmetic ==
/// Applies `delta` to an optional current counter value.
///
/// `None` seeds at zero. A value that is not an integer is a `TypeMismatch`.
pub(crate) fn apply_delta(key: &str, current: Option<&Value>, delta: i64) -> Result<i64> {
    let base = match current {
        None => 0,
        Some(value) => value
            .as_i64()
            .ok_or_else(|| CacheError::TypeMismatch(key.to_string()))?,
    };
    base.checked_add(delta)
        .ok_or_else(|| CacheError::Overflow(key.to_string()))
}

/// Negates a decrement amount, failing on `i64::MIN`.
pub(crate) fn negate(key: &str, by: i64) -> Result<i64> {
    by.checked_neg()
        .ok_or_else(|| CacheError::Overflow(key.to_string()))
}
