//! Item Module
//!
//! Defines the envelope stored for every key and the shared expiration check.

use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::store::Value;

/// Expiration instant meaning "never expires".
pub const NEVER: i64 = 0;

// == Item ==
/// A cached value together with its expiration instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// The stored value
    pub object: Value,
    /// Expiration instant (Unix nanoseconds), `NEVER` = no expiration
    #[serde(default)]
    pub expiration: i64,
}

impl Item {
    // == Constructor ==
    /// Creates an item expiring `ttl` from now. A zero `ttl` never expires.
    pub fn new(object: Value, ttl: Duration) -> Self {
        Self {
            object,
            expiration: expiration_from_ttl(ttl),
        }
    }

    /// Creates an item that never expires.
    pub fn persistent(object: Value) -> Self {
        Self {
            object,
            expiration: NEVER,
        }
    }

    // == Is Expired ==
    /// Checks the item against the current clock.
    pub fn is_expired(&self) -> bool {
        expired_at(self.expiration, now_nanos())
    }

    // == Time To Live ==
    /// Returns the remaining lifetime, or None if the item never expires.
    ///
    /// An expired item reports `Some(Duration::ZERO)`.
    pub fn ttl_remaining(&self) -> Option<Duration> {
        if self.expiration == NEVER {
            return None;
        }
        let left = self.expiration.saturating_sub(now_nanos()).max(0);
        Some(Duration::from_nanos(left as u64))
    }
}

// == Expiration ==
/// The staleness predicate shared by every backend that tracks TTL itself.
///
/// `NEVER` is never expired; otherwise the item is stale once `now` is
/// strictly past `expiration`.
pub fn expired_at(expiration: i64, now: i64) -> bool {
    expiration != NEVER && now > expiration
}

/// Converts a relative TTL into an absolute expiration instant.
pub fn expiration_from_ttl(ttl: Duration) -> i64 {
    if ttl.is_zero() {
        return NEVER;
    }
    let ttl = i64::try_from(ttl.as_nanos()).unwrap_or(i64::MAX);
    now_nanos().saturating_add(ttl)
}

// == Utility Functions ==
/// Returns the current Unix timestamp in nanoseconds.
pub fn now_nanos() -> i64 {
    Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX)
}
