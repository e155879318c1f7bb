//! Polycache - A uniform caching facade
//!
//! One API (get, set, remove, flush, counters, remember) over interchangeable
//! storage engines: an in-process map, an embedded sled database or a remote
//! Redis server.

pub mod cache;
pub mod config;
pub mod error;
pub mod store;

pub use cache::Cache;
pub use config::{BackendKind, Config};
pub use error::{CacheError, Result};
pub use store::{Store, StoreExt, Value};
