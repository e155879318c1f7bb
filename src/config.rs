//! Configuration Module
//!
//! Handles loading the cache configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::CacheError;

// == Backend Kind ==
/// Storage engine selected for a cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// In-process map
    Memory,
    /// Embedded sled database
    Sled,
    /// Remote Redis server
    Redis,
}

impl FromStr for BackendKind {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(BackendKind::Memory),
            "sled" => Ok(BackendKind::Sled),
            "redis" => Ok(BackendKind::Redis),
            other => Err(CacheError::Config(format!(
                "Unknown cache backend: '{other}'. Supported: memory, sled, redis"
            ))),
        }
    }
}

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Selected storage engine
    pub backend: BackendKind,
    /// Directory of the sled database
    pub sled_path: PathBuf,
    /// Unix mode of the sled database directory
    pub sled_permissions: u32,
    /// Sled page cache size in bytes
    pub sled_cache_capacity: u64,
    /// Redis server address as host:port
    pub redis_addr: String,
    /// Redis ACL username
    pub redis_username: Option<String>,
    /// Redis password
    pub redis_password: Option<String>,
    /// Redis database index
    pub redis_db: i64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_BACKEND` - `memory`, `sled` or `redis` (default: memory)
    /// - `SLED_PATH` - Database directory (default: store.db)
    /// - `SLED_PERMISSIONS` - Octal directory mode (default: 700)
    /// - `SLED_CACHE_CAPACITY` - Page cache bytes (default: 64 MiB)
    /// - `REDIS_ADDR` - Server address (default: localhost:6379)
    /// - `REDIS_USERNAME` / `REDIS_PASSWORD` - Credentials (default: unset)
    /// - `REDIS_DB` - Database index (default: 0)
    ///
    /// Fails only on an unknown backend name; other malformed values fall
    /// back to their defaults.
    pub fn from_env() -> Result<Self, CacheError> {
        let defaults = Self::default();

        Ok(Self {
            backend: match env::var("CACHE_BACKEND") {
                Ok(v) => v.parse()?,
                Err(_) => defaults.backend,
            },
            sled_path: env::var("SLED_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.sled_path),
            sled_permissions: env::var("SLED_PERMISSIONS")
                .ok()
                .and_then(|v| u32::from_str_radix(v.trim(), 8).ok())
                .unwrap_or(defaults.sled_permissions),
            sled_cache_capacity: env::var("SLED_CACHE_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.sled_cache_capacity),
            redis_addr: env::var("REDIS_ADDR").unwrap_or(defaults.redis_addr),
            redis_username: env::var("REDIS_USERNAME").ok().filter(|v| !v.is_empty()),
            redis_password: env::var("REDIS_PASSWORD").ok().filter(|v| !v.is_empty()),
            redis_db: env::var("REDIS_DB")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.redis_db),
        })
    }

    /// Sled options derived from this configuration.
    #[cfg(feature = "sled-backend")]
    pub fn sled_options(&self) -> crate::store::SledOptions {
        crate::store::SledOptions {
            path: self.sled_path.clone(),
            permissions: self.sled_permissions,
            cache_capacity: self.sled_cache_capacity,
            ..crate::store::SledOptions::default()
        }
    }

    /// Redis options derived from this configuration.
    #[cfg(feature = "redis-backend")]
    pub fn redis_options(&self) -> crate::store::RedisOptions {
        crate::store::RedisOptions {
            addr: self.redis_addr.clone(),
            username: self.redis_username.clone(),
            password: self.redis_password.clone(),
            db: self.redis_db,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendKind::Memory,
            sled_path: PathBuf::from("store.db"),
            sled_permissions: 0o700,
            sled_cache_capacity: 64 * 1024 * 1024,
            redis_addr: "localhost:6379".to_string(),
            redis_username: None,
            redis_password: None,
            redis_db: 0,
        }
    }
}
