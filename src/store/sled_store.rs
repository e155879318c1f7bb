//! Sled Store Module
//!
//! Embedded file-backed backend. Payloads and expiration instants live in two
//! trees of one sled database and are always written together in a single
//! transaction.

use std::path::{Path, PathBuf};
use std::time::Duration;

use sled::transaction::{
    abort, ConflictableTransactionError, ConflictableTransactionResult, TransactionalTree,
};
use sled::{IVec, Transactional};
use tracing::{debug, info, warn};

use crate::error::{CacheError, Result};
use crate::store::{apply_delta, codec, expired_at, negate, now_nanos, Item, Store, Value, NEVER};

/// Tree holding encoded items.
const PAYLOAD_TREE: &str = "store";
/// Tree holding ASCII-decimal expiration instants.
const TTL_TREE: &str = "store_ttl";

// == Options ==
/// Options for opening a [`SledStore`].
#[derive(Debug, Clone)]
pub struct SledOptions {
    /// Database directory
    pub path: PathBuf,
    /// Unix mode applied to the database directory
    pub permissions: u32,
    /// Page cache size in bytes
    pub cache_capacity: u64,
    /// Background flush interval, None disables periodic flushing
    pub flush_every_ms: Option<u64>,
    /// Remove the database when the store is dropped
    pub temporary: bool,
}

impl SledOptions {
    /// Options for a database at `path` with default settings.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }
}

impl Default for SledOptions {
    fn default() -> Self {
        Self {
            path: PathBuf::from("store.db"),
            permissions: 0o700,
            cache_capacity: 64 * 1024 * 1024,
            flush_every_ms: Some(500),
            temporary: false,
        }
    }
}

// == Sled Store ==
/// Cache backend on top of a sled database.
#[derive(Debug, Clone)]
pub struct SledStore {
    db: sled::Db,
    payload: sled::Tree,
    ttl: sled::Tree,
}

impl SledStore {
    // == Constructor ==
    /// Opens (or creates) the database described by `options`.
    pub fn open(options: &SledOptions) -> Result<Self> {
        if !options.temporary {
            if let Some(parent) = options.path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
        }

        let db = sled::Config::new()
            .path(&options.path)
            .cache_capacity(options.cache_capacity)
            .flush_every_ms(options.flush_every_ms)
            .temporary(options.temporary)
            .open()?;

        if !options.temporary {
            apply_permissions(&options.path, options.permissions)?;
        }

        let payload = db.open_tree(PAYLOAD_TREE)?;
        let ttl = db.open_tree(TTL_TREE)?;

        info!(path = %options.path.display(), "Opened sled store");
        Ok(Self { db, payload, ttl })
    }

    /// Opens a database at `path` with default options.
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(&SledOptions::new(path.as_ref()))
    }

    // == Transactions ==
    /// Runs `f` in one transaction spanning both trees.
    fn transaction<A, F>(&self, f: F) -> Result<A>
    where
        F: Fn(&TransactionalTree, &TransactionalTree) -> ConflictableTransactionResult<A, CacheError>,
    {
        let result = (&self.payload, &self.ttl).transaction(|(payload, ttl)| f(payload, ttl))?;
        Ok(result)
    }

    // == Counter ==
    fn add(&self, key: &str, delta: i64) -> Result<i64> {
        let next = self.transaction(|payload, ttl| {
            let (current, expiration) = match live(key, payload, ttl)? {
                Some((buf, expiration)) => (Some(decode(&buf)?.object), expiration),
                None => (None, NEVER),
            };

            let next = apply_delta(key, current.as_ref(), delta).or_else(abort)?;
            let item = Item {
                object: Value::Int(next),
                expiration,
            };
            write(key, &item, payload, ttl)?;
            Ok(next)
        })?;

        debug!(key, delta, value = next, "Updated counter");
        Ok(next)
    }

    /// Number of keys in the payload tree, expired ones included.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Returns true if the payload tree is empty.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

impl Store for SledStore {
    fn flush(&self) -> Result<()> {
        // Transactional trees cannot be scanned, so the key list is taken
        // first. A key written by another thread after the scan survives.
        let mut keys = Vec::new();
        for key in self.payload.iter().keys().chain(self.ttl.iter().keys()) {
            keys.push(key?);
        }

        self.transaction(|payload, ttl| {
            for key in &keys {
                payload.remove(&key[..])?;
                ttl.remove(&key[..])?;
            }
            Ok(())
        })?;

        info!(count = keys.len(), "Flushed sled store");
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Value> {
        let buf = self
            .transaction(|payload, ttl| Ok(live(key, payload, ttl)?.map(|(buf, _)| buf)))?
            .ok_or_else(|| CacheError::NotFound(key.to_string()))?;

        codec::decode(&buf).map(|item| item.object)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let existed = self.transaction(|payload, ttl| {
            let existed = live(key, payload, ttl)?.is_some();
            payload.remove(key.as_bytes())?;
            ttl.remove(key.as_bytes())?;
            Ok(existed)
        })?;

        if existed {
            Ok(())
        } else {
            Err(CacheError::NotFound(key.to_string()))
        }
    }

    fn set(&self, key: &str, value: Value, expiration: Duration) -> Result<()> {
        let item = Item::new(value, expiration);
        let buf = codec::encode(&item)?;
        let instant = item.expiration.to_string();

        self.transaction(|payload, ttl| {
            payload.insert(key.as_bytes(), buf.as_slice())?;
            ttl.insert(key.as_bytes(), instant.as_bytes())?;
            Ok(())
        })
    }

    fn increment(&self, key: &str, by: i64) -> Result<i64> {
        self.add(key, by)
    }

    fn decrement(&self, key: &str, by: i64) -> Result<i64> {
        self.add(key, negate(key, by)?)
    }

    fn number(&self, key: &str) -> Result<i64> {
        self.get(key)?
            .as_i64()
            .ok_or_else(|| CacheError::TypeMismatch(key.to_string()))
    }

    fn close(&self) -> Result<()> {
        let bytes = self.db.flush()?;
        info!(bytes, "Closed sled store");
        Ok(())
    }
}

// == Transaction Helpers ==
/// Returns the payload and expiration of a live key.
///
/// The TTL tree is consulted first; an expired key yields None without the
/// payload ever being read.
fn live(
    key: &str,
    payload: &TransactionalTree,
    ttl: &TransactionalTree,
) -> ConflictableTransactionResult<Option<(IVec, i64)>, CacheError> {
    let expiration = match ttl.get(key.as_bytes())? {
        Some(raw) => parse_instant(key, &raw).or_else(abort)?,
        None => NEVER,
    };

    if expired_at(expiration, now_nanos()) {
        return Ok(None);
    }

    Ok(payload.get(key.as_bytes())?.map(|buf| (buf, expiration)))
}

/// Writes an item and its expiration instant.
fn write(
    key: &str,
    item: &Item,
    payload: &TransactionalTree,
    ttl: &TransactionalTree,
) -> ConflictableTransactionResult<(), CacheError> {
    let buf = codec::encode(item).or_else(abort)?;
    payload.insert(key.as_bytes(), buf)?;
    ttl.insert(key.as_bytes(), item.expiration.to_string().as_bytes())?;
    Ok(())
}

fn decode(buf: &[u8]) -> std::result::Result<Item, ConflictableTransactionError<CacheError>> {
    codec::decode(buf).map_err(ConflictableTransactionError::Abort)
}

fn parse_instant(key: &str, raw: &[u8]) -> Result<i64> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| {
            warn!(key, "Garbled expiration instant");
            CacheError::Decode(format!("invalid expiration for {key}"))
        })
}

#[cfg(unix)]
fn apply_permissions(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
fn apply_permissions(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreExt;
    use serde::{Deserialize, Serialize};
    use std::collections::BTreeMap;
    use std::thread::sleep;

    fn open_store(dir: &tempfile::TempDir) -> SledStore {
        SledStore::open_path(dir.path().join("test.sled")).unwrap()
    }

    #[test]
    fn test_sled_set_and_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let mut map = BTreeMap::new();
        map.insert("name".to_string(), Value::from("go"));

        let values = vec![
            Value::from("go"),
            Value::from(true),
            vec!["abc"].into_iter().collect(),
            Value::from(1i64),
            Value::from(1.2f64),
            vec![1i64, 2, 3].into_iter().collect(),
            Value::from(3u64),
            Value::Map(map),
        ];

        for value in values {
            store.set("value", value.clone(), Duration::ZERO).unwrap();
            assert_eq!(store.get("value").unwrap(), value);
            store.remove("value").unwrap();
        }
    }

    #[test]
    fn test_sled_expired() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);

        store
            .set("test", Value::from("test"), Duration::from_nanos(1))
            .unwrap();
        sleep(Duration::from_millis(2));

        assert!(matches!(store.get("test"), Err(CacheError::NotFound(_))));
        assert!(matches!(store.remove("test"), Err(CacheError::NotFound(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn test_sled_expired_payload_is_never_decoded() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);

        store.payload.insert("bad", &b"\xF6garbage"[..]).unwrap();
        store.ttl.insert("bad", &b"1"[..]).unwrap();

        assert!(matches!(store.get("bad"), Err(CacheError::NotFound(_))));
    }

    #[test]
    fn test_sled_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);

        store.set("k", Value::Int(1), Duration::ZERO).unwrap();

        let instant = store.ttl.get("k").unwrap().unwrap();
        assert_eq!(&instant[..], b"0");
        assert!(store.payload.get("k").unwrap().is_some());
    }

    #[test]
    fn test_sled_rejects_non_finite_float_in_map() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let mut map = BTreeMap::new();
        map.insert("x".to_string(), Value::Float(f64::INFINITY));

        assert!(matches!(
            store.set("m", Value::Map(map), Duration::ZERO),
            Err(CacheError::Encode(_))
        ));
        assert!(store.payload.get("m").unwrap().is_none());
        assert!(store.ttl.get("m").unwrap().is_none());
        assert!(matches!(store.get("m"), Err(CacheError::NotFound(_))));
    }

    #[test]
    fn test_sled_struct() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct User {
            name: String,
        }

        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let user = User {
            name: "go".to_string(),
        };

        store
            .set("struct", Value::record(&user).unwrap(), Duration::ZERO)
            .unwrap();
        let out: User = store.result("struct").unwrap();
        assert_eq!(out, user);
    }

    #[test]
    fn test_sled_counters() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);

        assert_eq!(store.increment("num", 1).unwrap(), 1);
        assert_eq!(store.number("num").unwrap(), 1);
        assert_eq!(store.decrement("num", 1).unwrap(), 0);
        assert_eq!(store.decrement("missing", 1).unwrap(), -1);

        store.set("s", Value::from("go"), Duration::ZERO).unwrap();
        assert!(matches!(
            store.increment("s", 1),
            Err(CacheError::TypeMismatch(_))
        ));
        assert_eq!(store.get("s").unwrap(), Value::from("go"));
    }

    #[test]
    fn test_sled_flush() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);

        store.set("a", Value::Int(1), Duration::ZERO).unwrap();
        store.set("b", Value::from("x"), Duration::from_secs(60)).unwrap();
        store.flush().unwrap();

        assert!(store.is_empty());
        assert!(store.ttl.is_empty());
        assert!(matches!(store.get("a"), Err(CacheError::NotFound(_))));
    }

    #[test]
    fn test_sled_reopen_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.sled");

        {
            let store = SledStore::open_path(&path).unwrap();
            store.set("k", Value::from("v"), Duration::ZERO).unwrap();
            store.close().unwrap();
        }

        let store = SledStore::open_path(&path).unwrap();
        assert_eq!(store.get("k").unwrap(), Value::from("v"));
    }

    #[test]
    fn test_sled_invalid_ttl_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);

        store.set("k", Value::Int(1), Duration::ZERO).unwrap();
        store.ttl.insert("k", &b"soon"[..]).unwrap();

        assert!(matches!(store.get("k"), Err(CacheError::Decode(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_sled_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let options = SledOptions {
            permissions: 0o750,
            ..SledOptions::new(dir.path().join("perm.sled"))
        };
        let _store = SledStore::open(&options).unwrap();

        let mode = std::fs::metadata(&options.path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o750);
    }
}
