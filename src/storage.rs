//! Local mirror / proxy-queue storage seam (ambient to spec §4.4 and §4.6:
//! both the record buffer and the configuration sync's "in-memory index
//! hashed by primary key" need a durable backing store on the proxy side).
//! Grounded on the teacher's `state/store.rs` — a thin typed wrapper over
//! `sled`, JSON-encoded values, cache layer dropped since this crate's
//! callers (buffer/syncconfig) already hold their own in-memory index.

use crate::error::{CoreError, CoreResult};

/// Minimal key-value contract the rest of the crate depends on, so
/// `buffer`/`syncconfig` can be tested against an in-memory fake without
/// the `storage` feature.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &[u8]) -> CoreResult<Option<Vec<u8>>>;
    fn put(&self, key: &[u8], value: &[u8]) -> CoreResult<()>;
    fn delete(&self, key: &[u8]) -> CoreResult<()>;
    fn scan_prefix(&self, prefix: &[u8]) -> CoreResult<Vec<(Vec<u8>, Vec<u8>)>>;
}

#[cfg(feature = "storage")]
pub use sled_store::SledStore;

#[cfg(feature = "storage")]
mod sled_store {
    use super::*;

    /// `sled`-backed [`KvStore`]. One tree per logical table, opened from a
    /// single shared database handle.
    pub struct SledStore {
        db: sled::Db,
    }

    impl SledStore {
        pub fn open<P: AsRef<std::path::Path>>(path: P) -> CoreResult<Self> {
            let db = sled::open(path)
                .map_err(|e| CoreError::TransientStore(format!("failed to open database: {e}")))?;
            Ok(Self { db })
        }

        pub fn tree(&self, name: &str) -> CoreResult<SledTree> {
            let tree = self
                .db
                .open_tree(name)
                .map_err(|e| CoreError::TransientStore(format!("failed to open tree {name}: {e}")))?;
            Ok(SledTree { tree })
        }
    }

    /// One named tree within a [`SledStore`], itself a [`KvStore`].
    pub struct SledTree {
        tree: sled::Tree,
    }

    impl KvStore for SledTree {
        fn get(&self, key: &[u8]) -> CoreResult<Option<Vec<u8>>> {
            self.tree
                .get(key)
                .map(|v| v.map(|v| v.to_vec()))
                .map_err(|e| CoreError::TransientStore(format!("get failed: {e}")))
        }

        fn put(&self, key: &[u8], value: &[u8]) -> CoreResult<()> {
            self.tree
                .insert(key, value)
                .map(|_| ())
                .map_err(|e| CoreError::TransientStore(format!("put failed: {e}")))
        }

        fn delete(&self, key: &[u8]) -> CoreResult<()> {
            self.tree
                .remove(key)
                .map(|_| ())
                .map_err(|e| CoreError::TransientStore(format!("delete failed: {e}")))
        }

        fn scan_prefix(&self, prefix: &[u8]) -> CoreResult<Vec<(Vec<u8>, Vec<u8>)>> {
            self.tree
                .scan_prefix(prefix)
                .map(|r| r.map(|(k, v)| (k.to_vec(), v.to_vec())))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| CoreError::TransientStore(format!("scan failed: {e}")))
        }
    }
}

/// Serializes `value` to JSON and writes it under `key`, for callers
/// storing typed rows in a [`KvStore`].
pub fn put_json<T: serde::Serialize>(store: &dyn KvStore, key: &[u8], value: &T) -> CoreResult<()> {
    let bytes = serde_json::to_vec(value).map_err(|e| CoreError::Protocol(e.to_string()))?;
    store.put(key, &bytes)
}

/// Reads and deserializes a JSON value previously written by [`put_json`].
pub fn get_json<T: serde::de::DeserializeOwned>(store: &dyn KvStore, key: &[u8]) -> CoreResult<Option<T>> {
    match store.get(key)? {
        Some(bytes) => {
            let value = serde_json::from_slice(&bytes).map_err(|e| CoreError::Protocol(e.to_string()))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}
