//! Ordered byte-key/byte-value store with prefix iteration, built on RocksDB.
//!
//! Key layout (see module docs in `domain::schema::registry` and
//! `storage::collection_store` for the two callers):
//!
//! - `0x00 b"c" <collection_id:16B>`       -> schema registry entry
//! - `0x00 b"s" <schema_sha:32B>`          -> collection_id (idempotence index)
//! - `0x01 <collection_id:16B> <record_id:16B>` -> serialized record bytes
//!
//! The leading tag byte keeps the registry's namespace and every
//! collection's namespace mutually disjoint regardless of what a
//! collection's UUID happens to look like.

use rocksdb::{IteratorMode, Options, ReadOptions, DB};
use std::path::Path;
use std::sync::Arc;

use crate::domain::error::QuipuError;

pub const META_TAG: u8 = 0x00;
pub const COLL_TAG: u8 = 0x01;

/// Thin wrapper over a single RocksDB instance, configured for prefix
/// iteration and crash-safe single-key writes (WAL is on by default for
/// every `put`/`delete`).
#[derive(Clone)]
pub struct KvEngine {
    db: Arc<DB>,
}

impl KvEngine {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, QuipuError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_max_background_jobs(num_cpus());
        opts.set_write_buffer_size(64 * 1024 * 1024);
        opts.set_level_zero_file_num_compaction_trigger(4);
        opts.set_prefix_extractor(rocksdb::SliceTransform::create_max_len_prefix(17));

        let db = DB::open(&opts, path)?;
        Ok(Self { db: Arc::new(db) })
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, QuipuError> {
        Ok(self.db.get(key)?)
    }

    /// Single-key write. WAL-backed, so a crash right after this returns
    /// never loses the write.
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<(), QuipuError> {
        Ok(self.db.put(key, value)?)
    }

    pub fn delete(&self, key: &[u8]) -> Result<(), QuipuError> {
        Ok(self.db.delete(key)?)
    }

    /// Snapshot-consistent iteration over every key starting with `prefix`,
    /// in ascending key order. The snapshot is taken at call time, so
    /// concurrent writers cannot change what an in-flight scan observes.
    pub fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, QuipuError> {
        let snapshot = self.db.snapshot();
        let mut read_opts = ReadOptions::default();
        read_opts.set_prefix_same_as_start(true);
        let mut out = Vec::new();
        let iter = snapshot.iterator_opt(IteratorMode::From(prefix, rocksdb::Direction::Forward), read_opts);
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            out.push((key.to_vec(), value.to_vec()));
        }
        Ok(out)
    }

    /// Drops every key starting with `prefix` in one atomic batch.
    pub fn drop_prefix(&self, prefix: &[u8]) -> Result<(), QuipuError> {
        let keys: Vec<Vec<u8>> = self
            .prefix_scan(prefix)?
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        let mut batch = rocksdb::WriteBatch::default();
        for key in keys {
            batch.delete(key);
        }
        self.db.write(batch)?;
        Ok(())
    }
}

fn num_cpus() -> i32 {
    std::thread::available_parallelism()
        .map(|n| n.get() as i32)
        .unwrap_or(1)
}

pub fn meta_collection_key(collection_id: &uuid::Uuid) -> Vec<u8> {
    let mut key = vec![META_TAG, b'c'];
    key.extend_from_slice(collection_id.as_bytes());
    key
}

pub fn meta_sha_key(sha: &str) -> Vec<u8> {
    let mut key = vec![META_TAG, b's'];
    key.extend_from_slice(sha.as_bytes());
    key
}

pub fn meta_collection_prefix() -> Vec<u8> {
    vec![META_TAG, b'c']
}

pub fn collection_prefix(collection_id: &uuid::Uuid) -> Vec<u8> {
    let mut key = vec![COLL_TAG];
    key.extend_from_slice(collection_id.as_bytes());
    key
}

pub fn record_key(collection_id: &uuid::Uuid, record_id: &uuid::Uuid) -> Vec<u8> {
    let mut key = collection_prefix(collection_id);
    key.extend_from_slice(record_id.as_bytes());
    key
}
