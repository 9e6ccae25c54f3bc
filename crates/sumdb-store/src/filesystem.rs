//! Persistent store backed by RocksDB

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rocksdb::{ColumnFamily, Options, WriteBatch, DB};
use sumdb_types::{Checkpoint, MetadataRecord, Sha256Hash};
use tokio::fs;
use tokio::sync::{Mutex, RwLock};

use crate::{Error, LocalStore, Result, StoreFuture, WatermarkKind};

const CF_LEAVES: &str = "leaves";
const CF_NODES: &str = "nodes";
const CF_METADATA: &str = "metadata";
const CF_STATE: &str = "state";
const COLUMN_FAMILIES: [&str; 4] = [CF_LEAVES, CF_NODES, CF_METADATA, CF_STATE];

const LEAF_COUNT_KEY: &[u8] = b"leaf_count";
const CHECKPOINT_KEY: &[u8] = b"checkpoint";

/// Limits file descriptor usage; RocksDB closes least recently used files
const MAX_OPEN_FILES: i32 = 256;

/// Store kept in a RocksDB database directory
///
/// Leaves, node hashes and metadata live in their own column families,
/// keyed by big-endian index (node keys are level then index), so a lookup
/// reads one record from disk and nothing is held in memory between calls.
/// The leaf count is written in the same batch as the leaf it counts.
///
/// # Directory Structure
///
/// ```text
/// store_dir/
/// ├── CURRENT, MANIFEST-*, OPTIONS-*
/// ├── *.log    (write-ahead log)
/// └── *.sst
/// ```
pub struct FileSystemStore {
    /// Database directory
    store_dir: PathBuf,
    db: RwLock<Option<Arc<DB>>>,
    /// Serialises the read-check-write sequence of `put_leaf`
    leaf_writer: Mutex<()>,
}

impl FileSystemStore {
    /// Create a store at the specified directory
    ///
    /// Nothing is read or created until [`LocalStore::init`].
    pub fn new(store_dir: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            store_dir: store_dir.as_ref().to_path_buf(),
            db: RwLock::new(None),
            leaf_writer: Mutex::new(()),
        })
    }

    /// Database directory
    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    async fn open(&self) -> Result<DB> {
        fs::create_dir_all(&self.store_dir).await?;

        let mut options = Options::default();
        options.create_if_missing(true);
        options.create_missing_column_families(true);
        options.set_max_open_files(MAX_OPEN_FILES);

        let db = DB::open_cf(&options, &self.store_dir, COLUMN_FAMILIES)?;
        tracing::debug!(
            path = %self.store_dir.display(),
            leaves = read_u64(&db, CF_STATE, LEAF_COUNT_KEY)?,
            "store opened"
        );
        Ok(db)
    }

    async fn db(&self) -> Result<Arc<DB>> {
        self.db.read().await.clone().ok_or(Error::NotInitialized)
    }

    async fn insert_leaf(&self, index: u64, data: Vec<u8>) -> Result<()> {
        let db = self.db().await?;
        let _writer = self.leaf_writer.lock().await;

        let leaf_count = read_u64(&db, CF_STATE, LEAF_COUNT_KEY)?;
        if index < leaf_count {
            let stored = db.get_pinned_cf(cf(&db, CF_LEAVES)?, index.to_be_bytes())?;
            if stored.as_deref() != Some(data.as_slice()) {
                return Err(Error::LeafMismatch { index });
            }
            return Ok(());
        }
        if index > leaf_count {
            return Err(Error::NonContiguous { index, leaf_count });
        }

        let mut batch = WriteBatch::default();
        batch.put_cf(cf(&db, CF_LEAVES)?, index.to_be_bytes(), &data);
        batch.put_cf(cf(&db, CF_STATE)?, LEAF_COUNT_KEY, (index + 1).to_be_bytes());
        db.write(batch)?;
        Ok(())
    }

    async fn put(&self, column: &str, key: &[u8], value: &[u8]) -> Result<()> {
        let db = self.db().await?;
        db.put_cf(cf(&db, column)?, key, value)?;
        Ok(())
    }

    async fn get(&self, column: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let db = self.db().await?;
        let value = db.get_cf(cf(&db, column)?, key)?;
        Ok(value)
    }
}

fn cf<'a>(db: &'a DB, name: &str) -> Result<&'a ColumnFamily> {
    db.cf_handle(name)
        .ok_or_else(|| Error::Database(format!("unknown column family: {}", name)))
}

fn node_key(level: u32, index: u64) -> [u8; 12] {
    let mut key = [0u8; 12];
    key[..4].copy_from_slice(&level.to_be_bytes());
    key[4..].copy_from_slice(&index.to_be_bytes());
    key
}

fn watermark_key(kind: WatermarkKind) -> Vec<u8> {
    format!("watermark/{}", kind.as_str()).into_bytes()
}

fn decode_u64(bytes: &[u8]) -> Result<u64> {
    <[u8; 8]>::try_from(bytes).map(u64::from_be_bytes).map_err(|_| {
        Error::Corrupt(format!("expected 8-byte counter, got {} bytes", bytes.len()))
    })
}

/// Counter stored under `key`, 0 if absent
fn read_u64(db: &DB, column: &str, key: &[u8]) -> Result<u64> {
    match db.get_pinned_cf(cf(db, column)?, key)? {
        Some(bytes) => decode_u64(&bytes),
        None => Ok(0),
    }
}

impl Drop for FileSystemStore {
    fn drop(&mut self) {
        if let Some(db) = self.db.get_mut().as_ref() {
            let _ = db.flush();
        }
    }
}

impl std::fmt::Debug for FileSystemStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSystemStore")
            .field("store_dir", &self.store_dir)
            .finish_non_exhaustive()
    }
}

impl LocalStore for FileSystemStore {
    fn init(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let mut guard = self.db.write().await;
            if guard.is_none() {
                *guard = Some(Arc::new(self.open().await?));
            }
            Ok(())
        })
    }

    fn put_leaf(&self, index: u64, data: Vec<u8>) -> StoreFuture<'_, ()> {
        Box::pin(self.insert_leaf(index, data))
    }

    fn get_leaf(&self, index: u64) -> StoreFuture<'_, Option<Vec<u8>>> {
        Box::pin(async move { self.get(CF_LEAVES, &index.to_be_bytes()).await })
    }

    fn leaf_count(&self) -> StoreFuture<'_, u64> {
        Box::pin(async move {
            let db = self.db().await?;
            read_u64(&db, CF_STATE, LEAF_COUNT_KEY)
        })
    }

    fn put_node_hash(&self, level: u32, index: u64, hash: Sha256Hash) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.put(CF_NODES, &node_key(level, index), hash.as_slice())
                .await
        })
    }

    fn get_node_hash(&self, level: u32, index: u64) -> StoreFuture<'_, Option<Sha256Hash>> {
        Box::pin(async move {
            self.get(CF_NODES, &node_key(level, index))
                .await?
                .map(|bytes| {
                    Sha256Hash::try_from_slice(&bytes).map_err(|e| {
                        Error::Corrupt(format!("node ({}, {}): {}", level, index, e))
                    })
                })
                .transpose()
        })
    }

    fn put_metadata(&self, leaf_index: u64, records: Vec<MetadataRecord>) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let value = serde_json::to_vec(&records)?;
            self.put(CF_METADATA, &leaf_index.to_be_bytes(), &value)
                .await
        })
    }

    fn get_metadata(&self, leaf_index: u64) -> StoreFuture<'_, Vec<MetadataRecord>> {
        Box::pin(async move {
            match self.get(CF_METADATA, &leaf_index.to_be_bytes()).await? {
                Some(value) => Ok(serde_json::from_slice(&value)?),
                None => Ok(Vec::new()),
            }
        })
    }

    fn watermark(&self, kind: WatermarkKind) -> StoreFuture<'_, u64> {
        Box::pin(async move {
            let db = self.db().await?;
            read_u64(&db, CF_STATE, &watermark_key(kind))
        })
    }

    fn set_watermark(&self, kind: WatermarkKind, value: u64) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.put(CF_STATE, &watermark_key(kind), &value.to_be_bytes())
                .await
        })
    }

    fn latest_checkpoint(&self) -> StoreFuture<'_, Option<Checkpoint>> {
        Box::pin(async move {
            match self.get(CF_STATE, CHECKPOINT_KEY).await? {
                Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
                None => Ok(None),
            }
        })
    }

    fn put_checkpoint(&self, checkpoint: Checkpoint) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let value = serde_json::to_vec(&checkpoint)?;
            self.put(CF_STATE, CHECKPOINT_KEY, &value).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use sumdb_types::{CheckpointSignature, RecordKind};

    fn temp_store_dir(name: &str) -> PathBuf {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        let dir = std::env::temp_dir().join(format!(
            "sumdb-store-{}-{}-{}",
            name,
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::SeqCst)
        ));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    fn checkpoint(tree_size: u64) -> Checkpoint {
        Checkpoint {
            origin: "go.sum database tree".to_string(),
            tree_size,
            root_hash: Sha256Hash::from_bytes([5; 32]),
            other_content: Vec::new(),
            signature: CheckpointSignature {
                name: "sum.golang.org".to_string(),
                key_hash: 0x033de0ae,
                signature: vec![1, 2, 3],
            },
        }
    }

    #[tokio::test]
    async fn test_requires_init() {
        let dir = temp_store_dir("uninit");
        let store = FileSystemStore::new(&dir).unwrap();
        assert!(matches!(
            store.leaf_count().await,
            Err(Error::NotInitialized)
        ));
        assert!(matches!(
            store.put_leaf(0, b"a\n".to_vec()).await,
            Err(Error::NotInitialized)
        ));
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_filesystem_store_reopen() {
        let dir = temp_store_dir("reopen");
        let hash = Sha256Hash::from_bytes([7; 32]);
        let record = MetadataRecord {
            leaf_index: 1,
            module: "golang.org/x/text".to_string(),
            version: "v0.3.0".to_string(),
            kind: RecordKind::GoMod,
            value_hash: hash,
        };

        {
            let store = FileSystemStore::new(&dir).unwrap();
            store.init().await.unwrap();
            store.put_leaf(0, b"a\n".to_vec()).await.unwrap();
            store.put_leaf(1, b"b\n".to_vec()).await.unwrap();
            store.put_node_hash(0, 1, hash).await.unwrap();
            store.put_metadata(1, vec![record.clone()]).await.unwrap();
            store.set_watermark(WatermarkKind::Hashed, 2).await.unwrap();
            store.put_checkpoint(checkpoint(2)).await.unwrap();
        }

        let store = FileSystemStore::new(&dir).unwrap();
        store.init().await.unwrap();
        assert_eq!(store.leaf_count().await.unwrap(), 2);
        assert_eq!(store.get_leaf(0).await.unwrap().unwrap(), b"a\n");
        assert!(store.get_leaf(2).await.unwrap().is_none());
        assert_eq!(store.get_node_hash(0, 1).await.unwrap(), Some(hash));
        assert_eq!(store.get_node_hash(1, 0).await.unwrap(), None);
        assert_eq!(store.get_metadata(1).await.unwrap(), vec![record]);
        assert!(store.get_metadata(0).await.unwrap().is_empty());
        assert_eq!(store.watermark(WatermarkKind::Hashed).await.unwrap(), 2);
        assert_eq!(store.watermark(WatermarkKind::Metadata).await.unwrap(), 0);
        assert_eq!(
            store.latest_checkpoint().await.unwrap(),
            Some(checkpoint(2))
        );

        // Immutability survives a reopen
        assert!(matches!(
            store.put_leaf(1, b"x\n".to_vec()).await,
            Err(Error::LeafMismatch { index: 1 })
        ));
        assert!(matches!(
            store.put_leaf(3, b"d\n".to_vec()).await,
            Err(Error::NonContiguous {
                index: 3,
                leaf_count: 2
            })
        ));

        drop(store);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_node_keys_do_not_collide_across_levels() {
        let dir = temp_store_dir("levels");
        let store = FileSystemStore::new(&dir).unwrap();
        store.init().await.unwrap();

        let low = Sha256Hash::from_bytes([1; 32]);
        let high = Sha256Hash::from_bytes([2; 32]);
        store.put_node_hash(0, 1 << 32, low).await.unwrap();
        store.put_node_hash(1, 0, high).await.unwrap();
        store.put_node_hash(1, 0, low).await.unwrap();

        assert_eq!(store.get_node_hash(0, 1 << 32).await.unwrap(), Some(low));
        assert_eq!(store.get_node_hash(1, 0).await.unwrap(), Some(low));

        drop(store);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_truncated_node_hash_is_corrupt() {
        let dir = temp_store_dir("corrupt");
        let store = FileSystemStore::new(&dir).unwrap();
        store.init().await.unwrap();
        store.put(CF_NODES, &node_key(2, 3), &[0u8; 31]).await.unwrap();

        assert!(matches!(
            store.get_node_hash(2, 3).await,
            Err(Error::Corrupt(_))
        ));

        drop(store);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
