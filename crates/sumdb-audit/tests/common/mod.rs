//! In-process checksum database used by the audit tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use sumdb_audit::{AuditConfig, Auditor};
use sumdb_client::{encode_data_tile, Error, LogClient, LogFuture};
use sumdb_crypto::{open_checkpoint, NoteSigner, VerifierKey};
use sumdb_merkle::{hash_leaf, root_from_leaf_hashes, Tile, TileGeometry, TileLevel};
use sumdb_store::{LocalStore, StoreFuture, WatermarkKind};
use sumdb_types::{Checkpoint, MetadataRecord, Sha256Hash};
use tokio_util::sync::CancellationToken;

pub const ORIGIN: &str = "go.sum database tree";
pub const SIGNER_NAME: &str = "sum.example.com";
pub const TEST_HEIGHT: u8 = 2;

/// A valid leaf payload holding two records
pub fn record_leaf(i: u64) -> Vec<u8> {
    let module_hash = hash_leaf(format!("zip {}", i).as_bytes());
    let mod_hash = hash_leaf(format!("mod {}", i).as_bytes());
    format!(
        "example.com/mod{i} v1.0.{i} h1:{}\nexample.com/mod{i} v1.0.{i}/go.mod h1:{}\n",
        module_hash.to_base64(),
        mod_hash.to_base64(),
    )
    .into_bytes()
}

#[derive(Default)]
struct MockState {
    leaves: Vec<Vec<u8>>,
    served_overrides: HashMap<u64, Vec<u8>>,
    hash_overrides: HashMap<(u32, u64), Sha256Hash>,
    claimed_root: Option<Sha256Hash>,
    failing_tile: Option<u64>,
    data_tiles_served: Vec<Tile>,
}

/// A log held in memory that signs its own checkpoints
///
/// Tests can make it misbehave: serve leaves that differ from the ones it
/// signed, rewrite history, shrink, sign a bogus root, or serve bad hash
/// tiles.
pub struct MockLog {
    geometry: TileGeometry,
    signer: NoteSigner,
    verifier: VerifierKey,
    state: Mutex<MockState>,
}

impl MockLog {
    pub fn new(size: u64) -> Arc<Self> {
        let signer = NoteSigner::generate(SIGNER_NAME).unwrap();
        let verifier = signer.verifier_key();
        let log = Self {
            geometry: TileGeometry::new(TEST_HEIGHT).unwrap(),
            signer,
            verifier,
            state: Mutex::new(MockState::default()),
        };
        log.append(size);
        Arc::new(log)
    }

    /// Same log contents, but checkpoints are checked against another key
    pub fn with_foreign_verifier(size: u64) -> Arc<Self> {
        let mut log = Arc::try_unwrap(Self::new(size)).ok().unwrap();
        log.verifier = NoteSigner::generate(SIGNER_NAME)
            .unwrap()
            .verifier_key();
        Arc::new(log)
    }

    pub fn verifier_key(&self) -> VerifierKey {
        self.signer.verifier_key()
    }

    pub fn size(&self) -> u64 {
        self.state.lock().unwrap().leaves.len() as u64
    }

    /// Append `count` valid leaves
    pub fn append(&self, count: u64) {
        let mut state = self.state.lock().unwrap();
        let start = state.leaves.len() as u64;
        state
            .leaves
            .extend((start..start + count).map(record_leaf));
    }

    pub fn push_raw(&self, data: &[u8]) {
        self.state.lock().unwrap().leaves.push(data.to_vec());
    }

    /// Change a leaf in the signed history
    pub fn rewrite_leaf(&self, index: u64, data: &[u8]) {
        self.state.lock().unwrap().leaves[index as usize] = data.to_vec();
    }

    /// Serve different bytes for a leaf than the ones the root covers
    pub fn serve_corrupted_leaf(&self, index: u64) {
        let mut state = self.state.lock().unwrap();
        let mut data = state.leaves[index as usize].clone();
        data[0] ^= 0x01;
        state.served_overrides.insert(index, data);
    }

    pub fn truncate(&self, size: u64) {
        self.state.lock().unwrap().leaves.truncate(size as usize);
    }

    pub fn claim_root(&self, root: Sha256Hash) {
        self.state.lock().unwrap().claimed_root = Some(root);
    }

    /// Serve a wrong hash at tree `level`, position `index`
    pub fn tamper_hash(&self, level: u32, index: u64) {
        self.state
            .lock()
            .unwrap()
            .hash_overrides
            .insert((level, index), Sha256Hash::from_bytes([0xee; 32]));
    }

    /// Fail data tiles from `index` on with a transport error
    pub fn fail_data_tiles_from(&self, index: Option<u64>) {
        self.state.lock().unwrap().failing_tile = index;
    }

    pub fn data_tiles_served(&self) -> Vec<Tile> {
        self.state.lock().unwrap().data_tiles_served.clone()
    }

    pub fn true_root(&self) -> Sha256Hash {
        let state = self.state.lock().unwrap();
        root_from_leaf_hashes(state.leaves.iter().map(|leaf| hash_leaf(leaf)).collect())
    }

    fn subtree_hash(leaves: &[Vec<u8>], level: u32, index: u64) -> Sha256Hash {
        let first = (index << level) as usize;
        let last = ((index + 1) << level) as usize;
        root_from_leaf_hashes(leaves[first..last].iter().map(|leaf| hash_leaf(leaf)).collect())
    }
}

impl LogClient for MockLog {
    fn geometry(&self) -> TileGeometry {
        self.geometry
    }

    fn fetch_checkpoint(&self) -> LogFuture<'_, Checkpoint> {
        Box::pin(async move {
            let (size, root) = {
                let state = self.state.lock().unwrap();
                let root = state.claimed_root.unwrap_or_else(|| {
                    root_from_leaf_hashes(state.leaves.iter().map(|leaf| hash_leaf(leaf)).collect())
                });
                (state.leaves.len() as u64, root)
            };
            let note = self
                .signer
                .sign_checkpoint(ORIGIN, size, &root)
                .map_err(Error::from)?;
            Ok(open_checkpoint(note.as_bytes(), &self.verifier)?)
        })
    }

    fn fetch_tile(&self, level: TileLevel, tile: Tile) -> LogFuture<'_, Vec<u8>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            let path = self.geometry.path(level, tile);

            match level {
                TileLevel::Data => {
                    if state.failing_tile.is_some_and(|failing| tile.index >= failing) {
                        return Err(Error::Http(format!("connection reset fetching {}", path)));
                    }
                    let start = self.geometry.tile_start(&tile);
                    let end = start + tile.width as u64;
                    if end > state.leaves.len() as u64 {
                        return Err(Error::NotFound(path));
                    }
                    let leaves: Vec<Vec<u8>> = (start..end)
                        .map(|index| {
                            state
                                .served_overrides
                                .get(&index)
                                .unwrap_or(&state.leaves[index as usize])
                                .clone()
                        })
                        .collect();
                    state.data_tiles_served.push(tile);
                    Ok(encode_data_tile(&leaves))
                }
                TileLevel::Hashes(tile_level) => {
                    let tree_level = tile_level * self.geometry.height() as u32;
                    let start = self.geometry.tile_start(&tile);
                    let end = start + tile.width as u64;
                    if (end << tree_level) > state.leaves.len() as u64 {
                        return Err(Error::NotFound(path));
                    }
                    let mut data = Vec::with_capacity(tile.width as usize * 32);
                    for index in start..end {
                        let hash = state
                            .hash_overrides
                            .get(&(tree_level, index))
                            .copied()
                            .unwrap_or_else(|| {
                                Self::subtree_hash(&state.leaves, tree_level, index)
                            });
                        data.extend_from_slice(hash.as_slice());
                    }
                    Ok(data)
                }
            }
        })
    }
}

/// Cancels a token when the `cancel_on`-th data tile is requested
///
/// The tile itself is still served.
pub struct CancelOnFetch {
    log: Arc<MockLog>,
    cancel: CancellationToken,
    cancel_on: usize,
    fetches: AtomicUsize,
}

impl LogClient for CancelOnFetch {
    fn geometry(&self) -> TileGeometry {
        self.log.geometry()
    }

    fn fetch_checkpoint(&self) -> LogFuture<'_, Checkpoint> {
        self.log.fetch_checkpoint()
    }

    fn fetch_tile(&self, level: TileLevel, tile: Tile) -> LogFuture<'_, Vec<u8>> {
        if level == TileLevel::Data {
            let fetched = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
            if fetched == self.cancel_on {
                self.cancel.cancel();
            }
        }
        self.log.fetch_tile(level, tile)
    }
}

/// Cancels a token when the `cancel_on`-th node hash is written
///
/// The write itself still goes through.
pub struct CancelOnNodeWrite {
    store: Arc<dyn LocalStore>,
    cancel: CancellationToken,
    cancel_on: usize,
    writes: AtomicUsize,
}

impl LocalStore for CancelOnNodeWrite {
    fn init(&self) -> StoreFuture<'_, ()> {
        self.store.init()
    }

    fn put_leaf(&self, index: u64, data: Vec<u8>) -> StoreFuture<'_, ()> {
        self.store.put_leaf(index, data)
    }

    fn get_leaf(&self, index: u64) -> StoreFuture<'_, Option<Vec<u8>>> {
        self.store.get_leaf(index)
    }

    fn leaf_count(&self) -> StoreFuture<'_, u64> {
        self.store.leaf_count()
    }

    fn put_node_hash(&self, level: u32, index: u64, hash: Sha256Hash) -> StoreFuture<'_, ()> {
        if self.writes.fetch_add(1, Ordering::SeqCst) + 1 == self.cancel_on {
            self.cancel.cancel();
        }
        self.store.put_node_hash(level, index, hash)
    }

    fn get_node_hash(&self, level: u32, index: u64) -> StoreFuture<'_, Option<Sha256Hash>> {
        self.store.get_node_hash(level, index)
    }

    fn put_metadata(&self, leaf_index: u64, records: Vec<MetadataRecord>) -> StoreFuture<'_, ()> {
        self.store.put_metadata(leaf_index, records)
    }

    fn get_metadata(&self, leaf_index: u64) -> StoreFuture<'_, Vec<MetadataRecord>> {
        self.store.get_metadata(leaf_index)
    }

    fn watermark(&self, kind: WatermarkKind) -> StoreFuture<'_, u64> {
        self.store.watermark(kind)
    }

    fn set_watermark(&self, kind: WatermarkKind, value: u64) -> StoreFuture<'_, ()> {
        self.store.set_watermark(kind, value)
    }

    fn latest_checkpoint(&self) -> StoreFuture<'_, Option<Checkpoint>> {
        self.store.latest_checkpoint()
    }

    fn put_checkpoint(&self, checkpoint: Checkpoint) -> StoreFuture<'_, ()> {
        self.store.put_checkpoint(checkpoint)
    }
}

fn test_config(log: &MockLog) -> AuditConfig {
    AuditConfig::for_log("https://sum.example.com", log.verifier_key().to_string())
        .tile_height(TEST_HEIGHT)
        .concurrency(3)
}

/// An auditor over `log` and `store` with the test tile height
pub fn auditor(
    log: &Arc<MockLog>,
    store: Arc<dyn LocalStore>,
    configure: impl FnOnce(AuditConfig) -> AuditConfig,
) -> Auditor {
    Auditor::new(store, log.clone(), configure(test_config(log))).unwrap()
}

/// An auditor fetching one tile at a time that cancels itself on the
/// `cancel_on`-th data tile request
pub fn auditor_cancelled_on_fetch(
    log: &Arc<MockLog>,
    store: Arc<dyn LocalStore>,
    cancel_on: usize,
) -> Auditor {
    let cancel = CancellationToken::new();
    let client = Arc::new(CancelOnFetch {
        log: log.clone(),
        cancel: cancel.clone(),
        cancel_on,
        fetches: AtomicUsize::new(0),
    });
    Auditor::new(store, client, test_config(log).concurrency(1))
        .unwrap()
        .with_cancellation_token(cancel)
}

/// An auditor that cancels itself on the `cancel_on`-th node hash write
pub fn auditor_cancelled_on_node_write(
    log: &Arc<MockLog>,
    store: Arc<dyn LocalStore>,
    cancel_on: usize,
) -> Auditor {
    let cancel = CancellationToken::new();
    let store = Arc::new(CancelOnNodeWrite {
        store,
        cancel: cancel.clone(),
        cancel_on,
        writes: AtomicUsize::new(0),
    });
    Auditor::new(store, log.clone(), test_config(log))
        .unwrap()
        .with_cancellation_token(cancel)
}
