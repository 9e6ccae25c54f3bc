//! Client for tile-based checksum databases
//!
//! This crate fetches signed checkpoints and tiles from a log such as
//! `sum.golang.org`. The [`LogClient`] trait is the seam the auditor talks
//! through; [`HttpLogClient`] is the network implementation.
//!
//! # Example
//!
//! ```no_run
//! use sumdb_client::{HttpLogClient, LogClient};
//! use sumdb_merkle::{Tile, TileGeometry};
//!
//! # async fn example() -> Result<(), sumdb_client::Error> {
//! let client = HttpLogClient::public(TileGeometry::default())?;
//! let checkpoint = client.fetch_checkpoint().await?;
//! println!("log has {} leaves", checkpoint.tree_size);
//!
//! let leaves = client.fetch_leaves(Tile { index: 0, width: 256 }).await?;
//! assert_eq!(leaves.len(), 256);
//! # Ok(())
//! # }
//! ```

mod data_tile;
mod error;
mod http;

pub use data_tile::{decode_data_tile, encode_data_tile};
pub use error::{Error, Result};
pub use http::{HttpLogClient, DEFAULT_LOG_URL};

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use sumdb_merkle::{Tile, TileGeometry, TileLevel};
use sumdb_types::Checkpoint;

/// Boxed future returned by [`LogClient`] methods
pub type LogFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Read access to a remote log
///
/// Implementations must only return checkpoints whose signature verified
/// against their configured key.
pub trait LogClient: Send + Sync {
    /// Tile layout the log is read with
    fn geometry(&self) -> TileGeometry;

    /// Fetch and verify the latest checkpoint
    fn fetch_checkpoint(&self) -> LogFuture<'_, Checkpoint>;

    /// Fetch the raw bytes of one tile
    ///
    /// Fails with [`Error::NotFound`] if the log does not serve the tile.
    fn fetch_tile(&self, level: TileLevel, tile: Tile) -> LogFuture<'_, Vec<u8>>;

    /// Fetch a data tile and split it into exactly `tile.width` leaves
    fn fetch_leaves(&self, tile: Tile) -> LogFuture<'_, Vec<Vec<u8>>> {
        Box::pin(async move {
            let data = self.fetch_tile(TileLevel::Data, tile).await?;
            decode_data_tile(&data, tile.width)
        })
    }
}

impl<T: LogClient + ?Sized> LogClient for Arc<T> {
    fn geometry(&self) -> TileGeometry {
        (**self).geometry()
    }

    fn fetch_checkpoint(&self) -> LogFuture<'_, Checkpoint> {
        (**self).fetch_checkpoint()
    }

    fn fetch_tile(&self, level: TileLevel, tile: Tile) -> LogFuture<'_, Vec<u8>> {
        (**self).fetch_tile(level, tile)
    }

    fn fetch_leaves(&self, tile: Tile) -> LogFuture<'_, Vec<Vec<u8>>> {
        (**self).fetch_leaves(tile)
    }
}
