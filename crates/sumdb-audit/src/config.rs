//! Audit configuration

use std::path::PathBuf;

use sumdb_client::DEFAULT_LOG_URL;
use sumdb_crypto::{VerifierKey, DEFAULT_VERIFIER_KEY};
use sumdb_merkle::{TileGeometry, DEFAULT_TILE_HEIGHT};

use crate::error::{AuditError, Result};

/// Default number of tile fetches in flight
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Default location of the local store
pub const DEFAULT_DB_PATH: &str = "./sum.db";

/// Settings for an audit run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditConfig {
    /// Base URL of the log
    pub log_url: String,
    /// Verifier key checkpoints must be signed with
    pub verifier_key: String,
    /// Tile height the log is read with
    pub tile_height: u8,
    /// Maximum number of tile fetches in flight
    pub concurrency: usize,
    /// Location of the local store
    pub db_path: PathBuf,
    /// Re-verify every stored tile from raw leaves after the root check
    pub extra_verify: bool,
    /// Compare the log's own hash tiles with locally computed hashes
    pub remote_tiles: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            log_url: DEFAULT_LOG_URL.to_string(),
            verifier_key: DEFAULT_VERIFIER_KEY.to_string(),
            tile_height: DEFAULT_TILE_HEIGHT,
            concurrency: DEFAULT_CONCURRENCY,
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            extra_verify: false,
            remote_tiles: false,
        }
    }
}

impl AuditConfig {
    /// Audit the log at `log_url`, signed with `verifier_key`
    pub fn for_log(log_url: impl Into<String>, verifier_key: impl Into<String>) -> Self {
        Self {
            log_url: log_url.into(),
            verifier_key: verifier_key.into(),
            ..Default::default()
        }
    }

    /// Use a different tile height
    pub fn tile_height(mut self, height: u8) -> Self {
        self.tile_height = height;
        self
    }

    /// Use a different fetch concurrency
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Store data at `path`
    pub fn db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = path.into();
        self
    }

    /// Enable tile re-verification
    pub fn extra_verify(mut self, enabled: bool) -> Self {
        self.extra_verify = enabled;
        self
    }

    /// Enable the remote hash tile check
    pub fn remote_tiles(mut self, enabled: bool) -> Self {
        self.remote_tiles = enabled;
        self
    }

    /// Tile geometry for the configured height
    pub fn geometry(&self) -> Result<TileGeometry> {
        Ok(TileGeometry::new(self.tile_height)?)
    }

    /// Parse the configured verifier key
    pub fn parse_verifier_key(&self) -> Result<VerifierKey> {
        VerifierKey::parse(&self.verifier_key)
            .map_err(|e| AuditError::Config(format!("verifier key: {}", e)))
    }

    /// Check the settings are usable
    pub fn validate(&self) -> Result<()> {
        self.geometry()?;
        self.parse_verifier_key()?;
        if self.concurrency == 0 {
            return Err(AuditError::Config(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.log_url.is_empty() {
            return Err(AuditError::Config("log URL is empty".to_string()));
        }
        Ok(())
    }
}
