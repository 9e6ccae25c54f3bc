//! HTTP log client

use crate::error::{Error, Result};
use crate::{LogClient, LogFuture};
use reqwest::StatusCode;
use sumdb_crypto::{open_checkpoint, VerifierKey};
use sumdb_merkle::{Tile, TileGeometry, TileLevel};
use sumdb_types::Checkpoint;

/// Base URL of the public Go checksum database
pub const DEFAULT_LOG_URL: &str = "https://sum.golang.org";

/// A client for a checksum database served over HTTP
pub struct HttpLogClient {
    /// Base URL of the log
    url: String,
    /// Key checkpoints must be signed with
    verifier_key: VerifierKey,
    /// Tile layout used to build tile paths
    geometry: TileGeometry,
    /// HTTP client
    client: reqwest::Client,
}

impl HttpLogClient {
    /// Create a new client
    pub fn new(url: impl Into<String>, verifier_key: VerifierKey, geometry: TileGeometry) -> Self {
        let url: String = url.into();
        Self {
            url: url.trim_end_matches('/').to_string(),
            verifier_key,
            geometry,
            client: reqwest::Client::new(),
        }
    }

    /// Create a client for sum.golang.org with its published key
    pub fn public(geometry: TileGeometry) -> Result<Self> {
        let verifier_key = VerifierKey::parse(sumdb_crypto::DEFAULT_VERIFIER_KEY)?;
        Ok(Self::new(DEFAULT_LOG_URL, verifier_key, geometry))
    }

    /// Base URL of the log
    pub fn url(&self) -> &str {
        &self.url
    }

    /// GET a path below the base URL
    async fn get(&self, path: &str) -> Result<Vec<u8>> {
        let url = format!("{}/{}", self.url, path);
        tracing::debug!(%url, "fetching");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return Err(Error::NotFound(url));
        }
        if !status.is_success() {
            return Err(Error::Http(format!("failed to get {}: {}", url, status)));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Http(format!("failed to read {}: {}", url, e)))?;
        Ok(body.to_vec())
    }
}

impl LogClient for HttpLogClient {
    fn geometry(&self) -> TileGeometry {
        self.geometry
    }

    fn fetch_checkpoint(&self) -> LogFuture<'_, Checkpoint> {
        Box::pin(async move {
            let note = self.get("latest").await?;
            let checkpoint = open_checkpoint(&note, &self.verifier_key)?;
            tracing::debug!(
                tree_size = checkpoint.tree_size,
                root = %checkpoint.root_hash,
                "verified checkpoint"
            );
            Ok(checkpoint)
        })
    }

    fn fetch_tile(&self, level: TileLevel, tile: Tile) -> LogFuture<'_, Vec<u8>> {
        Box::pin(async move {
            let path = self.geometry.path(level, tile);
            self.get(&path).await
        })
    }
}

impl std::fmt::Debug for HttpLogClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpLogClient")
            .field("url", &self.url)
            .field("verifier_key", &self.verifier_key)
            .field("geometry", &self.geometry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let key = sumdb_crypto::DEFAULT_VERIFIER_KEY.parse().unwrap();
        let client = HttpLogClient::new("https://sum.golang.org/", key, TileGeometry::default());
        assert_eq!(client.url(), "https://sum.golang.org");
    }

    #[test]
    fn test_public_client() {
        let client = HttpLogClient::public(TileGeometry::default()).unwrap();
        assert_eq!(client.url(), DEFAULT_LOG_URL);
        assert_eq!(client.geometry().height(), 8);
    }

    #[tokio::test]
    async fn test_unreachable_log_is_http_error() {
        let key = sumdb_crypto::DEFAULT_VERIFIER_KEY.parse().unwrap();
        let client = HttpLogClient::new("http://127.0.0.1:1", key, TileGeometry::default());
        let err = client.fetch_checkpoint().await.unwrap_err();
        assert!(matches!(err, Error::Http(_)), "{:?}", err);
    }
}
