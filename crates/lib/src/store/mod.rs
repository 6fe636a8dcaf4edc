//! Remote artifact store gateway.
//!
//! The store holds packed archives keyed by their content-addressed name. It
//! only answers "is this key present, and how big is it" and "upload this
//! file under this key". Deciding whether an upload is needed is the caller's
//! job, and failures are returned as-is with no retry.

mod dir;
mod http;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

pub use dir::DirStore;
pub use http::HttpStore;

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("request to {url} failed: {message}")]
  Request { url: String, message: String },

  #[error("{method} {url} returned HTTP {status}")]
  Status { method: String, url: String, status: u16 },

  #[error("store i/o error on {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid object key {key:?}")]
  InvalidKey { key: String },

  #[error("invalid store location {location:?}: {message}")]
  InvalidLocation { location: String, message: String },
}

#[async_trait]
pub trait ArtifactStore: Send + Sync {
  /// Size in bytes of `key` in `bucket`, or `None` when absent.
  ///
  /// `out_dir` is the caller's local output directory. Implementations may use
  /// it as a hint but must not depend on it.
  async fn exists(&self, bucket: &str, key: &str, out_dir: &Path) -> Result<Option<u64>, StoreError>;

  /// Upload `local_path` as `key` in `bucket`, replacing any existing object.
  async fn publish(&self, bucket: &str, key: &str, local_path: &Path) -> Result<(), StoreError>;
}

pub type SharedStore = Arc<dyn ArtifactStore>;

/// Pick a store implementation from a location string.
///
/// `http://` and `https://` locations use [`HttpStore`]; anything else,
/// optionally prefixed with `file://`, is a directory for [`DirStore`].
pub fn store_from_location(location: &str, token: Option<String>) -> Result<SharedStore, StoreError> {
  if location.starts_with("http://") || location.starts_with("https://") {
    return Ok(Arc::new(HttpStore::new(location, token)?));
  }

  let dir = location.strip_prefix("file://").unwrap_or(location);
  if dir.is_empty() {
    return Err(StoreError::InvalidLocation {
      location: location.to_string(),
      message: "empty path".to_string(),
    });
  }
  Ok(Arc::new(DirStore::new(dir)))
}

/// Keys are single path segments; reject anything that could escape a bucket.
pub(crate) fn validate_key(key: &str) -> Result<(), StoreError> {
  if key.is_empty() || key == "." || key == ".." || key.contains('/') || key.contains('\\') {
    return Err(StoreError::InvalidKey { key: key.to_string() });
  }
  Ok(())
}
