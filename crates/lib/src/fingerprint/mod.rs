//! Content fingerprints for files and build inputs.
//!
//! This module provides:
//! - `Fingerprinter`: streams files through a hash function, memoizing per path
//! - `Checksum`: the per-file digests of a file set plus their combined digest
//! - `checksum_of_strings()`: hashing of inputs that have no file backing
//!
//! A combined fingerprint is the hex digest of the plain concatenation of the
//! member digests (and any extra strings) in caller order. There is no
//! separator and no sorting, so the same files listed in a different order
//! produce a different fingerprint.

mod cache;

use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;
use tracing::{debug, trace};

pub use cache::FileHashCache;

/// Hash function used for file digests and combined fingerprints.
///
/// SHA-1 is the default: artifact keys are 40 hex characters and existing
/// deployments look them up in that form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
  #[default]
  Sha1,
  Sha256,
}

impl HashAlgorithm {
  /// Length of a hex digest produced by this algorithm.
  pub fn hex_len(self) -> usize {
    match self {
      HashAlgorithm::Sha1 => 40,
      HashAlgorithm::Sha256 => 64,
    }
  }
}

enum StreamHasher {
  Sha1(Sha1),
  Sha256(Sha256),
}

impl StreamHasher {
  fn new(algorithm: HashAlgorithm) -> Self {
    match algorithm {
      HashAlgorithm::Sha1 => StreamHasher::Sha1(Sha1::new()),
      HashAlgorithm::Sha256 => StreamHasher::Sha256(Sha256::new()),
    }
  }

  fn update(&mut self, data: &[u8]) {
    match self {
      StreamHasher::Sha1(h) => h.update(data),
      StreamHasher::Sha256(h) => h.update(data),
    }
  }

  fn finalize_hex(self) -> String {
    match self {
      StreamHasher::Sha1(h) => hex::encode(h.finalize()),
      StreamHasher::Sha256(h) => hex::encode(h.finalize()),
    }
  }
}

#[derive(Debug, thiserror::Error)]
pub enum HashError {
  #[error("invalid file pattern {pattern}: {message}")]
  Pattern { pattern: String, message: String },

  #[error("failed to read {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("pattern expansion task failed: {message}")]
  Task { message: String },
}

/// Digests of a resolved file set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Checksum {
  /// Combined fingerprint over `files` in order.
  pub checksum: String,
  /// Per-file digests.
  pub hashes: BTreeMap<PathBuf, String>,
  /// Resolved files in the order they were hashed.
  pub files: Vec<PathBuf>,
}

/// Hash a list of strings as their plain concatenation.
pub fn checksum_of_strings<S: AsRef<str>>(algorithm: HashAlgorithm, strings: &[S]) -> String {
  let mut hasher = StreamHasher::new(algorithm);
  for s in strings {
    hasher.update(s.as_ref().as_bytes());
  }
  hasher.finalize_hex()
}

/// Hash arbitrary bytes.
pub fn hash_bytes(algorithm: HashAlgorithm, data: &[u8]) -> String {
  let mut hasher = StreamHasher::new(algorithm);
  hasher.update(data);
  hasher.finalize_hex()
}

/// Computes file digests through a shared [`FileHashCache`].
///
/// Cloning is cheap; clones share the cache.
#[derive(Debug, Clone, Default)]
pub struct Fingerprinter {
  cache: Arc<FileHashCache>,
  algorithm: HashAlgorithm,
}

impl Fingerprinter {
  pub fn new(cache: Arc<FileHashCache>) -> Self {
    Self {
      cache,
      algorithm: HashAlgorithm::default(),
    }
  }

  pub fn with_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
    self.algorithm = algorithm;
    self
  }

  pub fn algorithm(&self) -> HashAlgorithm {
    self.algorithm
  }

  pub fn cache(&self) -> &Arc<FileHashCache> {
    &self.cache
  }

  /// Digest of one file, served from the cache after the first read.
  pub async fn file_digest(&self, path: &Path) -> Result<String, HashError> {
    if let Some(digest) = self.cache.get(self.algorithm, path) {
      trace!(path = %path.display(), "digest cache hit");
      return Ok(digest);
    }

    let digest = hash_file(self.algorithm, path).await?;
    self.cache.insert(self.algorithm, path.to_path_buf(), digest.clone());
    Ok(digest)
  }

  /// Hash every file matched by `patterns`.
  ///
  /// Patterns that match nothing are dropped: the files they named may have
  /// been moved or deleted since they were referenced. Directories matched by a
  /// pattern are skipped. A file matched by several patterns is hashed once, at
  /// its first position.
  pub async fn checksum_of_files<S: AsRef<str>>(&self, patterns: &[S]) -> Result<Checksum, HashError> {
    let patterns: Vec<String> = patterns.iter().map(|p| p.as_ref().to_string()).collect();
    let files = tokio::task::spawn_blocking(move || resolve_patterns(&patterns))
      .await
      .map_err(|e| HashError::Task { message: e.to_string() })??;
    self.checksum_of_resolved(files).await
  }

  /// Like [`Fingerprinter::checksum_of_files`] for concrete paths, which are
  /// never interpreted as patterns. Missing paths are dropped.
  pub async fn checksum_of_paths(&self, paths: &[PathBuf]) -> Result<Checksum, HashError> {
    let mut seen = HashSet::new();
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
      match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => {
          if seen.insert(path.clone()) {
            files.push(path.clone());
          }
        }
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
          debug!(path = %path.display(), "dropping missing file from checksum");
        }
        Err(e) => {
          return Err(HashError::Read {
            path: path.clone(),
            source: e,
          });
        }
      }
    }
    self.checksum_of_resolved(files).await
  }

  /// Fingerprint over the digests of `checksum` followed by `extras`.
  ///
  /// With no extras this equals `checksum.checksum`.
  pub fn combine<S: AsRef<str>>(&self, checksum: &Checksum, extras: &[S]) -> String {
    let mut parts: Vec<&str> = checksum
      .files
      .iter()
      .filter_map(|f| checksum.hashes.get(f).map(String::as_str))
      .collect();
    parts.extend(extras.iter().map(|s| s.as_ref()));
    checksum_of_strings(self.algorithm, &parts)
  }

  pub fn checksum_of_strings<S: AsRef<str>>(&self, strings: &[S]) -> String {
    checksum_of_strings(self.algorithm, strings)
  }

  async fn checksum_of_resolved(&self, files: Vec<PathBuf>) -> Result<Checksum, HashError> {
    let mut hashes = BTreeMap::new();
    let mut ordered = Vec::with_capacity(files.len());
    for file in &files {
      let digest = self.file_digest(file).await?;
      ordered.push(digest.clone());
      hashes.insert(file.clone(), digest);
    }

    Ok(Checksum {
      checksum: checksum_of_strings(self.algorithm, &ordered),
      hashes,
      files,
    })
  }
}

/// Expand glob patterns into an ordered, de-duplicated list of files.
///
/// Walks the filesystem synchronously; async callers go through
/// [`Fingerprinter::checksum_of_files`], which runs it on the blocking pool.
pub fn resolve_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<PathBuf>, HashError> {
  let mut seen = HashSet::new();
  let mut files = Vec::new();

  for pattern in patterns {
    let pattern = pattern.as_ref();
    let paths = glob::glob(pattern).map_err(|e| HashError::Pattern {
      pattern: pattern.to_string(),
      message: e.to_string(),
    })?;

    let mut matched = 0usize;
    for entry in paths {
      let path = entry.map_err(|e| HashError::Read {
        path: e.path().to_path_buf(),
        source: e.into(),
      })?;
      if !path.is_file() {
        continue;
      }
      matched += 1;
      if seen.insert(path.clone()) {
        files.push(path);
      }
    }

    if matched == 0 {
      debug!(pattern = %pattern, "pattern matched no files");
    }
  }

  Ok(files)
}

/// Stream a file through the hash function.
async fn hash_file(algorithm: HashAlgorithm, path: &Path) -> Result<String, HashError> {
  let read_err = |e: io::Error| HashError::Read {
    path: path.to_path_buf(),
    source: e,
  };

  let mut file = tokio::fs::File::open(path).await.map_err(read_err)?;
  let mut hasher = StreamHasher::new(algorithm);
  let mut buffer = vec![0u8; 8192];

  loop {
    let bytes_read = file.read(&mut buffer).await.map_err(read_err)?;
    if bytes_read == 0 {
      break;
    }
    hasher.update(&buffer[..bytes_read]);
  }

  Ok(hasher.finalize_hex())
}
