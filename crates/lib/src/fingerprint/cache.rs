//! Session-scoped memo of file digests.
//!
//! Entries are keyed by exact path and algorithm and are never invalidated:
//! callers must not modify a file after it has been hashed within the same
//! session. Two tasks racing on the first lookup of a path both compute the
//! digest and the second insert wins; the values are identical.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use super::HashAlgorithm;

#[derive(Debug, Default)]
pub struct FileHashCache {
  entries: RwLock<HashMap<(HashAlgorithm, PathBuf), String>>,
}

impl FileHashCache {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get(&self, algorithm: HashAlgorithm, path: &Path) -> Option<String> {
    let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
    entries.get(&(algorithm, path.to_path_buf())).cloned()
  }

  pub fn insert(&self, algorithm: HashAlgorithm, path: PathBuf, digest: String) {
    let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
    entries.insert((algorithm, path), digest);
  }

  pub fn len(&self) -> usize {
    self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}
