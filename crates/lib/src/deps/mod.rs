//! Dependency closure of a compiled entry point.
//!
//! The compiler reports which files it read; this module drops everything that
//! ships in the layer instead (`node_modules`) or that the caller asked to
//! ignore, canonicalizes and sorts the rest, and fingerprints the result.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::compile::{CompileError, Compiler};
use crate::fingerprint::{Fingerprinter, HashError};
use crate::reporter::ProgressReporter;

/// Directory name that always marks third-party code.
const PACKAGES_DIR: &str = "node_modules";

#[derive(Debug, Error)]
pub enum DepsError {
  #[error(transparent)]
  Compile(#[from] CompileError),

  #[error(transparent)]
  Hash(#[from] HashError),

  #[error("failed to resolve {path}: {source}")]
  Canonicalize {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

/// Every project-local file an entry point depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyClosure {
  /// Absolute paths, sorted.
  pub files: Vec<PathBuf>,
  /// Combined fingerprint over `files` in order.
  pub checksum: String,
  pub hashes: BTreeMap<PathBuf, String>,
}

/// Resolve and fingerprint the closure of `entry_point`.
///
/// `ignore_folders` are matched against whole path components, so `"test"`
/// excludes `src/test/a.ts` but not `src/testing.ts`. The entry point itself is
/// always part of the closure.
pub async fn hash_dependencies(
  compiler: &dyn Compiler,
  entry_point: &Path,
  ignore_folders: &[String],
  fingerprinter: &Fingerprinter,
  reporter: &dyn ProgressReporter,
  label: &str,
) -> Result<DependencyClosure, DepsError> {
  let inputs = compiler.inputs(entry_point, reporter, label).await?;

  let mut files = Vec::with_capacity(inputs.len() + 1);
  files.push(canonicalize(entry_point)?);
  for input in inputs {
    if is_excluded(&input, ignore_folders) {
      continue;
    }
    files.push(canonicalize(&input)?);
  }
  files.sort();
  files.dedup();

  let checksum = fingerprinter.checksum_of_paths(&files).await?;
  debug!(entry = %entry_point.display(), files = checksum.files.len(), checksum = %checksum.checksum, "hashed dependency closure");

  Ok(DependencyClosure {
    files: checksum.files,
    checksum: checksum.checksum,
    hashes: checksum.hashes,
  })
}

fn canonicalize(path: &Path) -> Result<PathBuf, DepsError> {
  dunce::canonicalize(path).map_err(|source| DepsError::Canonicalize {
    path: path.to_path_buf(),
    source,
  })
}

fn is_excluded(path: &Path, ignore_folders: &[String]) -> bool {
  path.components().any(|c| match c {
    Component::Normal(name) => {
      name == PACKAGES_DIR || ignore_folders.iter().any(|folder| name == folder.as_str())
    }
    _ => false,
  })
}
