//! Types shared by the layer and function packers.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::archive::ArchiveError;
use crate::compile::CompileError;
use crate::consts::ARCHIVE_EXTENSION;
use crate::deps::{DependencyClosure, DepsError};
use crate::fingerprint::{Fingerprinter, HashError};
use crate::process::{ProcessError, exit_code};
use crate::reporter::{SharedReporter, TracingReporter};
use crate::store::{SharedStore, StoreError};

use super::install::{CommandInstaller, SharedInstaller};

/// Everything that can stop a single artifact from being packed.
#[derive(Debug, Error)]
pub enum PackError {
  #[error("{what} not found: {path}")]
  InputMissing { what: String, path: PathBuf },

  #[error("could not resolve dependency \"{dependency}\" in {file}")]
  DependencyResolution { dependency: String, file: String },

  #[error("`{cmd}` in {cwd} exited with code {}", exit_code(.code))]
  CommandFailed {
    cmd: String,
    cwd: PathBuf,
    code: Option<i32>,
  },

  #[error("{what} is empty")]
  EmptyCommand { what: String },

  #[error("failed to start `{cmd}`: {source}")]
  Spawn {
    cmd: String,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to write archive {path}: {message}")]
  ArchiveWrite { path: PathBuf, message: String },

  #[error(transparent)]
  RemoteStore(#[from] StoreError),

  #[error(transparent)]
  Hash(#[from] HashError),

  #[error("invalid manifest {path}: {source}")]
  Manifest {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("compiler produced unusable output: {message}")]
  CompilerOutput { message: String },

  #[error("{} function(s) failed to pack: {}", .failures.len(), failure_names(.failures))]
  LambdasFailed { failures: Vec<(String, PackError)> },

  #[error("pack task failed: {message}")]
  Task { message: String },

  #[error("i/o error on {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

fn failure_names(failures: &[(String, PackError)]) -> String {
  failures
    .iter()
    .map(|(name, err)| format!("{}: {}", name, err))
    .collect::<Vec<_>>()
    .join("; ")
}

impl PackError {
  pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> PackError {
    let path = path.into();
    move |source| PackError::Io { path, source }
  }
}

impl From<ProcessError> for PackError {
  fn from(err: ProcessError) -> Self {
    match err {
      ProcessError::EmptyCommand => PackError::EmptyCommand {
        what: "command".to_string(),
      },
      ProcessError::Spawn { cmd, source } => PackError::Spawn { cmd, source },
      ProcessError::Failed { cmd, cwd, code, .. } => PackError::CommandFailed { cmd, cwd, code },
    }
  }
}

impl From<CompileError> for PackError {
  fn from(err: CompileError) -> Self {
    match err {
      CompileError::Unresolved { dependency, file } => PackError::DependencyResolution { dependency, file },
      CompileError::Process(err) => err.into(),
      CompileError::Metadata { path, message } => PackError::CompilerOutput {
        message: format!("{}: {}", path.display(), message),
      },
      CompileError::Io { path, source } => PackError::Io { path, source },
    }
  }
}

impl From<DepsError> for PackError {
  fn from(err: DepsError) -> Self {
    match err {
      DepsError::Compile(err) => err.into(),
      DepsError::Hash(err) => PackError::Hash(err),
      DepsError::Canonicalize { path, source } => PackError::Io { path, source },
    }
  }
}

impl From<ArchiveError> for PackError {
  fn from(err: ArchiveError) -> Self {
    match err {
      ArchiveError::Io { path, source } => PackError::ArchiveWrite {
        path,
        message: source.to_string(),
      },
      ArchiveError::Zip { path, message } => PackError::ArchiveWrite { path, message },
      ArchiveError::Task(message) => PackError::ArchiveWrite {
        path: PathBuf::new(),
        message,
      },
    }
  }
}

/// Content-addressed identity of a packed archive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactDescriptor {
  pub name: String,
  pub fingerprint: String,
  pub suffix: Option<String>,
  pub extension: String,
}

impl ArtifactDescriptor {
  pub fn new(name: impl Into<String>, fingerprint: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      fingerprint: fingerprint.into(),
      suffix: None,
      extension: ARCHIVE_EXTENSION.to_string(),
    }
  }

  pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
    self.suffix = Some(suffix.into());
    self
  }

  /// Object key: `<name>-<fingerprint>[-<suffix>].<extension>`.
  pub fn key(&self) -> String {
    match &self.suffix {
      Some(suffix) => format!("{}-{}-{}.{}", self.name, self.fingerprint, suffix, self.extension),
      None => format!("{}-{}.{}", self.name, self.fingerprint, self.extension),
    }
  }
}

/// Which step of the pack produced the artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CacheStatus {
  /// Already present in the store; nothing was built or uploaded.
  Remote,
  /// Found in the local output directory and uploaded.
  Local,
  /// Built from scratch and uploaded.
  Built,
}

impl CacheStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      CacheStatus::Remote => "remote",
      CacheStatus::Local => "local",
      CacheStatus::Built => "built",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerPack {
  pub name: String,
  pub zip_file_name: String,
  pub fingerprint: String,
  pub size: u64,
  pub cache: CacheStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LambdaPack {
  pub name: String,
  pub zip_file_name: String,
  pub dependencies: DependencyClosure,
  pub size: u64,
  pub cache: CacheStatus,
}

/// Where every function of one deployment unit was published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayeredLambdas {
  pub id: String,
  pub lambda_zip_file_names: BTreeMap<String, String>,
}

/// Collaborators and settings for one packing session.
///
/// Clones share the digest cache, store, reporter and installer.
#[derive(Clone)]
pub struct PackContext {
  pub store: SharedStore,
  pub fingerprinter: Fingerprinter,
  pub reporter: SharedReporter,
  pub installer: SharedInstaller,
  pub bucket: String,
  pub out_dir: PathBuf,
  /// Upper bound on functions packed at once.
  pub parallelism: usize,
}

impl PackContext {
  pub fn new(store: SharedStore, bucket: impl Into<String>, out_dir: impl Into<PathBuf>) -> Self {
    Self {
      store,
      fingerprinter: Fingerprinter::default(),
      reporter: Arc::new(TracingReporter),
      installer: Arc::new(CommandInstaller),
      bucket: bucket.into(),
      out_dir: out_dir.into(),
      parallelism: default_parallelism(),
    }
  }

  pub fn with_fingerprinter(mut self, fingerprinter: Fingerprinter) -> Self {
    self.fingerprinter = fingerprinter;
    self
  }

  pub fn with_reporter(mut self, reporter: SharedReporter) -> Self {
    self.reporter = reporter;
    self
  }

  pub fn with_installer(mut self, installer: SharedInstaller) -> Self {
    self.installer = installer;
    self
  }

  pub fn with_parallelism(mut self, parallelism: usize) -> Self {
    self.parallelism = parallelism.max(1);
    self
  }
}

pub fn default_parallelism() -> usize {
  std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
}
