//! Compiler strategies for function bundles.
//!
//! A compiler turns one entry point into one output file with third-party
//! packages left external (they ship in the layer), and reports which
//! project-local files the entry point pulls in. The packer treats it as a
//! black box.

mod esbuild;
mod passthrough;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::process::ProcessError;
use crate::reporter::ProgressReporter;

pub use esbuild::{EsbuildCompiler, EsbuildOptions};
pub use passthrough::PassthroughCompiler;

#[derive(Debug, Error)]
pub enum CompileError {
  #[error("could not resolve dependency \"{dependency}\" imported from {file}")]
  Unresolved { dependency: String, file: String },

  #[error(transparent)]
  Process(#[from] ProcessError),

  #[error("unreadable compiler metadata {path}: {message}")]
  Metadata { path: PathBuf, message: String },

  #[error("compiler i/o error on {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

/// A single-entry, single-output build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileRequest {
  pub entry_point: PathBuf,
  pub output_path: PathBuf,
  /// Leave packages resolved by name out of the bundle.
  pub externalize_third_party: bool,
}

#[async_trait]
pub trait Compiler: Send + Sync {
  fn name(&self) -> &str;

  /// Every option that influences the output. It is serialized into the
  /// artifact fingerprint, so changing a flag invalidates cached artifacts.
  fn options(&self) -> serde_json::Value;

  /// Files the entry point reads, as reported by the compiler's own module
  /// resolution. May include packages; callers filter them.
  async fn inputs(
    &self,
    entry_point: &Path,
    reporter: &dyn ProgressReporter,
    label: &str,
  ) -> Result<Vec<PathBuf>, CompileError>;

  async fn compile(
    &self,
    request: &CompileRequest,
    reporter: &dyn ProgressReporter,
    label: &str,
  ) -> Result<(), CompileError>;
}

pub type SharedCompiler = Arc<dyn Compiler>;

/// Compiler selection as written in the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CompilerConfig {
  Esbuild(EsbuildOptions),
  Passthrough,
}

impl Default for CompilerConfig {
  fn default() -> Self {
    CompilerConfig::Esbuild(EsbuildOptions::default())
  }
}

impl CompilerConfig {
  pub fn build(&self) -> SharedCompiler {
    match self {
      CompilerConfig::Esbuild(options) => Arc::new(EsbuildCompiler::new(options.clone())),
      CompilerConfig::Passthrough => Arc::new(PassthroughCompiler),
    }
  }
}
