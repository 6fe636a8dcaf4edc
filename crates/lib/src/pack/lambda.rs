//! Function archive packing.

use std::path::PathBuf;

use tracing::info;

use super::types::{ArtifactDescriptor, CacheStatus, LambdaPack, PackContext, PackError};
use super::{CacheLookup, check_caches, publish};
use crate::archive::{ArchiveEntry, build_archive};
use crate::compile::{CompileRequest, Compiler};
use crate::consts::{FUNCTION_ARCHIVE_SUFFIX, FUNCTION_ENTRY_FILENAME, FUNCTION_HASHES_FILENAME, MANIFEST_FILENAME};
use crate::deps::{DependencyClosure, hash_dependencies};
use crate::fingerprint::Fingerprinter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LambdaRequest {
  /// Logical function name, the first part of the key.
  pub name: String,
  pub entry_point: PathBuf,
  /// Folder names whose files never count towards the closure.
  pub ignore_folders: Vec<String>,
}

impl LambdaRequest {
  pub fn new(name: impl Into<String>, entry_point: impl Into<PathBuf>) -> Self {
    Self {
      name: name.into(),
      entry_point: entry_point.into(),
      ignore_folders: Vec::new(),
    }
  }

  pub fn with_ignore_folders(mut self, folders: Vec<String>) -> Self {
    self.ignore_folders = folders;
    self
  }
}

/// Closure checksum followed by the compiler options as compact JSON.
pub fn function_fingerprint(fingerprinter: &Fingerprinter, closure: &DependencyClosure, compiler: &dyn Compiler) -> String {
  fingerprinter.checksum_of_strings(&[closure.checksum.clone(), compiler.options().to_string()])
}

/// Compile, archive and publish one function.
pub async fn pack_lambda(
  ctx: &PackContext,
  compiler: &dyn Compiler,
  request: &LambdaRequest,
) -> Result<LambdaPack, PackError> {
  let label = request.name.as_str();
  let reporter = ctx.reporter.as_ref();

  if !tokio::fs::metadata(&request.entry_point)
    .await
    .map(|m| m.is_file())
    .unwrap_or(false)
  {
    reporter.failure(
      label,
      "Source file does not exist",
      Some(&request.entry_point.display().to_string()),
    );
    return Err(PackError::InputMissing {
      what: format!("source file for {}", request.name),
      path: request.entry_point.clone(),
    });
  }

  reporter.progress(label, "Resolving dependencies", None);
  let closure = hash_dependencies(
    compiler,
    &request.entry_point,
    &request.ignore_folders,
    &ctx.fingerprinter,
    reporter,
    label,
  )
  .await?;

  let fingerprint = function_fingerprint(&ctx.fingerprinter, &closure, compiler);
  let key = ArtifactDescriptor::new(&request.name, fingerprint)
    .with_suffix(FUNCTION_ARCHIVE_SUFFIX)
    .key();
  let local_path = ctx.out_dir.join(&key);

  if let CacheLookup::Hit { size, status } = check_caches(ctx, &key, &local_path, label).await? {
    return Ok(LambdaPack {
      name: request.name.clone(),
      zip_file_name: key,
      dependencies: closure,
      size,
      cache: status,
    });
  }

  info!(function = %label, key = %key, compiler = compiler.name(), "packing function");
  reporter.progress(label, "Compiling", None);

  let staging = tempfile::tempdir().map_err(PackError::io(std::env::temp_dir()))?;
  let output_path = staging.path().join(FUNCTION_ENTRY_FILENAME);
  let compile = CompileRequest {
    entry_point: request.entry_point.clone(),
    output_path: output_path.clone(),
    externalize_third_party: true,
  };
  if let Err(err) = compiler.compile(&compile, reporter, label).await {
    let err = PackError::from(err);
    reporter.failure(label, "Compile failed", Some(&err.to_string()));
    return Err(err);
  }
  if tokio::fs::metadata(&output_path).await.is_err() {
    return Err(PackError::CompilerOutput {
      message: format!("{} produced no output for {}", compiler.name(), request.entry_point.display()),
    });
  }

  reporter.progress(label, "Creating archive", None);
  let hashes = serde_json::to_vec_pretty(&closure.hashes).map_err(|e| PackError::CompilerOutput {
    message: e.to_string(),
  })?;
  let descriptor = serde_json::json!({ "name": request.name, "main": FUNCTION_ENTRY_FILENAME });
  let entries = vec![
    ArchiveEntry::file(FUNCTION_ENTRY_FILENAME, &output_path),
    ArchiveEntry::bytes(FUNCTION_HASHES_FILENAME, hashes),
    ArchiveEntry::bytes(MANIFEST_FILENAME, descriptor.to_string()),
  ];
  let archive_size = build_archive(entries, &local_path).await?;
  reporter.success(label, "Function packed", Some(&format!("{}KB", archive_size.div_ceil(1024))));

  let size = publish(ctx, &key, &local_path, label, archive_size).await?;
  reporter.success(label, "All done", Some(&key));

  Ok(LambdaPack {
    name: request.name.clone(),
    zip_file_name: key,
    dependencies: closure,
    size,
    cache: CacheStatus::Built,
  })
}
