//! Dependency layer packing.
//!
//! A layer holds the installed production dependencies of one manifest under
//! `nodejs/`, which is where the runtime looks for layer packages.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::lockfile::trim_lockfile;
use super::types::{ArtifactDescriptor, CacheStatus, LayerPack, PackContext, PackError};
use super::{CacheLookup, check_caches, publish};
use crate::archive::{build_archive, directory_entries};
use crate::consts::{
  DEFAULT_INSTALL_COMMAND, DEFAULT_INSTALL_COMMAND_NO_LOCKFILE, DEFAULT_LAYER_NAME, DEFAULT_LOCKFILE_NAME,
  LAYER_ROOT_DIR, MANIFEST_FILENAME,
};
use crate::fingerprint::Fingerprinter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerRequest {
  /// Artifact name, the first part of the key.
  pub name: String,
  /// Directory holding the manifest and lockfile.
  pub src_dir: PathBuf,
  pub lockfile_name: String,
  /// Overrides the default install command.
  pub install_command: Option<Vec<String>>,
}

impl LayerRequest {
  pub fn new(src_dir: impl Into<PathBuf>) -> Self {
    Self {
      name: DEFAULT_LAYER_NAME.to_string(),
      src_dir: src_dir.into(),
      lockfile_name: DEFAULT_LOCKFILE_NAME.to_string(),
      install_command: None,
    }
  }

  pub fn with_name(mut self, name: impl Into<String>) -> Self {
    self.name = name.into();
    self
  }

  pub fn with_lockfile_name(mut self, lockfile_name: impl Into<String>) -> Self {
    self.lockfile_name = lockfile_name.into();
    self
  }

  pub fn with_install_command(mut self, command: Vec<String>) -> Self {
    self.install_command = Some(command);
    self
  }

  /// Locate the files that feed the fingerprint.
  pub async fn inputs(&self) -> Result<LayerInputs, PackError> {
    let manifest = self.src_dir.join(MANIFEST_FILENAME);
    if !is_file(&manifest).await {
      return Err(PackError::InputMissing {
        what: "package manifest".to_string(),
        path: manifest,
      });
    }

    let lockfile_path = self.src_dir.join(&self.lockfile_name);
    let lockfile = is_file(&lockfile_path).await.then_some(lockfile_path);

    let install_command = match (&self.install_command, &lockfile) {
      (Some(command), _) => command.clone(),
      (None, Some(_)) => to_command(DEFAULT_INSTALL_COMMAND),
      (None, None) => to_command(DEFAULT_INSTALL_COMMAND_NO_LOCKFILE),
    };
    if install_command.first().is_none_or(|program| program.trim().is_empty()) {
      return Err(PackError::EmptyCommand {
        what: "install command".to_string(),
      });
    }

    Ok(LayerInputs {
      manifest,
      lockfile,
      lockfile_name: self.lockfile_name.clone(),
      install_command,
    })
  }
}

/// Resolved inputs of a layer build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerInputs {
  pub manifest: PathBuf,
  /// `None` when the lockfile is absent.
  pub lockfile: Option<PathBuf>,
  pub lockfile_name: String,
  pub install_command: Vec<String>,
}

/// Fingerprint over manifest, lockfile (if any) and the install command.
pub async fn layer_fingerprint(fingerprinter: &Fingerprinter, inputs: &LayerInputs) -> Result<String, PackError> {
  let mut files = vec![inputs.manifest.clone()];
  files.extend(inputs.lockfile.clone());

  let checksum = fingerprinter.checksum_of_paths(&files).await?;
  Ok(fingerprinter.combine(&checksum, &[inputs.install_command.join(" ")]))
}

/// Pack and publish the dependency layer described by `request`.
pub async fn pack_base_layer(ctx: &PackContext, request: &LayerRequest) -> Result<LayerPack, PackError> {
  let label = request.name.as_str();
  let reporter = ctx.reporter.as_ref();

  let inputs = request.inputs().await?;
  if inputs.lockfile.is_none() {
    let missing = request.src_dir.join(&request.lockfile_name);
    warn!(layer = %label, lockfile = %missing.display(), "lockfile not found");
    reporter.warn(
      label,
      &format!("Lockfile not found in {}, installing without it", missing.display()),
    );
  }

  let fingerprint = layer_fingerprint(&ctx.fingerprinter, &inputs).await?;
  let key = ArtifactDescriptor::new(&request.name, &fingerprint).key();
  let local_path = ctx.out_dir.join(&key);

  if let CacheLookup::Hit { size, status } = check_caches(ctx, &key, &local_path, label).await? {
    return Ok(LayerPack {
      name: request.name.clone(),
      zip_file_name: key,
      fingerprint,
      size,
      cache: status,
    });
  }

  info!(layer = %label, key = %key, "packing layer");
  reporter.progress(label, "Packing layer", None);

  let staging = tempfile::tempdir().map_err(PackError::io(std::env::temp_dir()))?;
  let install_dir = staging.path().join(LAYER_ROOT_DIR);
  tokio::fs::create_dir_all(&install_dir)
    .await
    .map_err(PackError::io(&install_dir))?;

  stage_sources(&inputs, &install_dir, ctx, label).await?;

  reporter.progress(
    label,
    "Installing dependencies",
    Some(&inputs.install_command.join(" ")),
  );
  if let Err(err) = ctx
    .installer
    .install(&inputs.install_command, &install_dir, reporter, label)
    .await
  {
    let err = PackError::from(err);
    reporter.failure(label, "Install failed", Some(&err.to_string()));
    return Err(err);
  }
  reporter.success(label, "Dependencies installed", None);

  reporter.progress(label, "Creating archive", None);
  let entries = directory_entries(staging.path())?;
  let archive_size = build_archive(entries, &local_path).await?;
  reporter.success(label, "Layer packed", Some(&format!("{}KB", archive_size.div_ceil(1024))));

  let size = publish(ctx, &key, &local_path, label, archive_size).await?;
  reporter.success(label, "All done", Some(&key));

  Ok(LayerPack {
    name: request.name.clone(),
    zip_file_name: key,
    fingerprint,
    size,
    cache: CacheStatus::Built,
  })
}

/// Copy the manifest and a (possibly trimmed) lockfile into `install_dir`.
async fn stage_sources(
  inputs: &LayerInputs,
  install_dir: &Path,
  ctx: &PackContext,
  label: &str,
) -> Result<(), PackError> {
  let manifest = tokio::fs::read_to_string(&inputs.manifest)
    .await
    .map_err(PackError::io(&inputs.manifest))?;
  serde_json::from_str::<serde_json::Value>(&manifest).map_err(|source| PackError::Manifest {
    path: inputs.manifest.clone(),
    source,
  })?;
  let manifest_target = install_dir.join(MANIFEST_FILENAME);
  tokio::fs::write(&manifest_target, &manifest)
    .await
    .map_err(PackError::io(&manifest_target))?;

  let Some(lockfile) = &inputs.lockfile else {
    return Ok(());
  };
  let lockfile_target = install_dir.join(&inputs.lockfile_name);

  if inputs.lockfile_name == DEFAULT_LOCKFILE_NAME {
    let raw = tokio::fs::read_to_string(lockfile)
      .await
      .map_err(PackError::io(lockfile))?;
    let trimmed = trim_lockfile(&raw, &manifest).map_err(|source| PackError::Manifest {
      path: lockfile.clone(),
      source,
    })?;
    if let Some(trimmed) = trimmed {
      ctx
        .reporter
        .progress(label, "Creating lockfile with only production packages", None);
      tokio::fs::write(&lockfile_target, trimmed)
        .await
        .map_err(PackError::io(&lockfile_target))?;
      return Ok(());
    }
  }

  ctx.reporter.progress(label, "Using original lockfile", None);
  tokio::fs::copy(lockfile, &lockfile_target)
    .await
    .map_err(PackError::io(&lockfile_target))?;
  Ok(())
}

fn to_command(command: &[&str]) -> Vec<String> {
  command.iter().map(|s| s.to_string()).collect()
}

async fn is_file(path: &Path) -> bool {
  tokio::fs::metadata(path).await.map(|m| m.is_file()).unwrap_or(false)
}
