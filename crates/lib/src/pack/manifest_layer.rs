//! Layers built from a subset of a project's dependencies.

use std::path::PathBuf;

use serde_json::{Map, Value};

use super::layer::{LayerRequest, pack_base_layer};
use super::types::{LayerPack, PackContext, PackError};
use crate::consts::{DEFAULT_LAYER_NAME, DEFAULT_LOCKFILE_NAME, MANIFEST_FILENAME};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestLayerRequest {
  /// Directory the layer manifest is written to. Created if missing.
  pub dir: PathBuf,
  /// Project manifest the dependency versions are taken from.
  pub package_json: PathBuf,
  pub lockfile: PathBuf,
  /// Dependencies to include, looked up in `dependencies` and then
  /// `devDependencies`.
  pub required_dependencies: Vec<String>,
  pub name: String,
  pub install_command: Option<Vec<String>>,
}

impl ManifestLayerRequest {
  pub fn new(
    dir: impl Into<PathBuf>,
    package_json: impl Into<PathBuf>,
    lockfile: impl Into<PathBuf>,
    required_dependencies: Vec<String>,
  ) -> Self {
    Self {
      dir: dir.into(),
      package_json: package_json.into(),
      lockfile: lockfile.into(),
      required_dependencies,
      name: DEFAULT_LAYER_NAME.to_string(),
      install_command: None,
    }
  }
}

/// Write a manifest holding only the required dependencies, copy the lockfile
/// next to it and pack the result as a layer.
pub async fn make_layer_from_package_json(
  ctx: &PackContext,
  request: &ManifestLayerRequest,
) -> Result<LayerPack, PackError> {
  let label = request.name.as_str();
  let reporter = ctx.reporter.as_ref();

  let raw = match tokio::fs::read_to_string(&request.package_json).await {
    Ok(raw) => raw,
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
      return Err(PackError::InputMissing {
        what: "package manifest".to_string(),
        path: request.package_json.clone(),
      });
    }
    Err(e) => return Err(PackError::io(&request.package_json)(e)),
  };
  let manifest: Value = serde_json::from_str(&raw).map_err(|source| PackError::Manifest {
    path: request.package_json.clone(),
    source,
  })?;

  let dependencies = select_dependencies(&manifest, &request.required_dependencies).map_err(|dependency| {
    PackError::DependencyResolution {
      dependency,
      file: request.package_json.display().to_string(),
    }
  })?;
  for (name, version) in &dependencies {
    reporter.progress(label, "Selected dependency", Some(&format!("{}: {}", name, version)));
  }

  if tokio::fs::metadata(&request.lockfile).await.is_err() {
    return Err(PackError::InputMissing {
      what: "lockfile".to_string(),
      path: request.lockfile.clone(),
    });
  }

  if tokio::fs::metadata(&request.dir).await.is_ok() {
    reporter.progress(label, "Using existing layer directory", Some(&request.dir.display().to_string()));
  } else {
    reporter.progress(label, "Creating layer directory", Some(&request.dir.display().to_string()));
    tokio::fs::create_dir_all(&request.dir)
      .await
      .map_err(PackError::io(&request.dir))?;
  }

  let layer_manifest = request.dir.join(MANIFEST_FILENAME);
  let mut root = Map::new();
  root.insert("dependencies".to_string(), Value::Object(dependencies));
  let content = serde_json::to_string(&Value::Object(root)).map_err(|source| PackError::Manifest {
    path: layer_manifest.clone(),
    source,
  })?;
  reporter.progress(label, "Writing package.json", None);
  tokio::fs::write(&layer_manifest, content)
    .await
    .map_err(PackError::io(&layer_manifest))?;

  let layer_lockfile = request.dir.join(DEFAULT_LOCKFILE_NAME);
  reporter.progress(label, "Copying lockfile", None);
  tokio::fs::copy(&request.lockfile, &layer_lockfile)
    .await
    .map_err(PackError::io(&layer_lockfile))?;

  let mut layer = LayerRequest::new(&request.dir).with_name(&request.name);
  if let Some(command) = &request.install_command {
    layer = layer.with_install_command(command.clone());
  }
  pack_base_layer(ctx, &layer).await
}

/// Resolve each required dependency to its version range. Returns the first
/// name found in neither table.
fn select_dependencies(manifest: &Value, required: &[String]) -> Result<Map<String, Value>, String> {
  let prod = manifest.get("dependencies");
  let dev = manifest.get("devDependencies");

  let mut selected = Map::new();
  for dep in required {
    let version = prod
      .and_then(|d| d.get(dep))
      .or_else(|| dev.and_then(|d| d.get(dep)))
      .ok_or_else(|| dep.clone())?;
    selected.insert(dep.clone(), version.clone());
  }
  Ok(selected)
}
