//! Project configuration.
//!
//! Settings come from a camelCase JSON file (`layerpack.json` by default),
//! then from `LAYERPACK_*` environment variables. Relative paths in the file
//! resolve against the directory containing it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::compile::CompilerConfig;
use crate::consts::{CONFIG_FILENAME, DEFAULT_LAYER_NAME, DEFAULT_LOCKFILE_NAME};
use crate::fingerprint::{FileHashCache, Fingerprinter, HashAlgorithm};
use crate::pack::{LambdasRequest, LayerRequest, ManifestLayerRequest, PackContext};
use crate::paths;
use crate::reporter::SharedReporter;
use crate::store::{StoreError, store_from_location};

pub const ENV_BUCKET: &str = "LAYERPACK_BUCKET";
pub const ENV_OUT_DIR: &str = "LAYERPACK_OUT_DIR";
pub const ENV_STORE: &str = "LAYERPACK_STORE";
pub const ENV_STORE_TOKEN: &str = "LAYERPACK_STORE_TOKEN";

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid config {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("{0}")]
  Missing(String),

  #[error(transparent)]
  Store(#[from] StoreError),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PackConfig {
  /// Bucket archives are published to.
  pub bucket: Option<String>,
  pub out_dir: Option<PathBuf>,
  /// `http(s)://` endpoint or a directory.
  pub store: Option<String>,
  pub store_token: Option<String>,
  pub parallelism: Option<usize>,
  pub hash_algorithm: HashAlgorithm,
  pub layer: Option<LayerConfig>,
  pub lambdas: Option<LambdasConfig>,
  pub compiler: CompilerConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayerConfig {
  pub name: Option<String>,
  /// Directory holding the layer manifest. With `packageJson` set, the
  /// generated manifest is written here.
  pub src_dir: Option<PathBuf>,
  /// Project manifest to select `requiredDependencies` from.
  pub package_json: Option<PathBuf>,
  pub lock_file: Option<PathBuf>,
  pub required_dependencies: Vec<String>,
  pub install_command: Option<Vec<String>>,
}

/// How the layer source is obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerSource {
  /// An existing directory with a manifest and lockfile.
  Directory(LayerRequest),
  /// A manifest generated from selected project dependencies.
  Manifest(ManifestLayerRequest),
}

impl LayerConfig {
  pub fn source(&self) -> LayerSource {
    let name = self.name.clone().unwrap_or_else(|| DEFAULT_LAYER_NAME.to_string());
    let src_dir = self.src_dir.clone().unwrap_or_else(|| PathBuf::from("."));

    match &self.package_json {
      Some(package_json) => {
        let lockfile = self.lock_file.clone().unwrap_or_else(|| {
          package_json
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(DEFAULT_LOCKFILE_NAME)
        });
        let mut request =
          ManifestLayerRequest::new(src_dir, package_json.clone(), lockfile, self.required_dependencies.clone());
        request.name = name;
        request.install_command = self.install_command.clone();
        LayerSource::Manifest(request)
      }
      None => {
        let mut request = LayerRequest::new(src_dir).with_name(name);
        if let Some(lockfile_name) = self.lock_file.as_ref().and_then(|p| p.file_name()) {
          request = request.with_lockfile_name(lockfile_name.to_string_lossy());
        }
        if let Some(command) = &self.install_command {
          request = request.with_install_command(command.clone());
        }
        LayerSource::Directory(request)
      }
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LambdasConfig {
  pub id: String,
  /// Logical function name to entry point.
  pub map: BTreeMap<String, PathBuf>,
  pub ignore_folders: Vec<String>,
}

impl LambdasConfig {
  pub fn request(&self) -> LambdasRequest {
    LambdasRequest {
      id: self.id.clone(),
      lambdas: self.map.clone(),
      ignore_folders: self.ignore_folders.clone(),
    }
  }
}

impl PackConfig {
  /// Load `path`, resolving relative paths against its directory.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    let mut config: PackConfig = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })?;

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    config.resolve_paths(base);
    debug!(path = %path.display(), "loaded config");
    Ok(config)
  }

  /// Load `path` if given, else `layerpack.json` in `cwd` if it exists, else
  /// defaults. Environment overrides are applied in every case.
  pub fn discover(path: Option<&Path>, cwd: &Path) -> Result<Self, ConfigError> {
    let mut config = match path {
      Some(path) => Self::load(path)?,
      None => {
        let default = cwd.join(CONFIG_FILENAME);
        if default.is_file() {
          Self::load(&default)?
        } else {
          Self::default()
        }
      }
    };
    config.apply_env();
    Ok(config)
  }

  /// Override fields from `LAYERPACK_*` environment variables.
  pub fn apply_env(&mut self) {
    if let Some(bucket) = env_value(ENV_BUCKET) {
      self.bucket = Some(bucket);
    }
    if let Some(out_dir) = env_value(ENV_OUT_DIR) {
      self.out_dir = Some(PathBuf::from(out_dir));
    }
    if let Some(store) = env_value(ENV_STORE) {
      self.store = Some(store);
    }
    if let Some(token) = env_value(ENV_STORE_TOKEN) {
      self.store_token = Some(token);
    }
  }

  pub fn bucket(&self) -> Result<&str, ConfigError> {
    self
      .bucket
      .as_deref()
      .ok_or_else(|| ConfigError::Missing(format!("no bucket configured (set `bucket` or {})", ENV_BUCKET)))
  }

  pub fn out_dir(&self) -> PathBuf {
    self.out_dir.clone().unwrap_or_else(paths::default_out_dir)
  }

  /// Store location, defaulting to a directory next to the output directory.
  pub fn store_location(&self) -> String {
    self
      .store
      .clone()
      .unwrap_or_else(|| paths::cache_dir().join("store").to_string_lossy().to_string())
  }

  /// Assemble a packing session from this configuration.
  pub fn context(&self, reporter: SharedReporter) -> Result<PackContext, ConfigError> {
    let store = store_from_location(&self.store_location(), self.store_token.clone())?;
    let fingerprinter = Fingerprinter::new(Arc::new(FileHashCache::new())).with_algorithm(self.hash_algorithm);

    let mut ctx = PackContext::new(store, self.bucket()?, self.out_dir())
      .with_fingerprinter(fingerprinter)
      .with_reporter(reporter);
    if let Some(parallelism) = self.parallelism {
      ctx = ctx.with_parallelism(parallelism);
    }
    Ok(ctx)
  }

  fn resolve_paths(&mut self, base: &Path) {
    let join = |p: &mut PathBuf| {
      if p.is_relative() {
        *p = base.join(&*p);
      }
    };

    if let Some(out_dir) = self.out_dir.as_mut() {
      join(out_dir);
    }
    if let Some(store) = self.store.as_mut()
      && !store.starts_with("http://")
      && !store.starts_with("https://")
    {
      let dir = store.strip_prefix("file://").unwrap_or(store.as_str());
      if Path::new(dir).is_relative() {
        let resolved = base.join(dir).to_string_lossy().to_string();
        *store = resolved;
      }
    }
    if let Some(layer) = self.layer.as_mut() {
      for p in [&mut layer.src_dir, &mut layer.package_json, &mut layer.lock_file]
        .into_iter()
        .flatten()
      {
        join(p);
      }
    }
    if let Some(lambdas) = self.lambdas.as_mut() {
      for entry in lambdas.map.values_mut() {
        join(entry);
      }
    }
    if let CompilerConfig::Esbuild(options) = &mut self.compiler {
      match options.working_dir.as_mut() {
        Some(dir) => join(dir),
        None => options.working_dir = Some(base.to_path_buf()),
      }
    }
  }
}

fn env_value(name: &str) -> Option<String> {
  std::env::var(name).ok().filter(|v| !v.is_empty())
}
