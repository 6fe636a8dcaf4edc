//! Shared fakes for packing tests.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use layerpack_lib::compile::{CompileError, CompileRequest, Compiler, PassthroughCompiler};
use layerpack_lib::fingerprint::{FileHashCache, Fingerprinter};
use layerpack_lib::pack::{Installer, PackContext};
use layerpack_lib::process::ProcessError;
use layerpack_lib::reporter::{NoopReporter, ProgressReporter};
use layerpack_lib::store::{ArtifactStore, SharedStore, StoreError};
use tempfile::TempDir;

pub const BUCKET: &str = "lambda-sources";

/// In-memory store that counts calls.
#[derive(Default)]
pub struct SpyStore {
  objects: Mutex<HashMap<(String, String), u64>>,
  pub exists_calls: AtomicUsize,
  pub publish_calls: AtomicUsize,
}

impl SpyStore {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  pub fn insert(&self, key: &str, size: u64) {
    self
      .objects
      .lock()
      .unwrap()
      .insert((BUCKET.to_string(), key.to_string()), size);
  }

  pub fn contains(&self, key: &str) -> bool {
    self
      .objects
      .lock()
      .unwrap()
      .contains_key(&(BUCKET.to_string(), key.to_string()))
  }

  pub fn publishes(&self) -> usize {
    self.publish_calls.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl ArtifactStore for SpyStore {
  async fn exists(&self, bucket: &str, key: &str, _out_dir: &Path) -> Result<Option<u64>, StoreError> {
    self.exists_calls.fetch_add(1, Ordering::SeqCst);
    Ok(
      self
        .objects
        .lock()
        .unwrap()
        .get(&(bucket.to_string(), key.to_string()))
        .copied(),
    )
  }

  async fn publish(&self, bucket: &str, key: &str, local_path: &Path) -> Result<(), StoreError> {
    self.publish_calls.fetch_add(1, Ordering::SeqCst);
    let size = std::fs::metadata(local_path)
      .map_err(|source| StoreError::Io {
        path: local_path.to_path_buf(),
        source,
      })?
      .len();
    self
      .objects
      .lock()
      .unwrap()
      .insert((bucket.to_string(), key.to_string()), size);
    Ok(())
  }
}

/// Store where another writer publishes the object between the first and
/// second lookup: `exists` answers `None` once, then `Some(size)`.
pub struct LateStore {
  size: u64,
  pub exists_calls: AtomicUsize,
  pub publish_calls: AtomicUsize,
}

impl LateStore {
  pub fn new(size: u64) -> Arc<Self> {
    Arc::new(Self {
      size,
      exists_calls: AtomicUsize::new(0),
      publish_calls: AtomicUsize::new(0),
    })
  }

  pub fn publishes(&self) -> usize {
    self.publish_calls.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl ArtifactStore for LateStore {
  async fn exists(&self, _bucket: &str, _key: &str, _out_dir: &Path) -> Result<Option<u64>, StoreError> {
    let previous = self.exists_calls.fetch_add(1, Ordering::SeqCst);
    Ok((previous > 0).then_some(self.size))
  }

  async fn publish(&self, _bucket: &str, _key: &str, _local_path: &Path) -> Result<(), StoreError> {
    self.publish_calls.fetch_add(1, Ordering::SeqCst);
    Ok(())
  }
}

/// Installer that fakes `npm ci` by creating a module per manifest dependency.
#[derive(Default)]
pub struct CountingInstaller {
  pub calls: AtomicUsize,
  pub commands: Mutex<Vec<Vec<String>>>,
  pub fail_with: Option<i32>,
}

impl CountingInstaller {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  pub fn failing(code: i32) -> Arc<Self> {
    Arc::new(Self {
      fail_with: Some(code),
      ..Default::default()
    })
  }

  pub fn count(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl Installer for CountingInstaller {
  async fn install(
    &self,
    command: &[String],
    cwd: &Path,
    _reporter: &dyn ProgressReporter,
    _label: &str,
  ) -> Result<(), ProcessError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    self.commands.lock().unwrap().push(command.to_vec());

    if let Some(code) = self.fail_with {
      return Err(ProcessError::Failed {
        cmd: command.join(" "),
        cwd: cwd.to_path_buf(),
        code: Some(code),
        stderr: String::new(),
      });
    }

    let manifest: serde_json::Value =
      serde_json::from_str(&std::fs::read_to_string(cwd.join("package.json")).unwrap()).unwrap();
    if let Some(deps) = manifest["dependencies"].as_object() {
      for name in deps.keys() {
        let dir = cwd.join("node_modules").join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("index.js"), format!("module.exports = '{}'", name)).unwrap();
      }
    }
    Ok(())
  }
}

/// Passthrough compiler that counts builds and carries a tag in its options.
pub struct CountingCompiler {
  pub compiles: AtomicUsize,
  pub tag: String,
}

impl CountingCompiler {
  pub fn new(tag: &str) -> Arc<Self> {
    Arc::new(Self {
      compiles: AtomicUsize::new(0),
      tag: tag.to_string(),
    })
  }

  pub fn count(&self) -> usize {
    self.compiles.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl Compiler for CountingCompiler {
  fn name(&self) -> &str {
    "counting"
  }

  fn options(&self) -> serde_json::Value {
    serde_json::json!({ "compiler": "counting", "tag": self.tag })
  }

  async fn inputs(
    &self,
    entry_point: &Path,
    reporter: &dyn ProgressReporter,
    label: &str,
  ) -> Result<Vec<PathBuf>, CompileError> {
    PassthroughCompiler.inputs(entry_point, reporter, label).await
  }

  async fn compile(
    &self,
    request: &CompileRequest,
    reporter: &dyn ProgressReporter,
    label: &str,
  ) -> Result<(), CompileError> {
    self.compiles.fetch_add(1, Ordering::SeqCst);
    PassthroughCompiler.compile(request, reporter, label).await
  }
}

/// Scratch project directory.
pub struct Project {
  pub temp: TempDir,
}

impl Project {
  pub fn new() -> Self {
    Self {
      temp: TempDir::new().unwrap(),
    }
  }

  pub fn path(&self) -> &Path {
    self.temp.path()
  }

  pub fn write(&self, relative_path: &str, content: &str) -> PathBuf {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
  }

  /// A layer source with one dependency and a lockfile.
  pub fn with_layer_sources(self) -> Self {
    self.write("layer/package.json", r#"{"dependencies":{"uuid":"9.0.0"}}"#);
    self.write(
      "layer/package-lock.json",
      r#"{"name":"layer","lockfileVersion":3,"requires":true,"packages":{"":{"dependencies":{"uuid":"9.0.0"}},"node_modules/uuid":{"version":"9.0.0"}}}"#,
    );
    self
  }

  pub fn out_dir(&self) -> PathBuf {
    self.temp.path().join("dist")
  }
}

/// A fresh session: its own digest cache, no progress output.
pub fn context(store: SharedStore, out_dir: &Path, installer: Arc<CountingInstaller>) -> PackContext {
  PackContext::new(store, BUCKET, out_dir)
    .with_fingerprinter(Fingerprinter::new(Arc::new(FileHashCache::new())))
    .with_reporter(Arc::new(NoopReporter))
    .with_installer(installer)
}

/// Entry names and contents of a zip archive.
pub fn zip_contents(path: &Path) -> Vec<(String, String)> {
  let mut archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
  (0..archive.len())
    .map(|i| {
      let mut file = archive.by_index(i).unwrap();
      let mut content = String::new();
      file.read_to_string(&mut content).unwrap();
      (file.name().to_string(), content)
    })
    .collect()
}

pub fn is_hex(s: &str, len: usize) -> bool {
  s.len() == len && s.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
}
