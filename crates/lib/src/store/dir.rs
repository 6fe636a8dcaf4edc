//! Directory-backed store: objects live at `<root>/<bucket>/<key>`.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use super::{ArtifactStore, StoreError, validate_key};

#[derive(Debug, Clone)]
pub struct DirStore {
  root: PathBuf,
}

impl DirStore {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StoreError> {
    validate_key(bucket)?;
    validate_key(key)?;
    Ok(self.root.join(bucket).join(key))
  }
}

#[async_trait]
impl ArtifactStore for DirStore {
  async fn exists(&self, bucket: &str, key: &str, _out_dir: &Path) -> Result<Option<u64>, StoreError> {
    let path = self.object_path(bucket, key)?;
    match fs::metadata(&path).await {
      Ok(meta) if meta.is_file() => Ok(Some(meta.len())),
      Ok(_) => Ok(None),
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
      Err(source) => Err(StoreError::Io { path, source }),
    }
  }

  async fn publish(&self, bucket: &str, key: &str, local_path: &Path) -> Result<(), StoreError> {
    let path = self.object_path(bucket, key)?;
    let io_err = |path: &Path| {
      let path = path.to_path_buf();
      move |source| StoreError::Io { path, source }
    };

    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).await.map_err(io_err(parent))?;
    }

    // Copy next to the target and rename so readers never see a partial object.
    let staging = path.with_extension(format!("{}.partial", std::process::id()));
    fs::copy(local_path, &staging).await.map_err(io_err(local_path))?;
    fs::rename(&staging, &path).await.map_err(io_err(&path))?;

    debug!(bucket = %bucket, key = %key, path = %path.display(), "published object");
    Ok(())
  }
}
