//! Layer and function packers.
//!
//! Both packers follow the same protocol once the fingerprint is known:
//!
//! 1. look the key up in the store and stop if it is there
//! 2. if the archive already sits in the output directory, upload it and stop
//! 3. look the key up again, since another process may have published it
//! 4. build the archive, upload it and confirm it is present
//!
//! The key is derived only from input contents and build settings, so every
//! step is safe to repeat and concurrent invocations converge on one object.

mod install;
mod lambda;
mod layer;
mod layered;
mod lockfile;
mod manifest_layer;
mod types;

use std::path::Path;

use tracing::{debug, info, warn};

pub use install::{CommandInstaller, Installer, SharedInstaller};
pub use lambda::{LambdaRequest, function_fingerprint, pack_lambda};
pub use layer::{LayerInputs, LayerRequest, layer_fingerprint, pack_base_layer};
pub use layered::{LambdasRequest, pack_layered_lambdas};
pub use lockfile::trim_lockfile;
pub use manifest_layer::{ManifestLayerRequest, make_layer_from_package_json};
pub use types::{
  ArtifactDescriptor, CacheStatus, LambdaPack, LayerPack, LayeredLambdas, PackContext, PackError,
  default_parallelism,
};

/// Result of the cache checks that precede a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CacheLookup {
  Hit { size: u64, status: CacheStatus },
  Miss,
}

/// Steps 1 to 3 of the pack protocol for `key`, whose local copy would live
/// at `local_path`.
pub(crate) async fn check_caches(
  ctx: &PackContext,
  key: &str,
  local_path: &Path,
  label: &str,
) -> Result<CacheLookup, PackError> {
  let reporter = ctx.reporter.as_ref();

  reporter.progress(label, "Checking remote cache", Some(key));
  if let Some(size) = ctx.store.exists(&ctx.bucket, key, &ctx.out_dir).await? {
    debug!(key = %key, size, "remote cache hit");
    reporter.success(label, "Found in store", Some(key));
    reporter.size_in_bytes(label, size);
    return Ok(CacheLookup::Hit {
      size,
      status: CacheStatus::Remote,
    });
  }

  reporter.progress(label, "Checking local file", Some(key));
  match tokio::fs::metadata(local_path).await {
    Ok(meta) if meta.is_file() => {
      info!(key = %key, path = %local_path.display(), "publishing local archive");
      let size = publish(ctx, key, local_path, label, meta.len()).await?;
      reporter.success(label, "Published local archive", Some(key));
      return Ok(CacheLookup::Hit {
        size,
        status: CacheStatus::Local,
      });
    }
    Ok(_) => {}
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
    Err(e) => return Err(PackError::io(local_path)(e)),
  }

  reporter.progress(label, "Checking remote cache", Some(key));
  if let Some(size) = ctx.store.exists(&ctx.bucket, key, &ctx.out_dir).await? {
    debug!(key = %key, size, "remote cache hit on recheck");
    reporter.success(label, "Found in store", Some(key));
    reporter.size_in_bytes(label, size);
    return Ok(CacheLookup::Hit {
      size,
      status: CacheStatus::Remote,
    });
  }

  Ok(CacheLookup::Miss)
}

/// Upload `local_path` as `key`, then confirm it is present and return its
/// size. Falls back to `local_size` when the store does not report one.
pub(crate) async fn publish(
  ctx: &PackContext,
  key: &str,
  local_path: &Path,
  label: &str,
  local_size: u64,
) -> Result<u64, PackError> {
  let reporter = ctx.reporter.as_ref();
  reporter.progress(label, "Publishing", Some(&format!("-> {}", ctx.bucket)));
  ctx.store.publish(&ctx.bucket, key, local_path).await?;

  let size = match ctx.store.exists(&ctx.bucket, key, &ctx.out_dir).await? {
    Some(size) if size > 0 => size,
    Some(_) => local_size,
    None => {
      warn!(key = %key, bucket = %ctx.bucket, "uploaded object not visible yet");
      reporter.warn(label, "Uploaded object is not visible in the store yet");
      local_size
    }
  };
  reporter.size_in_bytes(label, size);
  Ok(size)
}
