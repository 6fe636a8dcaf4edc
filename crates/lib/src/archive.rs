//! Zip archive assembly.
//!
//! Archives are reproducible: entries are written in archive-path order with
//! a fixed timestamp (1980-01-01, the zip epoch) and normalized permissions,
//! so the same inputs always produce byte-identical files.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

#[derive(Debug, Error)]
pub enum ArchiveError {
  #[error("archive i/o error on {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to write zip {path}: {message}")]
  Zip { path: PathBuf, message: String },

  #[error("archive task failed: {0}")]
  Task(String),
}

#[derive(Debug, Clone)]
pub enum EntrySource {
  File(PathBuf),
  Bytes(Vec<u8>),
}

/// One file in the archive.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
  /// Forward-slash separated path inside the archive.
  pub archive_path: String,
  pub source: EntrySource,
}

impl ArchiveEntry {
  pub fn file(archive_path: impl Into<String>, path: impl Into<PathBuf>) -> Self {
    Self {
      archive_path: archive_path.into(),
      source: EntrySource::File(path.into()),
    }
  }

  pub fn bytes(archive_path: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
    Self {
      archive_path: archive_path.into(),
      source: EntrySource::Bytes(data.into()),
    }
  }
}

/// Collect every regular file under `root` as entries relative to `root`.
pub fn directory_entries(root: &Path) -> Result<Vec<ArchiveEntry>, ArchiveError> {
  let mut entries = Vec::new();

  for entry in WalkDir::new(root).sort_by_file_name() {
    let entry = entry.map_err(|e| ArchiveError::Io {
      path: e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf()),
      source: e.into(),
    })?;
    if !entry.file_type().is_file() {
      continue;
    }

    let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
    let archive_path = rel
      .components()
      .map(|c| c.as_os_str().to_string_lossy())
      .collect::<Vec<_>>()
      .join("/");
    entries.push(ArchiveEntry::file(archive_path, entry.path()));
  }

  Ok(entries)
}

/// Write `entries` to `dest` and return the archive size in bytes.
///
/// The archive is written to a staging file and renamed into place, so `dest`
/// either holds a complete archive or does not exist.
pub async fn build_archive(entries: Vec<ArchiveEntry>, dest: &Path) -> Result<u64, ArchiveError> {
  let dest = dest.to_path_buf();
  tokio::task::spawn_blocking(move || write_archive(entries, &dest))
    .await
    .map_err(|e| ArchiveError::Task(e.to_string()))?
}

fn write_archive(mut entries: Vec<ArchiveEntry>, dest: &Path) -> Result<u64, ArchiveError> {
  entries.sort_by(|a, b| a.archive_path.cmp(&b.archive_path));
  entries.dedup_by(|a, b| a.archive_path == b.archive_path);

  let io_err = |path: &Path| {
    let path = path.to_path_buf();
    move |source| ArchiveError::Io { path, source }
  };
  let zip_err = |path: &Path| {
    let path = path.to_path_buf();
    move |e: zip::result::ZipError| ArchiveError::Zip {
      path,
      message: e.to_string(),
    }
  };

  if let Some(parent) = dest.parent() {
    std::fs::create_dir_all(parent).map_err(io_err(parent))?;
  }

  let staging = staging_path(dest);
  let file = File::create(&staging).map_err(io_err(&staging))?;
  let mut zip = ZipWriter::new(BufWriter::new(file));

  for entry in &entries {
    match &entry.source {
      EntrySource::File(path) => {
        let mut source = File::open(path).map_err(io_err(path))?;
        let mode = file_mode(&source);
        zip
          .start_file(entry.archive_path.as_str(), entry_options(mode))
          .map_err(zip_err(dest))?;
        io::copy(&mut source, &mut zip).map_err(io_err(path))?;
      }
      EntrySource::Bytes(data) => {
        zip
          .start_file(entry.archive_path.as_str(), entry_options(0o644))
          .map_err(zip_err(dest))?;
        zip.write_all(data).map_err(io_err(dest))?;
      }
    }
  }

  let mut writer = zip.finish().map_err(zip_err(dest))?;
  writer.flush().map_err(io_err(&staging))?;
  drop(writer);

  std::fs::rename(&staging, dest).map_err(io_err(dest))?;
  let size = std::fs::metadata(dest).map_err(io_err(dest))?.len();

  debug!(path = %dest.display(), entries = entries.len(), size, "archive written");
  Ok(size)
}

fn entry_options(mode: u32) -> SimpleFileOptions {
  SimpleFileOptions::default()
    .compression_method(CompressionMethod::Deflated)
    .last_modified_time(DateTime::default())
    .unix_permissions(mode)
}

#[cfg(unix)]
fn file_mode(file: &File) -> u32 {
  use std::os::unix::fs::PermissionsExt;
  match file.metadata() {
    Ok(meta) if meta.permissions().mode() & 0o111 != 0 => 0o755,
    _ => 0o644,
  }
}

#[cfg(not(unix))]
fn file_mode(_file: &File) -> u32 {
  0o644
}

fn staging_path(dest: &Path) -> PathBuf {
  let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
  name.push(format!(".{}.partial", std::process::id()));
  dest.with_file_name(name)
}
