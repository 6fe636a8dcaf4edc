//! Dependency installation for layers.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::process::{ProcessError, run_command};
use crate::reporter::ProgressReporter;

#[async_trait]
pub trait Installer: Send + Sync {
  /// Run `command` in `cwd`, which holds the manifest and lockfile.
  async fn install(
    &self,
    command: &[String],
    cwd: &Path,
    reporter: &dyn ProgressReporter,
    label: &str,
  ) -> Result<(), ProcessError>;
}

pub type SharedInstaller = Arc<dyn Installer>;

/// Runs the install command as a child process.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandInstaller;

#[async_trait]
impl Installer for CommandInstaller {
  async fn install(
    &self,
    command: &[String],
    cwd: &Path,
    reporter: &dyn ProgressReporter,
    label: &str,
  ) -> Result<(), ProcessError> {
    run_command(command, cwd, reporter, label, "Installing dependencies").await?;
    Ok(())
  }
}
