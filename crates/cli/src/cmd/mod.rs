mod checksum;
mod lambdas;
mod layer;
mod pack;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::ValueEnum;

use layerpack_lib::config::PackConfig;
use layerpack_lib::fingerprint::HashAlgorithm;
use layerpack_lib::pack::PackContext;
use layerpack_lib::reporter::{SharedReporter, TracingReporter};

use crate::output::{ConsoleReporter, OutputFormat};

pub use checksum::cmd_checksum;
pub use lambdas::cmd_lambdas;
pub use layer::cmd_layer;
pub use pack::cmd_pack;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum Algorithm {
  #[default]
  Sha1,
  Sha256,
}

impl From<Algorithm> for HashAlgorithm {
  fn from(value: Algorithm) -> Self {
    match value {
      Algorithm::Sha1 => HashAlgorithm::Sha1,
      Algorithm::Sha256 => HashAlgorithm::Sha256,
    }
  }
}

/// Options shared by every command. Flags win over the environment, which
/// wins over the config file.
#[derive(Debug, Clone, Default)]
pub struct Settings {
  pub config: Option<PathBuf>,
  pub bucket: Option<String>,
  pub out_dir: Option<PathBuf>,
  pub store: Option<String>,
  pub output: OutputFormat,
}

impl Settings {
  pub fn load_config(&self) -> Result<PackConfig> {
    let cwd = std::env::current_dir().context("Failed to determine current directory")?;
    let mut config = PackConfig::discover(self.config.as_deref(), &cwd).context("Failed to load config")?;

    if let Some(bucket) = &self.bucket {
      config.bucket = Some(bucket.clone());
    }
    if let Some(out_dir) = &self.out_dir {
      config.out_dir = Some(out_dir.clone());
    }
    if let Some(store) = &self.store {
      config.store = Some(store.clone());
    }
    Ok(config)
  }

  /// Colored progress for humans, log events when the output is JSON.
  pub fn reporter(&self) -> SharedReporter {
    if self.output.is_json() {
      Arc::new(TracingReporter)
    } else {
      Arc::new(ConsoleReporter)
    }
  }

  pub fn context(&self, config: &PackConfig) -> Result<PackContext> {
    config
      .context(self.reporter())
      .context("Failed to set up packing session")
  }
}

pub(crate) fn runtime() -> Result<tokio::runtime::Runtime> {
  tokio::runtime::Runtime::new().context("Failed to create async runtime")
}
