//! Progress reporting for pack operations.
//!
//! Every method receives the label of the artifact being packed, so a single
//! reporter can be shared by concurrently running packers.

use std::sync::Arc;

use tracing::{error, info, warn};

pub trait ProgressReporter: Send + Sync {
  fn progress(&self, label: &str, message: &str, detail: Option<&str>);
  fn success(&self, label: &str, message: &str, detail: Option<&str>);
  fn failure(&self, label: &str, message: &str, detail: Option<&str>);
  fn warn(&self, label: &str, message: &str);
  fn size_in_bytes(&self, label: &str, size: u64);
}

pub type SharedReporter = Arc<dyn ProgressReporter>;

/// Discards all progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
  fn progress(&self, _label: &str, _message: &str, _detail: Option<&str>) {}
  fn success(&self, _label: &str, _message: &str, _detail: Option<&str>) {}
  fn failure(&self, _label: &str, _message: &str, _detail: Option<&str>) {}
  fn warn(&self, _label: &str, _message: &str) {}
  fn size_in_bytes(&self, _label: &str, _size: u64) {}
}

/// Forwards progress to `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ProgressReporter for TracingReporter {
  fn progress(&self, label: &str, message: &str, detail: Option<&str>) {
    info!(artifact = %label, detail = detail.unwrap_or_default(), "{}", message);
  }

  fn success(&self, label: &str, message: &str, detail: Option<&str>) {
    info!(artifact = %label, detail = detail.unwrap_or_default(), status = "ok", "{}", message);
  }

  fn failure(&self, label: &str, message: &str, detail: Option<&str>) {
    error!(artifact = %label, detail = detail.unwrap_or_default(), "{}", message);
  }

  fn warn(&self, label: &str, message: &str) {
    warn!(artifact = %label, "{}", message);
  }

  fn size_in_bytes(&self, label: &str, size: u64) {
    info!(artifact = %label, size, "artifact size");
  }
}
