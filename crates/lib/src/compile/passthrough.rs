//! Ships the entry point unchanged.
//!
//! For handlers already written as a single self-contained script: the
//! closure is the entry point alone and compiling is a copy.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{CompileError, CompileRequest, Compiler};
use crate::reporter::ProgressReporter;

#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughCompiler;

#[async_trait]
impl Compiler for PassthroughCompiler {
  fn name(&self) -> &str {
    "passthrough"
  }

  fn options(&self) -> serde_json::Value {
    serde_json::json!({ "compiler": "passthrough" })
  }

  async fn inputs(
    &self,
    entry_point: &Path,
    _reporter: &dyn ProgressReporter,
    _label: &str,
  ) -> Result<Vec<PathBuf>, CompileError> {
    Ok(vec![entry_point.to_path_buf()])
  }

  async fn compile(
    &self,
    request: &CompileRequest,
    reporter: &dyn ProgressReporter,
    label: &str,
  ) -> Result<(), CompileError> {
    reporter.progress(label, "Copying entry point", None);
    if let Some(parent) = request.output_path.parent() {
      tokio::fs::create_dir_all(parent)
        .await
        .map_err(|source| CompileError::Io {
          path: parent.to_path_buf(),
          source,
        })?;
    }
    tokio::fs::copy(&request.entry_point, &request.output_path)
      .await
      .map_err(|source| CompileError::Io {
        path: request.entry_point.clone(),
        source,
      })?;
    Ok(())
  }
}
