//! esbuild, run as a child process.
//!
//! Input discovery runs a throwaway bundle with `--metafile` and reads the
//! `inputs` table, so the closure follows esbuild's own resolution rules.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{CompileError, CompileRequest, Compiler};
use crate::process::{ProcessError, run_command};
use crate::reporter::ProgressReporter;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EsbuildOptions {
  /// Program and leading arguments used to invoke esbuild.
  pub command: Vec<String>,
  pub platform: String,
  pub target: String,
  pub format: String,
  /// Appended verbatim to every invocation.
  pub extra_args: Vec<String>,
  /// Directory esbuild runs in; relative metafile paths resolve against it.
  /// Defaults to the current directory.
  pub working_dir: Option<PathBuf>,
}

impl Default for EsbuildOptions {
  fn default() -> Self {
    Self {
      command: vec!["npx".to_string(), "esbuild".to_string()],
      platform: "node".to_string(),
      target: "node18".to_string(),
      format: "cjs".to_string(),
      extra_args: Vec::new(),
      working_dir: None,
    }
  }
}

#[derive(Debug, Clone)]
pub struct EsbuildCompiler {
  options: EsbuildOptions,
}

#[derive(Debug, Deserialize)]
struct Metafile {
  inputs: BTreeMap<String, serde_json::Value>,
}

impl EsbuildCompiler {
  pub fn new(options: EsbuildOptions) -> Self {
    Self { options }
  }

  fn working_dir(&self) -> Result<PathBuf, CompileError> {
    match &self.options.working_dir {
      Some(dir) => Ok(dir.clone()),
      None => std::env::current_dir().map_err(|source| CompileError::Io {
        path: PathBuf::from("."),
        source,
      }),
    }
  }

  fn command_for(&self, entry_point: &Path, externalize: bool, outputs: &[String]) -> Vec<String> {
    let mut cmd = self.options.command.clone();
    cmd.push(entry_point.to_string_lossy().to_string());
    cmd.push("--bundle".to_string());
    cmd.push(format!("--platform={}", self.options.platform));
    cmd.push(format!("--target={}", self.options.target));
    cmd.push(format!("--format={}", self.options.format));
    if externalize {
      cmd.push("--packages=external".to_string());
    }
    cmd.push("--log-level=warning".to_string());
    cmd.extend(self.options.extra_args.iter().cloned());
    cmd.extend(outputs.iter().cloned());
    cmd
  }
}

#[async_trait]
impl Compiler for EsbuildCompiler {
  fn name(&self) -> &str {
    "esbuild"
  }

  fn options(&self) -> serde_json::Value {
    serde_json::json!({
      "compiler": "esbuild",
      "platform": self.options.platform,
      "target": self.options.target,
      "format": self.options.format,
      "externalizeThirdParty": true,
      "extraArgs": self.options.extra_args,
    })
  }

  async fn inputs(
    &self,
    entry_point: &Path,
    reporter: &dyn ProgressReporter,
    label: &str,
  ) -> Result<Vec<PathBuf>, CompileError> {
    let cwd = self.working_dir()?;
    let scratch = tempfile::tempdir().map_err(|source| CompileError::Io {
      path: std::env::temp_dir(),
      source,
    })?;
    let metafile = scratch.path().join("meta.json");
    let outfile = scratch.path().join("out.js");

    let cmd = self.command_for(
      entry_point,
      true,
      &[
        format!("--metafile={}", metafile.display()),
        format!("--outfile={}", outfile.display()),
      ],
    );
    run_command(&cmd, &cwd, reporter, label, "Resolving dependencies")
      .await
      .map_err(map_process_error)?;

    let raw = tokio::fs::read_to_string(&metafile)
      .await
      .map_err(|source| CompileError::Io {
        path: metafile.clone(),
        source,
      })?;
    let inputs = parse_metafile_inputs(&raw, &cwd).map_err(|message| CompileError::Metadata {
      path: metafile.clone(),
      message,
    })?;

    debug!(entry = %entry_point.display(), inputs = inputs.len(), "resolved esbuild inputs");
    Ok(inputs)
  }

  async fn compile(
    &self,
    request: &CompileRequest,
    reporter: &dyn ProgressReporter,
    label: &str,
  ) -> Result<(), CompileError> {
    let cwd = self.working_dir()?;
    let cmd = self.command_for(
      &request.entry_point,
      request.externalize_third_party,
      &[format!("--outfile={}", request.output_path.display())],
    );
    run_command(&cmd, &cwd, reporter, label, "Compiling")
      .await
      .map_err(map_process_error)?;
    Ok(())
  }
}

fn map_process_error(err: ProcessError) -> CompileError {
  if let ProcessError::Failed { stderr, .. } = &err
    && let Some((dependency, file)) = parse_unresolved(stderr)
  {
    return CompileError::Unresolved { dependency, file };
  }
  CompileError::Process(err)
}

/// Input paths from an esbuild metafile, resolved against `cwd`.
///
/// Virtual inputs (namespaced keys such as `<define:...>` or `ns:path`) have no
/// file on disk and are skipped.
fn parse_metafile_inputs(raw: &str, cwd: &Path) -> Result<Vec<PathBuf>, String> {
  let metafile: Metafile = serde_json::from_str(raw).map_err(|e| e.to_string())?;
  Ok(
    metafile
      .inputs
      .keys()
      .map(|key| cwd.join(key))
      .filter(|path| path.is_file())
      .collect(),
  )
}

/// Pull the dependency name and importing file out of esbuild's
/// `Could not resolve "x"` diagnostic.
fn parse_unresolved(stderr: &str) -> Option<(String, String)> {
  const MARKER: &str = "Could not resolve \"";

  let mut lines = stderr.lines();
  let line = lines.by_ref().find(|l| l.contains(MARKER))?;
  let rest = &line[line.find(MARKER)? + MARKER.len()..];
  let dependency = rest.split('"').next()?.to_string();

  let file = lines
    .map(str::trim)
    .find(|l| !l.is_empty())
    .and_then(|l| l.split(':').next())
    .unwrap_or("<unknown>")
    .to_string();

  Some((dependency, file))
}
