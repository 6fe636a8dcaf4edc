//! Child process execution for installers and compilers.
//!
//! Output is streamed line by line to the progress reporter while the process
//! runs. Processes are killed when the future driving them is dropped.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::reporter::ProgressReporter;

#[derive(Debug, Error)]
pub enum ProcessError {
  #[error("empty command")]
  EmptyCommand,

  #[error("failed to start `{cmd}`: {source}")]
  Spawn {
    cmd: String,
    #[source]
    source: std::io::Error,
  },

  #[error("`{cmd}` in {cwd} exited with code {}", exit_code(.code))]
  Failed {
    cmd: String,
    cwd: PathBuf,
    code: Option<i32>,
    /// Captured stderr, kept for callers that extract diagnostics from it.
    stderr: String,
  },
}

pub(crate) fn exit_code(code: &Option<i32>) -> String {
  match code {
    Some(code) => code.to_string(),
    None => "none (terminated by signal)".to_string(),
  }
}

/// Captured output of a successful run.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
  pub stdout: String,
  pub stderr: String,
}

/// Run `command` (program followed by its arguments) in `cwd`.
///
/// Each output line is passed to `reporter.progress(label, step, line)`.
pub async fn run_command(
  command: &[String],
  cwd: &Path,
  reporter: &dyn ProgressReporter,
  label: &str,
  step: &str,
) -> Result<CommandOutput, ProcessError> {
  let (program, args) = command.split_first().ok_or(ProcessError::EmptyCommand)?;
  let cmd_line = command.join(" ");

  info!(cmd = %cmd_line, cwd = %cwd.display(), "running command");

  let mut child = Command::new(program)
    .args(args)
    .current_dir(cwd)
    .stdin(Stdio::null())
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .kill_on_drop(true)
    .spawn()
    .map_err(|source| ProcessError::Spawn {
      cmd: cmd_line.clone(),
      source,
    })?;

  let stdout = child.stdout.take();
  let stderr = child.stderr.take();

  let (stdout, stderr, status) = tokio::join!(
    forward_lines(stdout, reporter, label, step),
    forward_lines(stderr, reporter, label, step),
    child.wait(),
  );

  let status = status.map_err(|source| ProcessError::Spawn {
    cmd: cmd_line.clone(),
    source,
  })?;

  if !status.success() {
    debug!(cmd = %cmd_line, code = ?status.code(), "command failed");
    return Err(ProcessError::Failed {
      cmd: cmd_line,
      cwd: cwd.to_path_buf(),
      code: status.code(),
      stderr,
    });
  }

  Ok(CommandOutput { stdout, stderr })
}

/// Forward each line of `stream` to the reporter and return everything read.
/// Bytes that are not UTF-8 are replaced; the stream is drained to EOF so the
/// child never blocks on a full pipe.
async fn forward_lines<R>(stream: Option<R>, reporter: &dyn ProgressReporter, label: &str, step: &str) -> String
where
  R: AsyncRead + Unpin,
{
  let Some(stream) = stream else {
    return String::new();
  };

  let mut captured = String::new();
  let mut reader = BufReader::new(stream);
  let mut buf = Vec::new();
  loop {
    buf.clear();
    match reader.read_until(b'\n', &mut buf).await {
      Ok(0) => break,
      Ok(_) => {}
      Err(e) => {
        debug!(error = %e, "stopped reading command output");
        break;
      }
    }
    while matches!(buf.last(), Some(b'\n' | b'\r')) {
      buf.pop();
    }
    let line = String::from_utf8_lossy(&buf);
    reporter.progress(label, step, Some(line.as_ref()));
    captured.push_str(&line);
    captured.push('\n');
  }
  captured
}
