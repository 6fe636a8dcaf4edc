//! CLI output formatting utilities.
//!
//! Text output prints archive keys, sizes and cache outcomes; `--output json`
//! prints the serialized results instead. Progress from the packers goes to
//! stderr through [`ConsoleReporter`] so stdout stays parseable.

use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};

use layerpack_lib::pack::CacheStatus;
use layerpack_lib::reporter::ProgressReporter;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const WARNING: &str = "⚠";
  pub const INFO: &str = "•";
  pub const ARROW: &str = "→";
}

/// Digest prefix shown in text output; long enough to tell keys apart.
const SHORT_DIGEST_LEN: usize = 12;

pub fn short_digest(digest: &str) -> &str {
  digest.get(..SHORT_DIGEST_LEN).unwrap_or(digest)
}

/// Archive size, rounded up to whole kilobytes below a megabyte.
pub fn format_size(bytes: u64) -> String {
  const KB: u64 = 1024;
  const MB: u64 = KB * 1024;

  if bytes >= MB {
    format!("{:.1} MB", bytes as f64 / MB as f64)
  } else if bytes >= KB {
    format!("{} KB", bytes.div_ceil(KB))
  } else {
    format!("{} B", bytes)
  }
}

pub fn format_elapsed(elapsed: Duration) -> String {
  let secs = elapsed.as_secs();
  if secs >= 60 {
    format!("{}m {:02}s", secs / 60, secs % 60)
  } else if secs > 0 {
    format!("{:.1}s", elapsed.as_secs_f64())
  } else {
    format!("{}ms", elapsed.as_millis())
  }
}

/// `name → key (size, cache)` for one packed archive.
fn artifact_line(name: &str, key: &str, size: u64, cache: CacheStatus) -> String {
  format!("{} {} {} ({}, {})", name, symbols::ARROW, key, format_size(size), cache.as_str())
}

pub fn print_artifact(name: &str, key: &str, size: u64, cache: CacheStatus) {
  let line = artifact_line(name, key, size, cache);
  match cache {
    CacheStatus::Built => println!(
      "{} {}",
      symbols::INFO.if_supports_color(Stream::Stdout, |s| s.green()),
      line
    ),
    CacheStatus::Local | CacheStatus::Remote => println!(
      "{} {}",
      symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()),
      line.if_supports_color(Stream::Stdout, |s| s.dimmed())
    ),
  }
}

pub fn print_success(message: &str) {
  println!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

pub fn print_stat(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}

/// Progress lines on stderr, prefixed with the artifact label.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleReporter;

impl ConsoleReporter {
  fn line(symbol: &str, label: &str, message: &str, detail: Option<&str>) -> String {
    match detail {
      Some(detail) => format!("{} [{}] {} {}", symbol, label, message, detail),
      None => format!("{} [{}] {}", symbol, label, message),
    }
  }
}

impl ProgressReporter for ConsoleReporter {
  fn progress(&self, label: &str, message: &str, detail: Option<&str>) {
    let line = Self::line(symbols::INFO, label, message, detail);
    eprintln!("{}", line.if_supports_color(Stream::Stderr, |s| s.dimmed()));
  }

  fn success(&self, label: &str, message: &str, detail: Option<&str>) {
    let line = Self::line(symbols::SUCCESS, label, message, detail);
    eprintln!("{}", line.if_supports_color(Stream::Stderr, |s| s.green()));
  }

  fn failure(&self, label: &str, message: &str, detail: Option<&str>) {
    let line = Self::line(symbols::ERROR, label, message, detail);
    eprintln!("{}", line.if_supports_color(Stream::Stderr, |s| s.red()));
  }

  fn warn(&self, label: &str, message: &str) {
    let line = Self::line(symbols::WARNING, label, message, None);
    eprintln!("{}", line.if_supports_color(Stream::Stderr, |s| s.yellow()));
  }

  fn size_in_bytes(&self, label: &str, size: u64) {
    let line = Self::line(symbols::ARROW, label, "Size", Some(&format_size(size)));
    eprintln!("{}", line.if_supports_color(Stream::Stderr, |s| s.blue()));
  }
}
