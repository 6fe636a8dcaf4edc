//! Implementation of the `layerpack checksum` command.

use anyhow::{Context, Result};

use layerpack_lib::fingerprint::Fingerprinter;

use super::{Algorithm, runtime};
use crate::output::{OutputFormat, print_json, print_stat, short_digest};

/// Hash every file matched by `patterns` and print the per-file digests and
/// the combined checksum. Patterns that match nothing are ignored.
pub fn cmd_checksum(patterns: &[String], algorithm: Algorithm, output: OutputFormat) -> Result<()> {
  let fingerprinter = Fingerprinter::default().with_algorithm(algorithm.into());

  let rt = runtime()?;
  let result = rt
    .block_on(fingerprinter.checksum_of_files(patterns))
    .context("Checksum failed")?;

  if output.is_json() {
    print_json(&result)?;
  } else {
    for file in &result.files {
      let digest = result.hashes.get(file).map(String::as_str).unwrap_or_default();
      println!("{}  {}", short_digest(digest), file.display());
    }
    print_stat("Files", &result.files.len().to_string());
    print_stat("Checksum", &result.checksum);
  }

  Ok(())
}
