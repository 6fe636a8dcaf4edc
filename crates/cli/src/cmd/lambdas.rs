//! Implementation of the `layerpack lambdas` command.

use std::time::Instant;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::info;

use layerpack_lib::config::PackConfig;
use layerpack_lib::pack::{LambdaPack, LayeredLambdas, PackContext, PackError, pack_layered_lambdas};

use super::{Settings, runtime};
use crate::output::{format_elapsed, print_artifact, print_json, print_stat, print_success};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LambdasOutput<'a> {
  bucket: &'a str,
  #[serde(flatten)]
  layered: &'a LayeredLambdas,
  functions: &'a [LambdaPack],
}

pub fn cmd_lambdas(settings: &Settings) -> Result<()> {
  let start = Instant::now();
  let config = settings.load_config()?;
  let ctx = settings.context(&config)?;

  let rt = runtime()?;
  let (layered, packs) = rt
    .block_on(pack_functions(&ctx, &config))?
    .context("Function packing failed")?;

  if settings.output.is_json() {
    print_json(&LambdasOutput {
      bucket: &ctx.bucket,
      layered: &layered,
      functions: &packs,
    })?;
  } else {
    print_functions(&layered, &packs);
    print_stat("Duration", &format_elapsed(start.elapsed()));
  }

  Ok(())
}

/// The outer result covers configuration problems, the inner one packing.
pub(super) async fn pack_functions(
  ctx: &PackContext,
  config: &PackConfig,
) -> Result<std::result::Result<(LayeredLambdas, Vec<LambdaPack>), PackError>> {
  let Some(lambdas) = &config.lambdas else {
    bail!("No functions configured: add a `lambdas` section to the config");
  };

  let compiler = config.compiler.build();
  let request = lambdas.request();
  info!(id = %request.id, count = request.lambdas.len(), compiler = compiler.name(), "packing functions");

  Ok(pack_layered_lambdas(ctx, compiler, &request).await)
}

pub(super) fn print_functions(layered: &LayeredLambdas, packs: &[LambdaPack]) {
  println!();
  print_success(&format!("{} function(s) ready for {}", packs.len(), layered.id));
  for pack in packs {
    print_artifact(&pack.name, &pack.zip_file_name, pack.size, pack.cache);
  }
}
