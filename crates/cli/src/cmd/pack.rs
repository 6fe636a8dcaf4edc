//! Implementation of the `layerpack pack` command.
//!
//! Packs the dependency layer first, then every function, and prints the
//! object keys a deployment needs to reference them.

use std::time::Instant;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use layerpack_lib::pack::LayeredLambdas;

use super::layer::{configured_layer, pack_layer, print_layer};
use super::lambdas::{pack_functions, print_functions};
use super::{Settings, runtime};
use crate::output::{format_elapsed, print_json, print_stat};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PackOutput<'a> {
  bucket: &'a str,
  layer_zip_file_name: &'a str,
  lambdas: &'a LayeredLambdas,
}

pub fn cmd_pack(settings: &Settings) -> Result<()> {
  let start = Instant::now();
  let config = settings.load_config()?;
  let source = configured_layer(&config)?;
  let ctx = settings.context(&config)?;

  let rt = runtime()?;
  let (layer, layered, packs) = rt.block_on(async {
    let layer = pack_layer(&ctx, &source).await.context("Layer packing failed")?;
    info!(key = %layer.zip_file_name, "layer ready");
    let (layered, packs) = pack_functions(&ctx, &config)
      .await?
      .context("Function packing failed")?;
    anyhow::Ok((layer, layered, packs))
  })?;

  if settings.output.is_json() {
    print_json(&PackOutput {
      bucket: &ctx.bucket,
      layer_zip_file_name: &layer.zip_file_name,
      lambdas: &layered,
    })?;
  } else {
    print_layer(&layer, &ctx);
    print_functions(&layered, &packs);
    print_stat("Duration", &format_elapsed(start.elapsed()));
  }

  Ok(())
}
