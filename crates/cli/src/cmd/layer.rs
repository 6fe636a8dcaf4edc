//! Implementation of the `layerpack layer` command.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result, bail};

use layerpack_lib::config::{LayerSource, PackConfig};
use layerpack_lib::pack::{
  LayerPack, LayerRequest, PackContext, PackError, make_layer_from_package_json, pack_base_layer,
};

use super::{Settings, runtime};
use crate::output::{format_size, format_elapsed, print_json, print_stat, print_success};

/// Pack the layer from `--dir`, or from the config's `layer` section.
pub fn cmd_layer(
  settings: &Settings,
  dir: Option<PathBuf>,
  name: Option<String>,
  install_command: Option<String>,
) -> Result<()> {
  let start = Instant::now();
  let config = settings.load_config()?;

  let mut source = match (dir, &config.layer) {
    (Some(dir), _) => LayerSource::Directory(LayerRequest::new(dir)),
    (None, Some(layer)) => layer.source(),
    (None, None) => bail!("No layer configured: pass --dir or add a `layer` section to the config"),
  };

  let command = install_command.map(|c| c.split_whitespace().map(String::from).collect::<Vec<_>>());
  match &mut source {
    LayerSource::Directory(request) => {
      if let Some(name) = name {
        request.name = name;
      }
      if let Some(command) = command {
        request.install_command = Some(command);
      }
    }
    LayerSource::Manifest(request) => {
      if let Some(name) = name {
        request.name = name;
      }
      if let Some(command) = command {
        request.install_command = Some(command);
      }
    }
  }

  let ctx = settings.context(&config)?;
  let rt = runtime()?;
  let pack = rt.block_on(pack_layer(&ctx, &source)).context("Layer packing failed")?;

  if settings.output.is_json() {
    print_json(&pack)?;
  } else {
    print_layer(&pack, &ctx);
    print_stat("Duration", &format_elapsed(start.elapsed()));
  }

  Ok(())
}

pub(super) async fn pack_layer(ctx: &PackContext, source: &LayerSource) -> std::result::Result<LayerPack, PackError> {
  match source {
    LayerSource::Directory(request) => pack_base_layer(ctx, request).await,
    LayerSource::Manifest(request) => make_layer_from_package_json(ctx, request).await,
  }
}

pub(super) fn print_layer(pack: &LayerPack, ctx: &PackContext) {
  println!();
  print_success(&format!("Layer {} ready", pack.name));
  print_stat("Key", &pack.zip_file_name);
  print_stat("Bucket", &ctx.bucket);
  print_stat("Size", &format_size(pack.size));
  print_stat("Cache", pack.cache.as_str());
}

/// Layer source from the config, for commands that have no layer flags.
pub(super) fn configured_layer(config: &PackConfig) -> Result<LayerSource> {
  match &config.layer {
    Some(layer) => Ok(layer.source()),
    None => bail!("No layer configured: add a `layer` section to the config"),
  }
}
