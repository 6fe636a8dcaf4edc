//! Packing every function of a deployment unit.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info};

use super::lambda::{LambdaRequest, pack_lambda};
use super::types::{LambdaPack, LayeredLambdas, PackContext, PackError};
use crate::compile::SharedCompiler;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LambdasRequest {
  /// Identifier of the deployment unit.
  pub id: String,
  /// Logical function name to entry point.
  pub lambdas: BTreeMap<String, PathBuf>,
  pub ignore_folders: Vec<String>,
}

/// Pack every function in `request` concurrently.
///
/// At most `ctx.parallelism` functions are packed at once. A failing function
/// does not stop the others; every task runs to completion before the result
/// is produced, and artifacts already published by successful siblings stay
/// published when the aggregate fails.
pub async fn pack_layered_lambdas(
  ctx: &PackContext,
  compiler: SharedCompiler,
  request: &LambdasRequest,
) -> Result<(LayeredLambdas, Vec<LambdaPack>), PackError> {
  let semaphore = Arc::new(Semaphore::new(ctx.parallelism.max(1)));
  let mut join_set = JoinSet::new();
  let mut names = HashMap::new();

  for (name, entry_point) in &request.lambdas {
    let ctx = ctx.clone();
    let compiler = compiler.clone();
    let semaphore = semaphore.clone();
    let lambda = LambdaRequest::new(name, entry_point).with_ignore_folders(request.ignore_folders.clone());

    let handle = join_set.spawn(async move {
      let _permit = semaphore.acquire_owned().await.map_err(|e| PackError::Task {
        message: e.to_string(),
      })?;
      pack_lambda(&ctx, compiler.as_ref(), &lambda).await
    });
    names.insert(handle.id(), name.clone());
  }

  let mut packs = Vec::with_capacity(request.lambdas.len());
  let mut failures = Vec::new();

  while let Some(joined) = join_set.join_next_with_id().await {
    match joined {
      Ok((_, Ok(pack))) => packs.push(pack),
      Ok((id, Err(e))) => {
        let name = names.get(&id).cloned().unwrap_or_default();
        error!(function = %name, error = %e, "function failed to pack");
        failures.push((name, e));
      }
      Err(e) => {
        let name = names.get(&e.id()).cloned().unwrap_or_default();
        error!(function = %name, error = %e, "pack task panicked");
        failures.push((
          name,
          PackError::Task {
            message: e.to_string(),
          },
        ));
      }
    }
  }

  if !failures.is_empty() {
    failures.sort_by(|a, b| a.0.cmp(&b.0));
    return Err(PackError::LambdasFailed { failures });
  }

  packs.sort_by(|a, b| a.name.cmp(&b.name));
  let lambda_zip_file_names = packs
    .iter()
    .map(|pack| (pack.name.clone(), pack.zip_file_name.clone()))
    .collect();

  info!(id = %request.id, functions = packs.len(), "packed functions");
  Ok((
    LayeredLambdas {
      id: request.id.clone(),
      lambda_zip_file_names,
    },
    packs,
  ))
}
