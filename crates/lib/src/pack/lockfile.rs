//! Production-only rewrite of `package-lock.json`.
//!
//! The layer manifest names the packages to install; a lockfile copied from
//! the whole project lists far more, and `npm ci` refuses a lockfile whose
//! root entry disagrees with `package.json`. For lockfile versions 2 and later
//! the `packages` table is a flat map of install paths, so the packages the
//! manifest needs can be found by resolving each dependency the way node
//! does: the nearest `node_modules/<name>` walking up from the requiring
//! package.
//!
//! The rewritten lockfile is not part of the layer fingerprint; only the
//! original manifest and lockfile are hashed.

use std::collections::{BTreeSet, VecDeque};

use serde_json::{Map, Value};

/// Dependency tables followed when collecting transitive packages.
const DEPENDENCY_TABLES: &[&str] = &["dependencies", "optionalDependencies", "peerDependencies"];

/// Flags recomputed by npm from the manifest; stale values would make
/// `npm ci --omit=dev` skip packages the layer manifest now requires.
const DEV_FLAGS: &[&str] = &["dev", "devOptional"];

const MODULES_DIR: &str = "node_modules";

/// Trim `lockfile` down to the packages reachable from `manifest`'s
/// `dependencies`.
///
/// Returns `Ok(None)` when the lockfile predates the `packages` table and must
/// be used as-is.
pub fn trim_lockfile(lockfile: &str, manifest: &str) -> Result<Option<String>, serde_json::Error> {
  let lock: Value = serde_json::from_str(lockfile)?;
  let manifest: Value = serde_json::from_str(manifest)?;

  let version = lock.get("lockfileVersion").and_then(Value::as_u64).unwrap_or(1);
  let Some(packages) = lock.get("packages").and_then(Value::as_object) else {
    return Ok(None);
  };
  if version < 2 {
    return Ok(None);
  }

  let dependencies = manifest
    .get("dependencies")
    .and_then(Value::as_object)
    .cloned()
    .unwrap_or_default();

  let mut kept = BTreeSet::new();
  let mut queue: VecDeque<(String, String)> = dependencies.keys().map(|name| (String::new(), name.clone())).collect();
  while let Some((requester, name)) = queue.pop_front() {
    let Some(path) = resolve(packages, &requester, &name) else {
      continue;
    };
    if !kept.insert(path.clone()) {
      continue;
    }
    for table in DEPENDENCY_TABLES {
      if let Some(deps) = packages[&path].get(*table).and_then(Value::as_object) {
        queue.extend(deps.keys().map(|dep| (path.clone(), dep.clone())));
      }
    }
  }

  let mut root = packages.get("").and_then(Value::as_object).cloned().unwrap_or_default();
  root.remove("devDependencies");
  root.insert("dependencies".to_string(), Value::Object(dependencies));

  let mut trimmed = Map::new();
  trimmed.insert(String::new(), Value::Object(root));
  for path in kept {
    let mut entry = packages[&path].clone();
    if let Some(fields) = entry.as_object_mut() {
      for flag in DEV_FLAGS {
        fields.remove(*flag);
      }
    }
    trimmed.insert(path, entry);
  }

  let mut out = Map::new();
  for field in ["name", "version", "lockfileVersion", "requires"] {
    if let Some(value) = lock.get(field) {
      out.insert(field.to_string(), value.clone());
    }
  }
  out.insert("packages".to_string(), Value::Object(trimmed));

  serde_json::to_string_pretty(&Value::Object(out)).map(Some)
}

/// Install path of `name` as seen from the package at `requester` (`""` for
/// the root): `<requester>/node_modules/<name>`, then each enclosing
/// `node_modules` up to the top level.
fn resolve(packages: &Map<String, Value>, requester: &str, name: &str) -> Option<String> {
  let mut base = requester;
  loop {
    let candidate = if base.is_empty() {
      format!("{}/{}", MODULES_DIR, name)
    } else {
      format!("{}/{}/{}", base, MODULES_DIR, name)
    };
    if packages.contains_key(&candidate) {
      return Some(candidate);
    }
    if base.is_empty() {
      return None;
    }
    base = match base.rfind(&format!("/{}/", MODULES_DIR)) {
      Some(idx) => &base[..idx],
      None => "",
    };
  }
}
