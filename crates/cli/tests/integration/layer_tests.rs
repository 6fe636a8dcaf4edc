//! Layer command integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

fn is_layer_key(key: &str, name: &str) -> bool {
  let Some(hash) = key.strip_prefix(&format!("{}-", name)).and_then(|k| k.strip_suffix(".zip")) else {
    return false;
  };
  hash.len() == 40 && hash.chars().all(|c| c.is_ascii_hexdigit())
}

#[test]
fn layer_builds_and_publishes() {
  let env = TestEnv::project();

  let json = env.run_json(&["layer"]);
  let key = json["zipFileName"].as_str().unwrap();

  assert!(is_layer_key(key, "base-layer"), "unexpected key {}", key);
  assert_eq!(json["cache"], "built");
  assert!(env.bucket_path().join(key).is_file());
  assert!(env.out_path().join(key).is_file());
}

#[test]
fn layer_second_run_hits_store() {
  let env = TestEnv::project();

  let first = env.run_json(&["layer"]);
  let second = env.run_json(&["layer"]);

  assert_eq!(first["zipFileName"], second["zipFileName"]);
  assert_eq!(second["cache"], "remote");
  assert_eq!(first["size"], second["size"]);
}

#[test]
fn layer_republishes_local_archive() {
  let env = TestEnv::project();

  let first = env.run_json(&["layer"]);
  let key = first["zipFileName"].as_str().unwrap();
  std::fs::remove_file(env.bucket_path().join(key)).unwrap();

  let second = env.run_json(&["layer"]);
  assert_eq!(second["cache"], "local");
  assert!(env.bucket_path().join(key).is_file());
}

#[test]
fn layer_name_flag_sets_key_prefix() {
  let env = TestEnv::project();

  let json = env.run_json(&["layer", "--name", "shared-deps"]);
  assert!(is_layer_key(json["zipFileName"].as_str().unwrap(), "shared-deps"));
}

#[test]
fn layer_manifest_change_changes_key() {
  let env = TestEnv::project();

  let first = env.run_json(&["layer"]);
  env.write_file(
    "layer/package.json",
    r#"{"name":"layer","dependencies":{"left-pad":"^1.3.0","is-odd":"^3.0.0"}}"#,
  );
  let second = env.run_json(&["layer"]);

  assert_ne!(first["zipFileName"], second["zipFileName"]);
  assert_eq!(second["cache"], "built");
}

#[test]
fn layer_text_output_shows_key() {
  let env = TestEnv::project();

  env
    .layerpack_cmd()
    .arg("layer")
    .assert()
    .success()
    .stdout(predicate::str::contains("Layer base-layer ready"))
    .stdout(predicate::str::contains("base-layer-"));
}

#[test]
fn layer_failed_install_reports_command() {
  let env = TestEnv::project();

  env
    .layerpack_cmd()
    .args(["layer", "--install-command", "false"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("`false`"))
    .stderr(predicate::str::contains("exited with code 1"));
}

#[test]
fn layer_missing_manifest_fails() {
  let env = TestEnv::project();
  let empty = env.root().join("empty");
  std::fs::create_dir_all(&empty).unwrap();

  env
    .layerpack_cmd()
    .arg("layer")
    .arg("--dir")
    .arg(&empty)
    .assert()
    .failure()
    .stderr(predicate::str::contains("package manifest not found"));
}
