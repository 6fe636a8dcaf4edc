//! Pack command integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn pack_prints_deployment_keys() {
  let env = TestEnv::project();

  let json = env.run_json(&["pack"]);
  assert_eq!(json["bucket"], "lambda-sources");

  let layer_key = json["layerZipFileName"].as_str().unwrap();
  assert!(layer_key.starts_with("base-layer-"));
  assert!(env.bucket_path().join(layer_key).is_file());

  let lambdas = &json["lambdas"];
  assert_eq!(lambdas["id"], "service");
  assert_eq!(lambdas["lambdaZipFileNames"].as_object().unwrap().len(), 2);
}

#[test]
fn pack_is_stable_across_runs() {
  let env = TestEnv::project();

  let first = env.run_json(&["pack"]);
  let second = env.run_json(&["pack"]);
  assert_eq!(first, second);
}

#[test]
fn pack_requires_layer_section() {
  let env = TestEnv::project();
  env.write_config(&serde_json::json!({
    "bucket": "lambda-sources",
    "store": "store",
    "lambdas": { "id": "service", "map": { "uuidLambda": "src/uuid.js" } },
    "compiler": { "kind": "passthrough" },
  }));

  env
    .layerpack_cmd()
    .arg("pack")
    .assert()
    .failure()
    .stderr(predicate::str::contains("No layer configured"));
}

#[test]
fn pack_flags_override_config() {
  let env = TestEnv::project();
  let other_store = env.root().join("other-store");

  env
    .layerpack_cmd()
    .args(["--bucket", "other-bucket", "--store"])
    .arg(&other_store)
    .arg("pack")
    .assert()
    .success()
    .stdout(predicate::str::contains("ready"));

  assert!(other_store.join("other-bucket").is_dir());
  assert!(!env.bucket_path().exists());
}
