use layerpack_lib::pack::{
  CacheStatus, LayerRequest, ManifestLayerRequest, PackError, make_layer_from_package_json, pack_base_layer,
};

use super::support::{CountingInstaller, LateStore, Project, SpyStore, context, is_hex, zip_contents};

fn npm_ci() -> Vec<String> {
  vec!["npm".to_string(), "ci".to_string()]
}

#[tokio::test]
async fn builds_and_publishes_layer() {
  let project = Project::new().with_layer_sources();
  let store = SpyStore::new();
  let installer = CountingInstaller::new();
  let ctx = context(store.clone(), &project.out_dir(), installer.clone());

  let request = LayerRequest::new(project.path().join("layer")).with_install_command(npm_ci());
  let pack = pack_base_layer(&ctx, &request).await.unwrap();

  let hash = pack
    .zip_file_name
    .strip_prefix("base-layer-")
    .and_then(|rest| rest.strip_suffix(".zip"))
    .unwrap();
  assert!(is_hex(hash, 40), "unexpected key {}", pack.zip_file_name);
  assert_eq!(pack.fingerprint, hash);
  assert_eq!(pack.cache, CacheStatus::Built);
  assert_eq!(installer.count(), 1);
  assert_eq!(store.publishes(), 1);
  assert!(store.contains(&pack.zip_file_name));

  let names: Vec<_> = zip_contents(&project.out_dir().join(&pack.zip_file_name))
    .into_iter()
    .map(|(name, _)| name)
    .collect();
  assert_eq!(
    names,
    vec![
      "nodejs/node_modules/uuid/index.js",
      "nodejs/package-lock.json",
      "nodejs/package.json",
    ]
  );
}

#[tokio::test]
async fn remote_hit_skips_install_and_upload() {
  let project = Project::new().with_layer_sources();
  let store = SpyStore::new();
  let request = LayerRequest::new(project.path().join("layer")).with_install_command(npm_ci());

  let first = pack_base_layer(
    &context(store.clone(), &project.out_dir(), CountingInstaller::new()),
    &request,
  )
  .await
  .unwrap();

  let other_out = project.path().join("other-dist");
  let installer = CountingInstaller::new();
  let second = pack_base_layer(&context(store.clone(), &other_out, installer.clone()), &request)
    .await
    .unwrap();

  assert_eq!(second.zip_file_name, first.zip_file_name);
  assert_eq!(second.cache, CacheStatus::Remote);
  assert_eq!(installer.count(), 0);
  assert_eq!(store.publishes(), 1);
  assert!(!other_out.exists());
}

#[tokio::test]
async fn archive_published_concurrently_is_found_on_recheck() {
  let project = Project::new().with_layer_sources();
  let store = LateStore::new(4096);
  let installer = CountingInstaller::new();
  let ctx = context(store.clone(), &project.out_dir(), installer.clone());

  let pack = pack_base_layer(&ctx, &LayerRequest::new(project.path().join("layer")))
    .await
    .unwrap();

  assert_eq!(pack.cache, CacheStatus::Remote);
  assert_eq!(pack.size, 4096);
  assert_eq!(installer.count(), 0);
  assert_eq!(store.publishes(), 0);
  assert_eq!(store.exists_calls.load(std::sync::atomic::Ordering::SeqCst), 2);
}

#[tokio::test]
async fn local_archive_is_published_without_install() {
  let project = Project::new().with_layer_sources();
  let request = LayerRequest::new(project.path().join("layer")).with_install_command(npm_ci());

  let built = pack_base_layer(
    &context(SpyStore::new(), &project.out_dir(), CountingInstaller::new()),
    &request,
  )
  .await
  .unwrap();

  let empty_store = SpyStore::new();
  let installer = CountingInstaller::new();
  let pack = pack_base_layer(&context(empty_store.clone(), &project.out_dir(), installer.clone()), &request)
    .await
    .unwrap();

  assert_eq!(pack.zip_file_name, built.zip_file_name);
  assert_eq!(pack.cache, CacheStatus::Local);
  assert_eq!(empty_store.publishes(), 1);
  assert_eq!(installer.count(), 0);
  assert!(empty_store.contains(&pack.zip_file_name));
}

#[tokio::test]
async fn key_is_stable_across_sessions_and_checkouts() {
  let one = Project::new().with_layer_sources();
  let two = Project::new().with_layer_sources();

  let a = pack_base_layer(
    &context(SpyStore::new(), &one.out_dir(), CountingInstaller::new()),
    &LayerRequest::new(one.path().join("layer")).with_install_command(npm_ci()),
  )
  .await
  .unwrap();
  let b = pack_base_layer(
    &context(SpyStore::new(), &two.out_dir(), CountingInstaller::new()),
    &LayerRequest::new(two.path().join("layer")).with_install_command(npm_ci()),
  )
  .await
  .unwrap();

  assert_eq!(a.zip_file_name, b.zip_file_name);
}

#[tokio::test]
async fn install_command_changes_key() {
  let project = Project::new().with_layer_sources();
  let store = SpyStore::new();
  let ctx = context(store.clone(), &project.out_dir(), CountingInstaller::new());
  let layer = project.path().join("layer");

  let ci = pack_base_layer(&ctx, &LayerRequest::new(&layer).with_install_command(npm_ci()))
    .await
    .unwrap();
  let with_flags = pack_base_layer(
    &ctx,
    &LayerRequest::new(&layer).with_install_command(vec![
      "npm".to_string(),
      "ci".to_string(),
      "--ignore-scripts".to_string(),
    ]),
  )
  .await
  .unwrap();

  assert_ne!(ci.zip_file_name, with_flags.zip_file_name);
  assert_eq!(store.publishes(), 2);
}

#[tokio::test]
async fn layer_name_prefixes_key() {
  let project = Project::new().with_layer_sources();
  let ctx = context(SpyStore::new(), &project.out_dir(), CountingInstaller::new());

  let pack = pack_base_layer(
    &ctx,
    &LayerRequest::new(project.path().join("layer")).with_name("shared-deps"),
  )
  .await
  .unwrap();

  assert!(pack.zip_file_name.starts_with("shared-deps-"));
}

#[tokio::test]
async fn lockfile_is_trimmed_before_install() {
  let project = Project::new();
  project.write(
    "layer/package.json",
    r#"{"dependencies":{"uuid":"9.0.0"},"devDependencies":{"typescript":"5.0.0"}}"#,
  );
  project.write(
    "layer/package-lock.json",
    r#"{"lockfileVersion":3,"packages":{"":{},"node_modules/uuid":{"version":"9.0.0"},"node_modules/typescript":{"version":"5.0.0","dev":true}}}"#,
  );
  let ctx = context(SpyStore::new(), &project.out_dir(), CountingInstaller::new());

  let pack = pack_base_layer(&ctx, &LayerRequest::new(project.path().join("layer")))
    .await
    .unwrap();

  let lockfile = zip_contents(&project.out_dir().join(&pack.zip_file_name))
    .into_iter()
    .find(|(name, _)| name == "nodejs/package-lock.json")
    .map(|(_, content)| content)
    .unwrap();
  assert!(lockfile.contains("node_modules/uuid"));
  assert!(!lockfile.contains("node_modules/typescript"));
}

#[tokio::test]
async fn manifest_layer_lockfile_keeps_selected_dev_dependency() {
  let project = Project::new();
  let package_json = project.write(
    "package.json",
    r#"{"dependencies":{"uuid":"9.0.0"},"devDependencies":{"@aws-sdk/client-s3":"3.0.0"}}"#,
  );
  let lockfile = project.write(
    "package-lock.json",
    r#"{"lockfileVersion":3,"packages":{
      "":{"dependencies":{"uuid":"9.0.0"},"devDependencies":{"@aws-sdk/client-s3":"3.0.0"}},
      "node_modules/uuid":{"version":"9.0.0"},
      "node_modules/@aws-sdk/client-s3":{"version":"3.0.0","dev":true,"dependencies":{"tslib":"2.6.0"}},
      "node_modules/tslib":{"version":"2.6.0","dev":true}
    }}"#,
  );
  let ctx = context(SpyStore::new(), &project.out_dir(), CountingInstaller::new());

  let request = ManifestLayerRequest::new(
    project.path().join("layer"),
    package_json,
    lockfile,
    vec!["@aws-sdk/client-s3".to_string()],
  );
  let pack = make_layer_from_package_json(&ctx, &request).await.unwrap();

  let staged = zip_contents(&project.out_dir().join(&pack.zip_file_name))
    .into_iter()
    .find(|(name, _)| name == "nodejs/package-lock.json")
    .map(|(_, content)| content)
    .unwrap();
  let staged: serde_json::Value = serde_json::from_str(&staged).unwrap();
  let packages = staged["packages"].as_object().unwrap();
  assert!(packages.contains_key("node_modules/@aws-sdk/client-s3"));
  assert!(packages.contains_key("node_modules/tslib"));
  assert!(!packages.contains_key("node_modules/uuid"));
  assert!(packages["node_modules/@aws-sdk/client-s3"].get("dev").is_none());
}

#[tokio::test]
async fn missing_lockfile_installs_without_it() {
  let project = Project::new();
  project.write("layer/package.json", r#"{"dependencies":{"uuid":"9.0.0"}}"#);
  let installer = CountingInstaller::new();
  let ctx = context(SpyStore::new(), &project.out_dir(), installer.clone());

  pack_base_layer(&ctx, &LayerRequest::new(project.path().join("layer")))
    .await
    .unwrap();

  let commands = installer.commands.lock().unwrap();
  assert_eq!(commands[0][..2], ["npm", "install"]);
}

#[tokio::test]
async fn failed_install_reports_command_and_publishes_nothing() {
  let project = Project::new().with_layer_sources();
  let store = SpyStore::new();
  let ctx = context(store.clone(), &project.out_dir(), CountingInstaller::failing(1));

  let err = pack_base_layer(
    &ctx,
    &LayerRequest::new(project.path().join("layer")).with_install_command(npm_ci()),
  )
  .await
  .unwrap_err();

  match err {
    PackError::CommandFailed { cmd, code, .. } => {
      assert_eq!(cmd, "npm ci");
      assert_eq!(code, Some(1));
    }
    other => panic!("unexpected error: {other}"),
  }
  assert_eq!(store.publishes(), 0);
}

#[tokio::test]
async fn empty_install_command_is_rejected_before_install() {
  let project = Project::new().with_layer_sources();
  let store = SpyStore::new();
  let installer = CountingInstaller::new();
  let ctx = context(store.clone(), &project.out_dir(), installer.clone());

  let err = pack_base_layer(
    &ctx,
    &LayerRequest::new(project.path().join("layer")).with_install_command(Vec::new()),
  )
  .await
  .unwrap_err();

  assert!(matches!(err, PackError::EmptyCommand { .. }));
  assert_eq!(err.to_string(), "install command is empty");
  assert_eq!(installer.count(), 0);
  assert_eq!(store.exists_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_manifest_names_expected_path() {
  let project = Project::new();
  let ctx = context(SpyStore::new(), &project.out_dir(), CountingInstaller::new());

  let err = pack_base_layer(&ctx, &LayerRequest::new(project.path().join("layer")))
    .await
    .unwrap_err();

  assert!(matches!(err, PackError::InputMissing { ref path, .. } if path == &project.path().join("layer/package.json")));
}

#[tokio::test]
async fn manifest_layer_selects_required_dependencies() {
  let project = Project::new();
  let package_json = project.write(
    "package.json",
    r#"{"dependencies":{"uuid":"9.0.0","express":"4.0.0"},"devDependencies":{"@aws-sdk/client-s3":"3.0.0"}}"#,
  );
  let lockfile = project.write("package-lock.json", r#"{"lockfileVersion":1}"#);
  let installer = CountingInstaller::new();
  let ctx = context(SpyStore::new(), &project.out_dir(), installer.clone());

  let request = ManifestLayerRequest::new(
    project.path().join("layer"),
    package_json,
    lockfile,
    vec!["uuid".to_string(), "@aws-sdk/client-s3".to_string()],
  );
  let pack = make_layer_from_package_json(&ctx, &request).await.unwrap();

  let written: serde_json::Value =
    serde_json::from_str(&std::fs::read_to_string(project.path().join("layer/package.json")).unwrap()).unwrap();
  assert_eq!(
    written,
    serde_json::json!({ "dependencies": { "uuid": "9.0.0", "@aws-sdk/client-s3": "3.0.0" } })
  );
  assert!(project.path().join("layer/package-lock.json").is_file());
  assert!(pack.zip_file_name.starts_with("base-layer-"));
  assert_eq!(installer.count(), 1);
}

#[tokio::test]
async fn manifest_layer_rejects_unknown_dependency() {
  let project = Project::new();
  let package_json = project.write("package.json", r#"{"dependencies":{"uuid":"9.0.0"}}"#);
  let lockfile = project.write("package-lock.json", "{}");
  let ctx = context(SpyStore::new(), &project.out_dir(), CountingInstaller::new());

  let request = ManifestLayerRequest::new(
    project.path().join("layer"),
    package_json,
    lockfile,
    vec!["left-pad".to_string()],
  );
  let err = make_layer_from_package_json(&ctx, &request).await.unwrap_err();

  assert!(matches!(err, PackError::DependencyResolution { ref dependency, .. } if dependency == "left-pad"));
}
