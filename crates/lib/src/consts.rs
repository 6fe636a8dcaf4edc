pub const APP_NAME: &str = "layerpack";

/// Default name of the config file looked up in the working directory.
pub const CONFIG_FILENAME: &str = "layerpack.json";

pub const DEFAULT_LAYER_NAME: &str = "base-layer";

pub const MANIFEST_FILENAME: &str = "package.json";

pub const DEFAULT_LOCKFILE_NAME: &str = "package-lock.json";

/// Directory the runtime expects node dependencies under inside a layer archive.
pub const LAYER_ROOT_DIR: &str = "nodejs";

/// Fixed suffix of function archive names. External stacks look keys up by it.
pub const FUNCTION_ARCHIVE_SUFFIX: &str = "113ed";

pub const ARCHIVE_EXTENSION: &str = "zip";

/// In-archive path of the compiled entry point.
pub const FUNCTION_ENTRY_FILENAME: &str = "index.js";

/// In-archive path of the per-file dependency hash manifest.
pub const FUNCTION_HASHES_FILENAME: &str = "hashes.json";

pub const DEFAULT_INSTALL_COMMAND: &[&str] = &["npm", "ci", "--ignore-scripts", "--only=prod", "--legacy-peer-deps"];

/// Used instead of [`DEFAULT_INSTALL_COMMAND`] when the layer has no lockfile.
pub const DEFAULT_INSTALL_COMMAND_NO_LOCKFILE: &[&str] =
  &["npm", "install", "--ignore-scripts", "--only=prod", "--legacy-peer-deps"];
