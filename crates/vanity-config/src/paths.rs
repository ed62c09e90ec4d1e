//! Load path and config file locations

use std::path::{Path, PathBuf};

/// Directory, relative to the process root, experiments are read from
pub const DEFAULT_LOAD_PATH: &str = "experiments";

/// Per-environment endpoint map, relative to the process root
pub const CONFIG_FILE: &str = "config/redis.yml";

/// Resolve the experiments directory
///
/// - `None` → `<root>/experiments`
/// - relative → `<root>/<path>`
/// - absolute → unchanged
#[must_use]
pub fn resolve_load_path(root: &Path, configured: Option<&Path>) -> PathBuf {
    match configured {
        Some(path) if path.is_absolute() => path.to_path_buf(),
        Some(path) => root.join(path),
        None => root.join(DEFAULT_LOAD_PATH),
    }
}

/// `<root>/config/redis.yml`
#[inline]
#[must_use]
pub fn default_config_file(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}
