//! Loading configuration from `<git-dir>/strata/` and the user config dir.

use super::Config;
use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory name for strata metadata within the git dir and config dir.
const STRATA_DIR: &str = "strata";

/// Filename for configuration.
const CONFIG_FILE: &str = "config.toml";

/// Resolve the git dir, handling worktree indirection.
///
/// In linked worktrees (created via `git worktree add`), `.git` is a plain
/// text file of the form `gitdir: <path>` pointing at the real git dir. We
/// must read this file and use its target.
///
/// Falls back to the original path if resolution fails.
pub fn resolve_git_dir(repo_root: &Path) -> PathBuf {
    let git_path = repo_root.join(".git");

    if git_path.is_file() {
        if let Ok(contents) = fs::read_to_string(&git_path)
            && let Some(target) = contents.trim().strip_prefix("gitdir:")
        {
            let target = PathBuf::from(target.trim());
            let target = if target.is_relative() {
                repo_root.join(target)
            } else {
                target
            };
            if target.is_dir() {
                return fs::canonicalize(&target).unwrap_or(target);
            }
        }
        // Pointer file exists but is invalid/unreadable - return as-is to surface error
        return git_path;
    }

    git_path
}

/// Get path to the repository config file.
pub fn config_path(repo_root: &Path) -> PathBuf {
    resolve_git_dir(repo_root).join(STRATA_DIR).join(CONFIG_FILE)
}

/// Get path to the per-user config file, if the platform has a config dir.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(STRATA_DIR).join(CONFIG_FILE))
}

/// Load configuration for a repository.
///
/// Layers, lowest precedence first: built-in defaults, the user config file,
/// the repository config file. Missing files are skipped.
pub fn load_config(repo_root: &Path) -> Result<Config> {
    let repo_file = config_path(repo_root);
    let layers: Vec<PathBuf> = user_config_path()
        .into_iter()
        .chain(std::iter::once(repo_file))
        .collect();
    load_layers(&layers)
}

fn load_layers(paths: &[PathBuf]) -> Result<Config> {
    let mut merged = toml::Table::new();

    for path in paths {
        if !path.exists() {
            continue;
        }
        debug!(path = %path.display(), "loading config layer");

        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
        let table: toml::Table = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))?;

        merge_tables(&mut merged, table);
    }

    toml::Value::Table(merged)
        .try_into::<Config>()
        .map_err(|e| Error::Config(format!("invalid configuration: {e}")))
}

/// Merge `overlay` into `base`, recursing into nested tables.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(nested)) => {
                merge_tables(existing, nested);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}
