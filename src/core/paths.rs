// src/core/paths.rs

use crate::constants::{
    CONFIG_FILENAME, DEFAULT_KEY_FILES, GLOBAL_CONFIG_DIR, KNOWN_HOSTS_FILENAME,
};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PathError {
    #[error("Could not determine the home directory.")]
    HomeDirNotFound,
}

fn home_dir() -> Result<PathBuf, PathError> {
    dirs::home_dir().ok_or(PathError::HomeDirNotFound)
}

/// Returns the directory holding the global configuration (`~/.config/sctl`).
pub fn get_global_config_dir() -> Result<PathBuf, PathError> {
    home_dir().map(|home| home.join(".config").join(GLOBAL_CONFIG_DIR))
}

/// Returns the path to the global `sctl.toml` file.
pub fn get_global_config_path() -> Result<PathBuf, PathError> {
    get_global_config_dir().map(|dir| dir.join(CONFIG_FILENAME))
}

/// Returns the default, project-scoped configuration path (`./sctl.toml`).
pub fn get_local_config_path() -> PathBuf {
    PathBuf::from(CONFIG_FILENAME)
}

/// Returns the SSH directory of the current user (`~/.ssh`).
pub fn get_ssh_dir() -> Result<PathBuf, PathError> {
    home_dir().map(|home| home.join(".ssh"))
}

/// Returns the path of the user's known-hosts trust store.
pub fn get_known_hosts_path() -> Result<PathBuf, PathError> {
    get_ssh_dir().map(|dir| dir.join(KNOWN_HOSTS_FILENAME))
}

/// Returns the conventional private key locations, in the order they are tried.
/// Without a home directory there are no default keys.
pub fn get_default_key_paths() -> Vec<PathBuf> {
    match get_ssh_dir() {
        Ok(dir) => DEFAULT_KEY_FILES.iter().map(|name| dir.join(name)).collect(),
        Err(_) => Vec::new(),
    }
}

/// Expands `~` and environment variables in a user-supplied path.
///
/// An undefined variable is not an error: only the home directory is expanded in
/// that case, and the rest of the path is kept verbatim.
pub fn expand_user_path(raw: &str) -> PathBuf {
    let expanded = match shellexpand::full(raw) {
        Ok(expanded) => expanded.into_owned(),
        Err(e) => {
            log::debug!("Could not fully expand '{}': {}. Expanding '~' only.", raw, e);
            shellexpand::tilde(raw).into_owned()
        }
    };
    PathBuf::from(expanded)
}
