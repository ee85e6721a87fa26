//! # Config Loader
//!
//! This module provides the `ConfigLoader` struct, which resolves the layered `sctl.toml`
//! configuration into a single `ResolvedConfig`.
//!
//! Two modes exist:
//!
//! 1. **Layered** (default): the global file (`~/.config/sctl/sctl.toml`) is loaded first,
//!    then the local file (`./sctl.toml` or the `--file` override) is merged over it entry
//!    by entry. Every host and task remembers which layer it came from.
//! 2. **Explicit** (`--config <path>`): only that file is loaded and every entry is
//!    attributed to it. No layering takes place.
//!
//! Defaults (port, user) are applied to each source as it is loaded, never to the merged
//! result, so an entry coming from a higher layer is taken exactly as that layer produced it.
use crate::{
    constants::DEFAULT_SSH_PORT,
    core::paths::{self, PathError},
    models::{ConfigFile, Host, HostEntry, ResolvedConfig, Source, Task},
};
use std::{
    collections::BTreeMap,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("config file {path} not found")]
    NotFound { path: String },
    #[error("no configuration found (checked {local} and {global})")]
    NoConfiguration { local: String, global: String },
    #[error(transparent)]
    Path(#[from] PathError),
}

/// Values used to fill in fields a host leaves out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostDefaults {
    pub port: u16,
    pub user: String,
}

impl HostDefaults {
    /// Defaults taken from the running process: port 22 and the current user.
    pub fn from_env() -> Self {
        let user = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_default();
        Self {
            port: DEFAULT_SSH_PORT,
            user,
        }
    }
}

/// Which files to read, and how to combine them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadPlan {
    /// Load this single file and nothing else.
    Explicit(PathBuf),
    Layered {
        /// `None` when the home directory is unknown; the global layer is then skipped.
        global: Option<PathBuf>,
        local: PathBuf,
        /// The local path was requested explicitly, so its absence is an error.
        local_required: bool,
    },
}

/// One configuration source with its defaults applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Layer {
    pub hosts: BTreeMap<String, Host>,
    pub tasks: BTreeMap<String, Task>,
}

/// Resolves configuration sources into a `ResolvedConfig`.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    plan: LoadPlan,
    defaults: HostDefaults,
}

impl ConfigLoader {
    pub fn new(plan: LoadPlan, defaults: HostDefaults) -> Self {
        Self { plan, defaults }
    }

    /// Builds the loader from the global `--config` and `--file` flags.
    ///
    /// `--config` wins over `--file`: an explicit configuration bypasses layering entirely.
    pub fn from_cli(config: Option<PathBuf>, file: Option<PathBuf>) -> Self {
        let plan = match config {
            Some(path) => {
                if let Some(ignored) = &file {
                    log::debug!(
                        "--config given; ignoring --file {}",
                        ignored.display()
                    );
                }
                LoadPlan::Explicit(path)
            }
            None => {
                let global = match paths::get_global_config_path() {
                    Ok(path) => Some(path),
                    Err(e) => {
                        log::debug!("Skipping global configuration: {}", e);
                        None
                    }
                };
                let local_required = file.is_some();
                LoadPlan::Layered {
                    global,
                    local: file.unwrap_or_else(paths::get_local_config_path),
                    local_required,
                }
            }
        };
        Self::new(plan, HostDefaults::from_env())
    }

    pub fn plan(&self) -> &LoadPlan {
        &self.plan
    }

    /// Loads and merges every source of the plan.
    pub fn resolve(&self) -> Result<ResolvedConfig, ConfigError> {
        match &self.plan {
            LoadPlan::Explicit(path) => {
                log::debug!("Loading explicit configuration {}", path.display());
                let file = read_source(path)?.ok_or_else(|| ConfigError::NotFound {
                    path: path.display().to_string(),
                })?;
                let layer = apply_defaults(file, &self.defaults);
                Ok(merge(
                    ResolvedConfig::default(),
                    layer,
                    Source::File(path.clone()),
                ))
            }
            LoadPlan::Layered {
                global,
                local,
                local_required,
            } => {
                let mut resolved = ResolvedConfig::default();

                // 1. Global layer: optional, but a corrupt file is still an error.
                if let Some(global_path) = global {
                    match read_source(global_path)? {
                        Some(file) => {
                            log::debug!("Loaded global configuration {}", global_path.display());
                            let layer = apply_defaults(file, &self.defaults);
                            resolved = merge(resolved, layer, Source::Global);
                        }
                        None => log::debug!(
                            "No global configuration at {}",
                            global_path.display()
                        ),
                    }
                }

                // 2. Local layer, merged entry by entry over the global one.
                match read_source(local)? {
                    Some(file) => {
                        log::debug!("Loaded local configuration {}", local.display());
                        let layer = apply_defaults(file, &self.defaults);
                        resolved = merge(resolved, layer, Source::Local);
                    }
                    None if *local_required => {
                        return Err(ConfigError::NotFound {
                            path: local.display().to_string(),
                        });
                    }
                    None => log::debug!("No local configuration at {}", local.display()),
                }

                if resolved.is_empty() {
                    return Err(ConfigError::NoConfiguration {
                        local: local.display().to_string(),
                        global: global
                            .as_ref()
                            .map(|p| p.display().to_string())
                            .unwrap_or_else(|| "~/.config/sctl/sctl.toml".to_string()),
                    });
                }
                Ok(resolved)
            }
        }
    }
}

/// Reads and parses one configuration file.
///
/// Returns `Ok(None)` only when the file does not exist. Any other read failure, and any
/// parse failure, is an error.
pub fn read_source(path: &Path) -> Result<Option<ConfigFile>, ConfigError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(ConfigError::Read {
                path: path.display().to_string(),
                source: e,
            });
        }
    };

    toml::from_str(&content)
        .map(Some)
        .map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            source: e,
        })
}

/// Turns a parsed file into a `Layer`, filling in port and user where they are missing.
pub fn apply_defaults(file: ConfigFile, defaults: &HostDefaults) -> Layer {
    let hosts = file
        .hosts
        .into_iter()
        .map(|(name, entry)| (name, resolve_host(entry, defaults)))
        .collect();
    Layer {
        hosts,
        tasks: file.tasks,
    }
}

fn resolve_host(entry: HostEntry, defaults: &HostDefaults) -> Host {
    let HostEntry {
        address,
        port,
        user,
        key_file,
        password,
    } = entry;

    Host {
        address,
        port: port.filter(|p| *p != 0).unwrap_or(defaults.port),
        user: user
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| defaults.user.clone()),
        key_file: key_file
            .filter(|k| !k.is_empty())
            .map(|k| paths::expand_user_path(&k)),
        password: password.filter(|p| !p.is_empty()),
    }
}

/// Merges `overlay` over `base`. Entries are replaced whole; entries the overlay does not
/// define are kept from `base`.
///
/// A local entry replacing a global one is labelled `local (overrides global)`.
pub fn merge(mut base: ResolvedConfig, overlay: Layer, label: Source) -> ResolvedConfig {
    for (name, host) in overlay.hosts {
        let source = provenance(base.host_sources.get(&name), &label);
        base.host_sources.insert(name.clone(), source);
        base.hosts.insert(name, host);
    }
    for (name, task) in overlay.tasks {
        let source = provenance(base.task_sources.get(&name), &label);
        base.task_sources.insert(name.clone(), source);
        base.tasks.insert(name, task);
    }
    base
}

fn provenance(existing: Option<&Source>, incoming: &Source) -> Source {
    match (existing, incoming) {
        (Some(Source::Global), Source::Local) => Source::LocalOverridesGlobal,
        _ => incoming.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const GLOBAL: &str = r#"
[hosts.web]
address = "web.global.example"
port = 2200
user = "deploy"
key_file = "/keys/global"

[hosts.db]
address = "db.example"

[tasks.uptime]
host = "web"
steps = ["uptime"]
"#;

    const LOCAL: &str = r#"
[hosts.web]
address = "web.local.example"

[tasks.deploy]
hosts = ["web", "db"]
workdir = "/srv/app"
before = ["uptime"]
steps = ["git pull", "systemctl restart app"]
"#;

    fn defaults() -> HostDefaults {
        HostDefaults {
            port: DEFAULT_SSH_PORT,
            user: "tester".to_string(),
        }
    }

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn layered(global: Option<PathBuf>, local: PathBuf, local_required: bool) -> ConfigLoader {
        ConfigLoader::new(
            LoadPlan::Layered {
                global,
                local,
                local_required,
            },
            defaults(),
        )
    }

    #[test]
    fn test_explicit_file_with_defaults() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "config.toml",
            r#"
[hosts.server1]
address = "example.com"
port = 2222
user = "admin"
key_file = "/path/to/key"

[hosts.server2]
address = "other.com"

[tasks.deploy]
host = "server1"
steps = ["echo hello", "echo world"]
"#,
        );

        let loader = ConfigLoader::new(LoadPlan::Explicit(path.clone()), defaults());
        let config = loader.resolve().unwrap();

        assert_eq!(config.hosts.len(), 2);
        let server1 = &config.hosts["server1"];
        assert_eq!(server1.address, "example.com");
        assert_eq!(server1.port, 2222);
        assert_eq!(server1.user, "admin");
        assert_eq!(server1.key_file, Some(PathBuf::from("/path/to/key")));

        let server2 = &config.hosts["server2"];
        assert_eq!(server2.port, 22);
        assert_eq!(server2.user, "tester");

        let deploy = &config.tasks["deploy"];
        assert_eq!(deploy.host.as_deref(), Some("server1"));
        assert_eq!(deploy.steps.len(), 2);

        assert_eq!(config.host_sources["server1"], Source::File(path.clone()));
        assert_eq!(config.task_sources["deploy"], Source::File(path));
    }

    #[test]
    fn test_defaults_use_process_user() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "config.toml", "[hosts.bare]\naddress = \"bare.example\"\n");

        let loader = ConfigLoader::new(LoadPlan::Explicit(path), HostDefaults::from_env());
        let config = loader.resolve().unwrap();

        let bare = &config.hosts["bare"];
        assert_eq!(bare.port, 22);
        let expected_user = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_default();
        assert_eq!(bare.user, expected_user);
    }

    #[test]
    fn test_zero_port_and_empty_user_are_defaulted() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "config.toml",
            "[hosts.h]\naddress = \"h.example\"\nport = 0\nuser = \"\"\n",
        );
        let config = ConfigLoader::new(LoadPlan::Explicit(path), defaults())
            .resolve()
            .unwrap();
        assert_eq!(config.hosts["h"].port, 22);
        assert_eq!(config.hosts["h"].user, "tester");
    }

    #[test]
    fn test_loading_twice_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "config.toml", GLOBAL);
        let loader = ConfigLoader::new(LoadPlan::Explicit(path), defaults());
        assert_eq!(loader.resolve().unwrap(), loader.resolve().unwrap());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let loader = ConfigLoader::new(
            LoadPlan::Explicit(PathBuf::from("/nonexistent/path/config.toml")),
            defaults(),
        );
        let err = loader.resolve().unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn test_invalid_toml_is_reported_with_path() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "config.toml", "invalid toml [[[");
        let err = ConfigLoader::new(LoadPlan::Explicit(path.clone()), defaults())
            .resolve()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(
            err.to_string()
                .starts_with(&format!("failed to parse {}", path.display()))
        );
    }

    #[test]
    fn test_local_overrides_global_entry_by_entry() {
        let dir = TempDir::new().unwrap();
        let global = write(&dir, "global.toml", GLOBAL);
        let local = write(&dir, "sctl.toml", LOCAL);

        let config = layered(Some(global), local, false).resolve().unwrap();

        // Shadowed entry: the local definition wins whole, no field merging.
        let web = &config.hosts["web"];
        assert_eq!(web.address, "web.local.example");
        assert_eq!(web.port, 22);
        assert_eq!(web.user, "tester");
        assert_eq!(web.key_file, None);
        assert_eq!(config.host_sources["web"], Source::LocalOverridesGlobal);

        // Global-only entries still resolve.
        assert_eq!(config.hosts["db"].address, "db.example");
        assert_eq!(config.host_sources["db"], Source::Global);
        assert_eq!(config.task_sources["uptime"], Source::Global);

        // Local-only entries.
        assert_eq!(config.task_sources["deploy"], Source::Local);
        assert_eq!(config.tasks["deploy"].before, vec!["uptime"]);
    }

    #[test]
    fn test_missing_global_is_ignored() {
        let dir = TempDir::new().unwrap();
        let local = write(&dir, "sctl.toml", LOCAL);
        let config = layered(Some(dir.path().join("absent.toml")), local, false)
            .resolve()
            .unwrap();
        assert_eq!(config.host_sources["web"], Source::Local);
    }

    #[test]
    fn test_missing_default_local_is_ignored() {
        let dir = TempDir::new().unwrap();
        let global = write(&dir, "global.toml", GLOBAL);
        let config = layered(Some(global), dir.path().join("sctl.toml"), false)
            .resolve()
            .unwrap();
        assert_eq!(config.hosts.len(), 2);
        assert!(config.host_sources.values().all(|s| *s == Source::Global));
    }

    #[test]
    fn test_missing_requested_local_is_an_error() {
        let dir = TempDir::new().unwrap();
        let global = write(&dir, "global.toml", GLOBAL);
        let err = layered(Some(global), dir.path().join("custom.toml"), true)
            .resolve()
            .unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn test_corrupt_global_is_not_ignored() {
        let dir = TempDir::new().unwrap();
        let global = write(&dir, "global.toml", "[hosts.web\naddress = ");
        let local = write(&dir, "sctl.toml", LOCAL);
        let err = layered(Some(global), local, false).resolve().unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_no_configuration_names_both_locations() {
        let dir = TempDir::new().unwrap();
        let global = dir.path().join("global.toml");
        let local = dir.path().join("sctl.toml");
        let err = layered(Some(global.clone()), local.clone(), false)
            .resolve()
            .unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("no configuration found"));
        assert!(message.contains(&global.display().to_string()));
        assert!(message.contains(&local.display().to_string()));
    }

    #[test]
    fn test_explicit_mode_skips_local_layer() {
        let dir = TempDir::new().unwrap();
        write(&dir, "sctl.toml", LOCAL);
        let explicit = write(&dir, "path.toml", "[hosts.only]\naddress = \"only.example\"\n");

        let config = ConfigLoader::new(LoadPlan::Explicit(explicit.clone()), defaults())
            .resolve()
            .unwrap();

        assert_eq!(config.hosts.keys().collect::<Vec<_>>(), vec!["only"]);
        assert!(config.tasks.is_empty());
        assert_eq!(config.host_sources["only"], Source::File(explicit));
    }

    #[test]
    fn test_from_cli_prefers_explicit_config() {
        let loader = ConfigLoader::from_cli(
            Some(PathBuf::from("path.toml")),
            Some(PathBuf::from("other.toml")),
        );
        assert_eq!(
            loader.plan(),
            &LoadPlan::Explicit(PathBuf::from("path.toml"))
        );

        let loader = ConfigLoader::from_cli(None, Some(PathBuf::from("other.toml")));
        match loader.plan() {
            LoadPlan::Layered {
                local,
                local_required,
                ..
            } => {
                assert_eq!(local, &PathBuf::from("other.toml"));
                assert!(*local_required);
            }
            other => panic!("unexpected plan: {:?}", other),
        }
    }

    #[test]
    fn test_merge_keeps_unrelated_entries() {
        let mut base_layer = Layer::default();
        base_layer.tasks.insert(
            "a".to_string(),
            Task {
                steps: vec!["true".to_string()],
                ..Default::default()
            },
        );
        let base = merge(ResolvedConfig::default(), base_layer, Source::Global);

        let mut overlay = Layer::default();
        overlay.tasks.insert(
            "b".to_string(),
            Task {
                steps: vec!["false".to_string()],
                ..Default::default()
            },
        );
        let merged = merge(base, overlay, Source::Local);

        assert_eq!(merged.tasks.len(), 2);
        assert_eq!(merged.task_sources["a"], Source::Global);
        assert_eq!(merged.task_sources["b"], Source::Local);
    }
}
