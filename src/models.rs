// src/models.rs

use crate::constants::{SOURCE_GLOBAL, SOURCE_LOCAL, SOURCE_LOCAL_OVERRIDE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

// --- `sctl.toml` MODELS (What is read from the configuration file) ---

/// Represents the deserialized structure of one `sctl.toml` file.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    #[serde(default)]
    pub hosts: BTreeMap<String, HostEntry>,
    #[serde(default)]
    pub tasks: BTreeMap<String, Task>,
}

/// A host exactly as written in a configuration file, before defaults are applied.
#[derive(Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
pub struct HostEntry {
    #[serde(default)]
    pub address: String,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub key_file: Option<String>,
    pub password: Option<String>,
}

impl fmt::Debug for HostEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostEntry")
            .field("address", &self.address)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("key_file", &self.key_file)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// A named sequence of shell steps run on one or more hosts.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Task {
    /// A single target host. Mutually exclusive with `hosts`.
    pub host: Option<String>,
    /// Several target hosts, visited in order.
    #[serde(default)]
    pub hosts: Vec<String>,
    /// Remote directory every step runs in.
    pub workdir: Option<String>,
    #[serde(default)]
    pub steps: Vec<String>,
    /// Tasks run before this one, each on its own hosts.
    #[serde(default)]
    pub before: Vec<String>,
    /// Tasks run after this one succeeded on every host.
    #[serde(default)]
    pub after: Vec<String>,
}

impl Task {
    /// The single-host field, treating an empty string as absent.
    pub fn single_host(&self) -> Option<&str> {
        self.host.as_deref().filter(|h| !h.is_empty())
    }

    /// Returns the hosts this task targets: the `hosts` list when it is non-empty,
    /// otherwise the single `host` field, otherwise nothing.
    pub fn target_hosts(&self) -> Vec<String> {
        if !self.hosts.is_empty() {
            return self.hosts.clone();
        }
        self.single_host()
            .map(|h| vec![h.to_string()])
            .unwrap_or_default()
    }

    /// Builds the command actually sent for `step`, honoring `workdir`.
    pub fn command_for(&self, step: &str) -> String {
        match self.workdir.as_deref().filter(|w| !w.is_empty()) {
            Some(dir) => format!("cd {} && {}", dir, step),
            None => step.to_string(),
        }
    }
}

// --- RESOLVED MODELS (What the engine works with) ---

/// A host with every default applied. Immutable for the rest of the run.
#[derive(Clone, PartialEq, Eq)]
pub struct Host {
    pub address: String,
    pub port: u16,
    pub user: String,
    pub key_file: Option<PathBuf>,
    pub password: Option<String>,
}

impl Host {
    /// A host without an address cannot be dialed.
    pub fn is_usable(&self) -> bool {
        !self.address.trim().is_empty()
    }
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host")
            .field("address", &self.address)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("key_file", &self.key_file)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Where a host or task definition came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Global,
    Local,
    /// A local entry that shadows a global entry of the same name.
    LocalOverridesGlobal,
    /// An explicit `--config` file; layering was skipped.
    File(PathBuf),
}

impl Source {
    pub fn is_override(&self) -> bool {
        matches!(self, Self::LocalOverridesGlobal)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => f.write_str(SOURCE_GLOBAL),
            Self::Local => f.write_str(SOURCE_LOCAL),
            Self::LocalOverridesGlobal => f.write_str(SOURCE_LOCAL_OVERRIDE),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// The merged view of every loaded configuration source, with provenance per entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub hosts: BTreeMap<String, Host>,
    pub tasks: BTreeMap<String, Task>,
    pub host_sources: BTreeMap<String, Source>,
    pub task_sources: BTreeMap<String, Source>,
}

impl ResolvedConfig {
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty() && self.tasks.is_empty()
    }
}
