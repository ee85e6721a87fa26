// src/constants.rs

/// The name of the configuration file, both globally and per project.
pub const CONFIG_FILENAME: &str = "sctl.toml";

/// The directory (under `~/.config`) that holds the global configuration.
pub const GLOBAL_CONFIG_DIR: &str = "sctl";

/// Provenance label for entries loaded from the global configuration.
pub const SOURCE_GLOBAL: &str = "global";

/// Provenance label for entries loaded from the local configuration.
pub const SOURCE_LOCAL: &str = "local";

/// Provenance label for local entries that shadow a global entry of the same name.
pub const SOURCE_LOCAL_OVERRIDE: &str = "local (overrides global)";

/// Port used when a host does not declare one.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Private keys tried (in this order, under `~/.ssh`) after the host's own `key_file`.
pub const DEFAULT_KEY_FILES: &[&str] = &["id_ed25519", "id_rsa", "id_ecdsa"];

/// The trust store used to verify server host keys (under `~/.ssh`).
pub const KNOWN_HOSTS_FILENAME: &str = "known_hosts";

/// Environment variable pointing at the local SSH agent socket.
pub const SSH_AUTH_SOCK_ENV: &str = "SSH_AUTH_SOCK";

/// Upper bound for dialing, handshake and authentication, in milliseconds.
pub const DIAL_TIMEOUT_MS: u32 = 10_000;
