//! # Credential Planning
//!
//! Decides which authentication methods are offered to a server, and in which order:
//!
//! 1. the local SSH agent, when `SSH_AUTH_SOCK` is set and the agent answers;
//! 2. the host's own `key_file`;
//! 3. the conventional keys under `~/.ssh` (`id_ed25519`, `id_rsa`, `id_ecdsa`);
//! 4. the inline password.
//!
//! Keys are only offered when they can be used without a passphrase. Nothing here prompts.
//! All environment access goes through the `AuthProbe` trait so the planning itself is a
//! pure function of the host and the probe's answers.
use crate::models::Host;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt;
use std::path::{Path, PathBuf};

const OPENSSH_MAGIC: &[u8] = b"openssh-key-v1\0";

/// One way of proving identity to a server.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    Agent,
    KeyFile(PathBuf),
    Password(String),
}

impl Credential {
    /// A short, secret-free label for logs and error messages.
    pub fn describe(&self) -> String {
        match self {
            Self::Agent => "agent".to_string(),
            Self::KeyFile(path) => format!("key {}", path.display()),
            Self::Password(_) => "password".to_string(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Environment lookups needed to plan credentials.
pub trait AuthProbe {
    /// The agent socket advertised by the environment, if any.
    fn agent_socket(&self) -> Option<String>;

    /// Tries to reach the agent. `false` means the agent is skipped.
    fn connect_agent(&mut self) -> bool;

    /// Reads a private key file, returning its contents only if it is readable.
    fn read_private_key(&self, path: &Path) -> Option<String>;
}

/// Builds the ordered list of credentials to offer for `host`.
pub fn plan_credentials<P: AuthProbe + ?Sized>(
    host: &Host,
    default_keys: &[PathBuf],
    probe: &mut P,
) -> Vec<Credential> {
    let mut credentials = Vec::new();

    // 1. Agent
    match probe.agent_socket() {
        Some(socket) => {
            if probe.connect_agent() {
                credentials.push(Credential::Agent);
            } else {
                log::debug!("SSH agent at {} is not reachable; skipping.", socket);
            }
        }
        None => log::trace!("No SSH agent advertised."),
    }

    // 2. + 3. Configured key, then the conventional ones.
    let key_candidates = host
        .key_file
        .iter()
        .chain(default_keys.iter().filter(|k| host.key_file.as_ref() != Some(*k)));
    for path in key_candidates {
        if usable_key(path, probe) {
            credentials.push(Credential::KeyFile(path.clone()));
        }
    }

    // 4. Password, last.
    if let Some(password) = &host.password {
        credentials.push(Credential::Password(password.clone()));
    }

    log::debug!("Planned credentials for {}: {:?}", host.address, credentials);
    credentials
}

fn usable_key<P: AuthProbe + ?Sized>(path: &Path, probe: &P) -> bool {
    match probe.read_private_key(path) {
        Some(content) if is_unencrypted_private_key(&content) => true,
        Some(_) => {
            log::debug!(
                "Key {} is passphrase-protected or not a private key; skipping.",
                path.display()
            );
            false
        }
        None => {
            log::trace!("Key {} is not readable; skipping.", path.display());
            false
        }
    }
}

/// Returns `true` for a PEM private key that can be used without a passphrase.
///
/// Handles the OpenSSH container (cipher name `none`), PKCS#8 (`PRIVATE KEY` vs.
/// `ENCRYPTED PRIVATE KEY`) and the legacy PEM formats (`Proc-Type: 4,ENCRYPTED`).
pub fn is_unencrypted_private_key(content: &str) -> bool {
    let mut lines = content.lines().map(str::trim);
    let label = match lines
        .by_ref()
        .find_map(|line| line.strip_prefix("-----BEGIN "))
        .and_then(|rest| rest.strip_suffix("-----"))
    {
        Some(label) => label,
        None => return false,
    };

    if !label.ends_with("PRIVATE KEY") || label.contains("ENCRYPTED") {
        return false;
    }

    let body: Vec<&str> = lines.take_while(|line| !line.starts_with("-----END ")).collect();
    if body.iter().any(|line| line.starts_with("Proc-Type:") && line.contains("ENCRYPTED")) {
        return false;
    }

    if label == "OPENSSH PRIVATE KEY" {
        return openssh_cipher_is_none(&body.concat());
    }

    // PKCS#1, SEC1 and PKCS#8 bodies are a single DER SEQUENCE opening with a version
    // INTEGER. Encapsulated headers (`Key: value`) are not part of the payload.
    let encoded: String = body
        .iter()
        .filter(|line| !line.is_empty() && !line.contains(':'))
        .copied()
        .collect();
    match STANDARD.decode(encoded) {
        Ok(der) => is_der_private_key(&der),
        Err(_) => false,
    }
}

/// Checks the outer DER framing: one SEQUENCE spanning the whole buffer, whose first
/// element is an INTEGER.
fn is_der_private_key(der: &[u8]) -> bool {
    let Some((&tag, rest)) = der.split_first() else {
        return false;
    };
    if tag != 0x30 {
        return false;
    }
    let Some((&first_len, rest)) = rest.split_first() else {
        return false;
    };

    let (len, content) = if first_len < 0x80 {
        (usize::from(first_len), rest)
    } else {
        let width = usize::from(first_len & 0x7f);
        if width == 0 || width > 4 || rest.len() < width {
            return false;
        }
        let (len_bytes, content) = rest.split_at(width);
        let len = len_bytes
            .iter()
            .fold(0usize, |acc, b| (acc << 8) | usize::from(*b));
        (len, content)
    };

    len > 0 && content.len() == len && content.first() == Some(&0x02)
}

fn openssh_cipher_is_none(encoded: &str) -> bool {
    let Ok(blob) = STANDARD.decode(encoded) else {
        return false;
    };
    let Some(rest) = blob.strip_prefix(OPENSSH_MAGIC) else {
        return false;
    };
    let Some((len_bytes, rest)) = rest.split_first_chunk::<4>() else {
        return false;
    };
    let len = u32::from_be_bytes(*len_bytes) as usize;
    rest.get(..len) == Some(b"none".as_slice())
}
