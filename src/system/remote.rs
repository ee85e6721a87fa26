// src/system/remote.rs

use crate::models::Host;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("host has no address configured")]
    MissingAddress,
    #[error("no authentication methods available")]
    NoAuthMethods,
    #[error("failed to load known_hosts from {path}: {source} ({remediation})")]
    KnownHostsUnavailable {
        path: PathBuf,
        remediation: String,
        #[source]
        source: ssh2::Error,
    },
    #[error("host key for {address} not found in known_hosts ({remediation})")]
    HostKeyUnknown {
        address: String,
        remediation: String,
    },
    #[error(
        "host key for {address} does not match known_hosts; refusing to connect (remove the stale entry with: ssh-keygen -R {address})"
    )]
    HostKeyMismatch { address: String },
    #[error("could not resolve {address}")]
    Resolve { address: String },
    #[error("failed to connect to {address}: {source}")]
    Dial {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("authentication failed for {user} (tried: {tried})")]
    AuthenticationFailed { user: String, tried: String },
    #[error("command exited with status {status}")]
    NonZeroExit { status: i32 },
    #[error("command terminated by signal {signal}")]
    Signal { signal: String },
    #[error("ssh error: {0}")]
    Ssh(#[from] ssh2::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The hint shown when a host key is missing from the trust store.
pub fn known_hosts_remediation(address: &str, port: u16) -> String {
    if port == crate::constants::DEFAULT_SSH_PORT {
        format!("add host with: ssh-keyscan -H {} >> ~/.ssh/known_hosts", address)
    } else {
        format!(
            "add host with: ssh-keyscan -p {} -H {} >> ~/.ssh/known_hosts",
            port, address
        )
    }
}

/// A live, authenticated connection to one host.
pub trait RemoteShell {
    /// Runs one command on its own channel, streaming its output to the local
    /// stdout/stderr. A non-zero exit is an error.
    fn run(&mut self, command: &str) -> Result<(), RemoteError>;

    /// Releases the connection and anything opened to authenticate it.
    /// Calling it more than once is a no-op.
    fn close(&mut self) -> Result<(), RemoteError>;
}

/// Opens `RemoteShell`s. The execution engine only talks to hosts through this seam.
pub trait Connector {
    fn connect(&self, host: &Host) -> Result<Box<dyn RemoteShell>, RemoteError>;
}
