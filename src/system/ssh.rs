//! # SSH Transport
//!
//! The `ssh2`-backed implementation of `Connector` and `RemoteShell`.
//!
//! Connection setup, in order: plan credentials (possibly connecting to the local agent),
//! load the known-hosts store, dial with a bounded timeout, handshake, verify the server
//! key, then offer every planned credential until one is accepted. If anything fails after
//! the agent was reached, the agent connection is released before the error is returned.
use crate::{
    constants::{DIAL_TIMEOUT_MS, SSH_AUTH_SOCK_ENV},
    core::paths,
    models::Host,
    system::{
        auth::{self, AuthProbe, Credential},
        remote::{Connector, RemoteError, RemoteShell, known_hosts_remediation},
    },
};
use scopeguard::ScopeGuard;
use ssh2::{Agent, CheckResult, KnownHostFileKind, Session};
use std::{
    fs,
    io::{self, ErrorKind, Read, Write},
    net::{SocketAddr, TcpStream, ToSocketAddrs},
    path::{Path, PathBuf},
    time::Duration,
};

/// Opens real SSH sessions.
#[derive(Debug, Clone)]
pub struct SshConnector {
    known_hosts: Option<PathBuf>,
    default_keys: Vec<PathBuf>,
    timeout_ms: u32,
}

impl SshConnector {
    /// A connector using `~/.ssh/known_hosts` and the conventional default keys.
    pub fn from_env() -> Self {
        Self {
            known_hosts: paths::get_known_hosts_path().ok(),
            default_keys: paths::get_default_key_paths(),
            timeout_ms: DIAL_TIMEOUT_MS,
        }
    }
}

impl Connector for SshConnector {
    fn connect(&self, host: &Host) -> Result<Box<dyn RemoteShell>, RemoteError> {
        let session = SshSession::open(host, self)?;
        Ok(Box::new(session))
    }
}

/// Environment probe backed by a not-yet-connected libssh2 session.
struct SessionProbe<'a> {
    session: &'a Session,
    agent: Option<Agent>,
}

impl AuthProbe for SessionProbe<'_> {
    fn agent_socket(&self) -> Option<String> {
        std::env::var(SSH_AUTH_SOCK_ENV)
            .ok()
            .filter(|s| !s.is_empty())
    }

    fn connect_agent(&mut self) -> bool {
        let attempt = self.session.agent().and_then(|mut agent| {
            agent.connect()?;
            agent.list_identities()?;
            Ok(agent)
        });
        match attempt {
            Ok(agent) => {
                self.agent = Some(agent);
                true
            }
            Err(e) => {
                log::debug!("Could not use SSH agent: {}", e);
                false
            }
        }
    }

    fn read_private_key(&self, path: &Path) -> Option<String> {
        fs::read_to_string(path).ok()
    }
}

/// An authenticated libssh2 session plus the agent connection used to authenticate it.
pub struct SshSession {
    session: Session,
    agent: Option<Agent>,
    address: String,
    closed: bool,
}

impl std::fmt::Debug for SshSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshSession")
            .field("address", &self.address)
            .field("agent", &self.agent.is_some())
            .field("closed", &self.closed)
            .finish()
    }
}

impl SshSession {
    fn open(host: &Host, connector: &SshConnector) -> Result<Self, RemoteError> {
        if !host.is_usable() {
            return Err(RemoteError::MissingAddress);
        }

        let mut session = Session::new()?;

        // --- 1. Credentials ---
        let mut probe = SessionProbe {
            session: &session,
            agent: None,
        };
        let credentials = auth::plan_credentials(host, &connector.default_keys, &mut probe);
        let agent = scopeguard::guard(probe.agent.take(), |agent| {
            if let Some(mut agent) = agent {
                if let Err(e) = agent.disconnect() {
                    log::debug!("Failed to disconnect SSH agent: {}", e);
                }
            }
        });
        if credentials.is_empty() {
            return Err(RemoteError::NoAuthMethods);
        }

        // --- 2. Trust store ---
        let remediation = known_hosts_remediation(&host.address, host.port);
        let known_hosts_path = connector.known_hosts.clone().unwrap_or_default();
        let mut known_hosts = session.known_hosts()?;
        known_hosts
            .read_file(&known_hosts_path, KnownHostFileKind::OpenSSH)
            .map_err(|e| RemoteError::KnownHostsUnavailable {
                path: known_hosts_path.clone(),
                remediation: remediation.clone(),
                source: e,
            })?;

        // --- 3. Dial and handshake ---
        let tcp = dial(&host.address, host.port, connector.timeout_ms)?;
        session.set_tcp_stream(tcp);
        session.set_timeout(connector.timeout_ms);
        session.handshake()?;

        let (key, _) = session.host_key().ok_or_else(|| RemoteError::HostKeyUnknown {
            address: host.address.clone(),
            remediation: remediation.clone(),
        })?;
        match known_hosts.check_port(&host.address, host.port, key) {
            CheckResult::Match => log::debug!("Host key for {} verified.", host.address),
            CheckResult::Mismatch => {
                return Err(RemoteError::HostKeyMismatch {
                    address: host.address.clone(),
                });
            }
            CheckResult::NotFound | CheckResult::Failure => {
                return Err(RemoteError::HostKeyUnknown {
                    address: host.address.clone(),
                    remediation,
                });
            }
        }

        // --- 4. Authentication ---
        authenticate(&session, (*agent).as_ref(), &host.user, &credentials)?;

        // Steps may legitimately run longer than the dial timeout.
        session.set_timeout(0);

        Ok(Self {
            session,
            agent: ScopeGuard::into_inner(agent),
            address: host.address.clone(),
            closed: false,
        })
    }
}

fn dial(address: &str, port: u16, timeout_ms: u32) -> Result<TcpStream, RemoteError> {
    let target = format!("{}:{}", address, port);
    let candidates: Vec<SocketAddr> = (address, port)
        .to_socket_addrs()
        .map_err(|e| RemoteError::Dial {
            address: target.clone(),
            source: e,
        })?
        .collect();
    if candidates.is_empty() {
        return Err(RemoteError::Resolve { address: target });
    }

    let timeout = Duration::from_millis(u64::from(timeout_ms));
    let mut last_error = None;
    for candidate in candidates {
        log::debug!("Dialing {} ({})", target, candidate);
        match TcpStream::connect_timeout(&candidate, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_error = Some(e),
        }
    }
    Err(RemoteError::Dial {
        address: target,
        source: last_error.unwrap_or_else(|| io::Error::from(ErrorKind::NotConnected)),
    })
}

/// Offers each credential in order until the server accepts one.
fn authenticate(
    session: &Session,
    agent: Option<&Agent>,
    user: &str,
    credentials: &[Credential],
) -> Result<(), RemoteError> {
    for credential in credentials {
        let attempt = match credential {
            Credential::Agent => match agent {
                Some(agent) => agent_userauth(agent, user),
                None => continue,
            },
            Credential::KeyFile(path) => session.userauth_pubkey_file(user, None, path, None),
            Credential::Password(password) => session.userauth_password(user, password),
        };
        match attempt {
            Ok(()) if session.authenticated() => {
                log::debug!("Authenticated as {} using {}.", user, credential.describe());
                return Ok(());
            }
            Ok(()) => log::debug!("{} was not accepted.", credential.describe()),
            Err(e) => log::debug!("{} was rejected: {}", credential.describe(), e),
        }
    }

    Err(RemoteError::AuthenticationFailed {
        user: user.to_string(),
        tried: credentials
            .iter()
            .map(Credential::describe)
            .collect::<Vec<_>>()
            .join(", "),
    })
}

fn agent_userauth(agent: &Agent, user: &str) -> Result<(), ssh2::Error> {
    let identities = agent.identities()?;
    let mut last_error = None;
    for identity in &identities {
        match agent.userauth(user, identity) {
            Ok(()) => return Ok(()),
            Err(e) => last_error = Some(e),
        }
    }
    match last_error {
        Some(e) => Err(e),
        None => Err(ssh2::Error::new(
            ssh2::ErrorCode::Session(-18), // LIBSSH2_ERROR_AUTHENTICATION_FAILED
            "agent holds no identities",
        )),
    }
}

impl RemoteShell for SshSession {
    fn run(&mut self, command: &str) -> Result<(), RemoteError> {
        log::debug!("[{}] exec: {}", self.address, command);
        let mut channel = self.session.channel_session()?;
        channel.exec(command)?;

        // Non-blocking so neither stream can stall the other.
        self.session.set_blocking(false);
        let pumped = pump_output(&mut channel);
        self.session.set_blocking(true);
        pumped?;

        channel.wait_close()?;
        if let Some(signal) = channel.exit_signal()?.exit_signal {
            return Err(RemoteError::Signal { signal });
        }
        match channel.exit_status()? {
            0 => Ok(()),
            status => Err(RemoteError::NonZeroExit { status }),
        }
    }

    fn close(&mut self) -> Result<(), RemoteError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let agent = self.agent.take();
        let session = &self.session;
        let result = release_both(
            || match agent {
                Some(mut agent) => agent.disconnect(),
                None => Ok(()),
            },
            || session.disconnect(None, "sctl: done", None),
        );
        log::debug!("Closed session to {}.", self.address);
        result
    }
}

impl Drop for SshSession {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::debug!("Error while closing session to {}: {}", self.address, e);
        }
    }
}

/// Runs both releases, agent first, even when the first one fails. The transport error
/// is reported ahead of the agent error.
fn release_both<A, S, E>(release_agent: A, release_session: S) -> Result<(), RemoteError>
where
    A: FnOnce() -> Result<(), E>,
    S: FnOnce() -> Result<(), E>,
    E: Into<RemoteError>,
{
    let agent_result = release_agent();
    let session_result = release_session();
    session_result.map_err(Into::into)?;
    agent_result.map_err(Into::into)?;
    Ok(())
}

/// Copies the remote stdout/stderr to the local ones until the channel reaches EOF.
fn pump_output(channel: &mut ssh2::Channel) -> Result<(), RemoteError> {
    let mut buf = [0u8; 8192];
    let stdout = io::stdout();
    let stderr = io::stderr();

    loop {
        let mut progressed = false;

        if let Some(n) = read_chunk(&mut *channel, &mut buf)? {
            let mut out = stdout.lock();
            out.write_all(buf.get(..n).unwrap_or_default())?;
            out.flush()?;
            progressed = true;
        }

        let mut err_stream = channel.stderr();
        if let Some(n) = read_chunk(&mut err_stream, &mut buf)? {
            let mut err = stderr.lock();
            err.write_all(buf.get(..n).unwrap_or_default())?;
            err.flush()?;
            progressed = true;
        }

        if !progressed {
            if channel.eof() {
                return Ok(());
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    }
}

/// `Some(n)` when `n > 0` bytes were read, `None` when nothing is available right now.
fn read_chunk<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<Option<usize>, RemoteError> {
    match reader.read(buf) {
        Ok(0) => Ok(None),
        Ok(n) => Ok(Some(n)),
        Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(None),
        Err(e) => Err(RemoteError::Io(e)),
    }
}
