//! # System Interaction Layer
//!
//! This module provides the boundary between the execution engine and remote hosts.
//!
//! ## Modules
//!
//! - **`remote`**: The `Connector`/`RemoteShell` traits the engine is written against, and
//!   the `RemoteError` type shared by every transport.
//! - **`auth`**: Pure credential planning (agent, key files, password) over an
//!   environment probe.
//! - **`ssh`**: The `ssh2` implementation: trust-store verification, bounded dialing,
//!   authentication, and per-command exec channels streamed to the local terminal.

pub mod auth;
pub mod remote;
pub mod ssh;
