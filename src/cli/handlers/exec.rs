// src/cli/handlers/exec.rs

use anyhow::Result;

use super::commons;
use crate::{
    cli::{GlobalArgs, args::ExecArgs},
    core::task_executor::TaskExecutor,
    system::ssh::SshConnector,
};

/// The main handler for the `exec` command: one ad-hoc command on one host.
pub fn handle(args: &ExecArgs, global: &GlobalArgs) -> Result<()> {
    let config = commons::load_config(global)?;
    let connector = SshConnector::from_env();
    TaskExecutor::new(&config, &connector).exec(&args.host, &args.command_line())?;
    Ok(())
}
