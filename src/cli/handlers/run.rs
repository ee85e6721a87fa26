// src/cli/handlers/run.rs

use anyhow::Result;

use super::commons;
use crate::{
    cli::{GlobalArgs, args::RunArgs},
    core::task_executor::TaskExecutor,
    system::ssh::SshConnector,
};

/// The main handler for the `run` command.
pub fn handle(args: &RunArgs, global: &GlobalArgs) -> Result<()> {
    let config = commons::load_config(global)?;
    let connector = SshConnector::from_env();

    let summary = TaskExecutor::new(&config, &connector).run(&args.task, &args.hosts)?;

    if summary.hosts > 1 {
        commons::print_success(&format!(t!("run.completed_hosts"), count = summary.hosts));
    } else {
        commons::print_success(t!("run.completed"));
    }
    Ok(())
}
