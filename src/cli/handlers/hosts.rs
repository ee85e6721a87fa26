// src/cli/handlers/hosts.rs

use anyhow::Result;
use colored::*;

use super::commons;
use crate::{cli::GlobalArgs, models::Host};

/// The main handler for the `hosts` command.
pub fn handle(global: &GlobalArgs) -> Result<()> {
    let config = commons::load_config(global)?;

    if config.hosts.is_empty() {
        println!("{}", t!("hosts.info.empty").dimmed());
        return Ok(());
    }

    for (name, host) in &config.hosts {
        println!(
            "  {} {} -> {}  {}",
            "[H]".cyan(),
            name.bold(),
            describe_host(host),
            commons::format_source(config.host_sources.get(name))
        );
    }
    Ok(())
}

/// `user@address:port`
pub fn describe_host(host: &Host) -> String {
    format!("{}@{}:{}", host.user, host.address, host.port)
}
