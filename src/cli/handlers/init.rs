// src/cli/handlers/init.rs

use anyhow::{Context, Result};
use dialoguer::{Confirm, theme::ColorfulTheme};
use std::{
    fs,
    io::IsTerminal,
    path::Path,
};

use super::commons;
use crate::{cli::args::InitArgs, core::paths};

const GLOBAL_TEMPLATE: &str = r#"# sctl global configuration
# Hosts defined here are available from anywhere on your system.
# Location: ~/.config/sctl/sctl.toml

# ============================================================================
# HOSTS
# ============================================================================
# Define your remote hosts here. Tasks reference them by name.

[hosts.server1]
address = "server1.example.com"
user = "admin"
# port = 22                    # default: 22
# key_file = "~/.ssh/id_rsa"   # default: ssh-agent, then ~/.ssh/id_*

[hosts.server2]
address = "server2.example.com"
user = "admin"

# ============================================================================
# GLOBAL TASKS
# ============================================================================
# Tasks defined here are available from anywhere on your system.

[tasks.system-check]
hosts = ["server1"]
steps = [
    "uptime",
    "df -h",
    "free -m",
]

[tasks.update-system]
hosts = ["server1"]
steps = [
    "sudo apt update",
    "sudo apt upgrade -y",
]
"#;

const LOCAL_TEMPLATE: &str = r#"# sctl project configuration
# Tasks defined here are specific to this project.
# Location: ./sctl.toml (in your project directory)
#
# Hosts from ~/.config/sctl/sctl.toml are available automatically.

# ============================================================================
# PROJECT TASKS
# ============================================================================

[tasks.deploy]
hosts = ["server1"]           # Reference hosts from the global config
workdir = "/var/www/myapp"
before = ["backup"]           # Run the backup task first
steps = [
    "git pull origin main",
    "npm install",
    "npm run build",
    "systemctl restart myapp",
]

[tasks.backup]
hosts = ["server1"]
steps = [
    "tar -czf /backups/myapp-$(date +%Y%m%d).tar.gz /var/www/myapp",
]

[tasks.logs]
hosts = ["server1"]
steps = [
    "journalctl -u myapp -n 50 --no-pager",
]
"#;

/// What `init` did with the target file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    Created,
    Overwritten,
    Skipped,
}

/// The main handler for the `init` command.
pub fn handle(args: &InitArgs) -> Result<()> {
    let (path, content) = if args.local {
        (paths::get_local_config_path(), LOCAL_TEMPLATE)
    } else {
        let dir = paths::get_global_config_dir()?;
        fs::create_dir_all(&dir)
            .with_context(|| format!(t!("init.error.create_dir"), path = dir.display()))?;
        (paths::get_global_config_path()?, GLOBAL_TEMPLATE)
    };

    let interactive = std::io::stdin().is_terminal();
    let outcome = write_sample(&path, content, args.force, |existing| {
        if !interactive {
            return Ok(false);
        }
        Ok(Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!(t!("init.prompt.overwrite"), path = existing.display()))
            .default(false)
            .interact()?)
    })?;

    match outcome {
        InitOutcome::Created | InitOutcome::Overwritten => {
            commons::print_success(&format!(t!("init.success.created"), path = path.display()));
        }
        InitOutcome::Skipped => {
            commons::print_warning(&format!(t!("init.warning.exists"), path = path.display()));
            println!("{}", t!("init.info.use_force"));
        }
    }
    Ok(())
}

/// Writes `content` to `path`. An existing file is replaced only when `force` is set or
/// `confirm` agrees.
pub fn write_sample<F>(path: &Path, content: &str, force: bool, confirm: F) -> Result<InitOutcome>
where
    F: FnOnce(&Path) -> Result<bool>,
{
    let exists = path.exists();
    if exists && !force && !confirm(path)? {
        log::debug!("Leaving existing {} untouched.", path.display());
        return Ok(InitOutcome::Skipped);
    }
    if exists {
        commons::print_warning(&format!(t!("init.warning.overwriting"), path = path.display()));
    }

    fs::write(path, content)
        .with_context(|| format!(t!("init.error.write"), path = path.display()))?;

    Ok(if exists {
        InitOutcome::Overwritten
    } else {
        InitOutcome::Created
    })
}
