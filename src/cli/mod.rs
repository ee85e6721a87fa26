use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod args;
pub mod dispatcher;
pub mod handlers;

use args::{ExecArgs, InitArgs, RunArgs};

/// Builds the color-aware help string at runtime.
fn build_help_string() -> &'static str {
    // Replaces the semantic tags of the catalogue template (`<title>`, `<cmd>`, ...) with
    // ANSI styles, or with nothing when colors are disabled.
    let use_colors = colored::control::SHOULD_COLORIZE.should_colorize();

    let template = t!("cli.help.template");

    let title = if use_colors { "\x1b[1;33m" } else { "" }; // Bold Yellow
    let hl = if use_colors { "\x1b[1;36m" } else { "" }; // Bold Cyan
    let cmd = if use_colors { "\x1b[36m" } else { "" }; // Cyan
    let dim = if use_colors { "\x1b[2m" } else { "" };
    let reset = if use_colors { "\x1b[0m" } else { "" };

    let formatted_string = template
        .replace("<title>", title)
        .replace("</title>", reset)
        .replace("<hl>", hl)
        .replace("</hl>", reset)
        .replace("<cmd>", cmd)
        .replace("</cmd>", reset)
        .replace("<dim>", dim)
        .replace("</dim>", reset);

    Box::leak(formatted_string.into_boxed_str())
}

/// sctl: remote service control over SSH.
#[derive(Parser, Debug)]
#[command(
    name = "sctl",
    author,
    version,
    about,
    help_template = { build_help_string() },
    styles = clap::builder::Styles::styled()
        .header(clap::builder::styling::AnsiColor::Yellow.on_default().bold())
        .usage(clap::builder::styling::AnsiColor::Yellow.on_default().bold())
        .literal(clap::builder::styling::AnsiColor::Cyan.on_default().bold())
        .placeholder(clap::builder::styling::AnsiColor::Green.on_default()),
)]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    /// Load only this file, skipping the global + local layering.
    #[arg(short = 'c', long = "config", global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Use this file instead of ./sctl.toml (the global config is still loaded).
    #[arg(short = 'f', long = "file", global = true, value_name = "PATH")]
    pub file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute a command on a remote host.
    Exec(ExecArgs),
    /// Run a predefined task.
    Run(RunArgs),
    /// List configured hosts.
    Hosts,
    /// List configured tasks.
    Tasks,
    /// Validate the configuration files.
    CheckConfig,
    /// Create a sample configuration file.
    Init(InitArgs),
}

/// Flags shared by every command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalArgs {
    pub config: Option<PathBuf>,
    pub file: Option<PathBuf>,
}

impl Cli {
    pub fn global_args(&self) -> GlobalArgs {
        GlobalArgs {
            config: self.config.clone(),
            file: self.file.clone(),
        }
    }
}
