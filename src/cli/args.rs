// src/cli/args.rs
use clap::Args;

#[derive(Args, Debug, Default)]
pub struct ExecArgs {
    /// The host to run the command on.
    #[arg(short = 'H', long, required = true)]
    pub host: String,

    /// The command to run. Several words are joined with spaces.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

impl ExecArgs {
    /// The remote command line as a single string.
    pub fn command_line(&self) -> String {
        self.command.join(" ")
    }
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Target host; can be given several times. Replaces the task's own hosts.
    #[arg(short = 'H', long = "host")]
    pub hosts: Vec<String>,

    /// The task to run.
    pub task: String,
}

#[derive(Args, Debug, Default)]
pub struct InitArgs {
    /// Create ./sctl.toml instead of the global configuration.
    #[arg(long)]
    pub local: bool,

    /// Overwrite an existing file without asking.
    #[arg(long)]
    pub force: bool,
}
