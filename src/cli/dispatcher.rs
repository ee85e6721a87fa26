use anyhow::Result;

use crate::cli::{Cli, Commands, handlers};

/// Routes a parsed command line to its handler.
pub fn dispatch(cli: Cli) -> Result<()> {
    log::debug!("CLI args parsed: {:?}", cli);
    let global = cli.global_args();

    match cli.command {
        Commands::Exec(args) => handlers::exec::handle(&args, &global),
        Commands::Run(args) => handlers::run::handle(&args, &global),
        Commands::Hosts => handlers::hosts::handle(&global),
        Commands::Tasks => handlers::tasks::handle(&global),
        Commands::CheckConfig => handlers::check_config::handle(&global),
        Commands::Init(args) => handlers::init::handle(&args),
    }
}
