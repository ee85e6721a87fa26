// src/bin/sctl.rs

use clap::Parser;
use colored::*;
use sctl::{
    cli::{Cli, dispatcher},
    t,
};

/// The main entry point of the `sctl` application.
/// It sets up logging, parses arguments, dispatches to the matching handler,
/// and performs centralized error handling.
fn main() {
    env_logger::init();

    if let Err(e) = dispatcher::dispatch(Cli::parse()) {
        eprintln!("\n{}: {}", t!("common.error").red().bold(), e);
        std::process::exit(1);
    }
}
