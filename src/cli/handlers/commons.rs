// src/cli/handlers/commons.rs

// Shared helpers for the command handlers.

use anyhow::Result;
use colored::*;

use crate::{
    cli::GlobalArgs,
    core::config_loader::ConfigLoader,
    models::{ResolvedConfig, Source},
};

/// Loads the configuration selected by the global `--config`/`--file` flags.
pub fn load_config(global: &GlobalArgs) -> Result<ResolvedConfig> {
    let loader = ConfigLoader::from_cli(global.config.clone(), global.file.clone());
    log::debug!("Config load plan: {:?}", loader.plan());
    Ok(loader.resolve()?)
}

/// Formats where an entry came from: `[global]`, or `* local (overrides global)`.
pub fn format_source(source: Option<&Source>) -> String {
    match source {
        Some(source) if source.is_override() => format!("{} {}", "*".yellow().bold(), source),
        Some(source) => format!("[{}]", source).dimmed().to_string(),
        None => String::new(),
    }
}

/// Prints a success line (`[OK] ...`).
pub fn print_success(message: &str) {
    println!("{} {}", "[OK]".green().bold(), message);
}

/// Prints a warning line (`[!] ...`).
pub fn print_warning(message: &str) {
    println!("{} {}", "[!]".yellow().bold(), message.yellow());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_format_source() {
        colored::control::set_override(false);
        assert_eq!(format_source(Some(&Source::Global)), "[global]");
        assert_eq!(
            format_source(Some(&Source::LocalOverridesGlobal)),
            "* local (overrides global)"
        );
        assert_eq!(
            format_source(Some(&Source::File(PathBuf::from("/etc/sctl.toml")))),
            "[/etc/sctl.toml]"
        );
        assert_eq!(format_source(None), "");
    }
}
