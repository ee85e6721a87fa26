// src/cli/handlers/check_config.rs

use anyhow::{Result, anyhow};
use colored::*;

use super::commons;
use crate::{
    cli::{GlobalArgs, handlers::hosts::describe_host, handlers::tasks::summarize_task},
    core::task_validator::{self, EntryReport},
};

/// The main handler for the `check-config` command.
///
/// Prints every host and task with its issues, then fails if any entry has one.
pub fn handle(global: &GlobalArgs) -> Result<()> {
    let config = commons::load_config(global)?;
    let report = task_validator::check_config(&config);

    println!("{}", section_header(Section::Hosts));
    for entry in &report.hosts {
        let detail = config.hosts.get(&entry.name).map(describe_host);
        print_entry(entry, detail);
    }

    println!();
    println!("{}", section_header(Section::Tasks));
    for entry in &report.tasks {
        let detail = config.tasks.get(&entry.name).map(summarize_task);
        print_entry(entry, detail);
    }

    println!();
    if report.has_errors() {
        commons::print_warning(t!("check.info.has_errors"));
        return Err(anyhow!(t!("check.error.failed")));
    }

    commons::print_success(t!("check.info.ok"));
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Hosts,
    Tasks,
}

/// `[H] Hosts:` / `[T] Tasks:`, using the same markers as the listings.
fn section_header(section: Section) -> String {
    let (marker, title) = match section {
        Section::Hosts => ("[H]".cyan().bold(), t!("check.section.hosts")),
        Section::Tasks => ("[T]".blue().bold(), t!("check.section.tasks")),
    };
    format!("{} {}:", marker, title.bold())
}

fn print_entry(entry: &EntryReport, detail: Option<String>) {
    if entry.is_valid() {
        println!(
            "  {} {} ({})",
            "[ok]".green(),
            entry.name,
            detail.unwrap_or_default()
        );
        return;
    }

    println!("  {} {}:", "[error]".red(), entry.name.bold());
    for issue in &entry.issues {
        println!("      -> {}", issue);
    }
}
