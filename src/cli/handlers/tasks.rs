// src/cli/handlers/tasks.rs

use anyhow::Result;
use colored::*;

use super::commons;
use crate::{cli::GlobalArgs, models::Task};

/// The main handler for the `tasks` command.
pub fn handle(global: &GlobalArgs) -> Result<()> {
    let config = commons::load_config(global)?;

    if config.tasks.is_empty() {
        println!("{}", t!("tasks.info.empty").dimmed());
        return Ok(());
    }

    for (name, task) in &config.tasks {
        println!(
            "  {} {} ({})  {}",
            "[T]".blue(),
            name.bold(),
            summarize_task(task),
            commons::format_source(config.task_sources.get(name))
        );
    }
    Ok(())
}

/// One-line summary: target hosts, step count and chained tasks.
pub fn summarize_task(task: &Task) -> String {
    let mut info = format!(
        t!("tasks.info.summary"),
        hosts = task.target_hosts().join(", "),
        steps = task.steps.len()
    );
    if !task.before.is_empty() {
        info.push_str(", ");
        info.push_str(&format!(t!("tasks.info.before"), names = task.before.join(", ")));
    }
    if !task.after.is_empty() {
        info.push_str(", ");
        info.push_str(&format!(t!("tasks.info.after"), names = task.after.join(", ")));
    }
    info
}
