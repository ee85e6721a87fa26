// src/core/task_validator.rs

use crate::models::{ResolvedConfig, Task};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("task \"{task}\": cannot set both 'host' and 'hosts'")]
    ConflictingHosts { task: String },
    #[error("task \"{task}\": no steps defined")]
    NoSteps { task: String },
    #[error("task \"{task}\": {list} task \"{reference}\" not found")]
    UnknownReference {
        task: String,
        list: &'static str,
        reference: String,
    },
}

/// Checks the invariants of a single task: `host` and `hosts` are exclusive, and there is
/// at least one step.
pub fn validate(task: &Task, name: &str) -> Result<(), ValidationError> {
    if task.single_host().is_some() && !task.hosts.is_empty() {
        return Err(ValidationError::ConflictingHosts {
            task: name.to_string(),
        });
    }
    if task.steps.is_empty() {
        return Err(ValidationError::NoSteps {
            task: name.to_string(),
        });
    }
    Ok(())
}

/// Checks that every `before`/`after` entry names a task in `all_tasks`.
/// Fails on the first unresolved reference, `before` first.
pub fn validate_references(
    task: &Task,
    name: &str,
    all_tasks: &BTreeMap<String, Task>,
) -> Result<(), ValidationError> {
    let lists = [("before", &task.before), ("after", &task.after)];
    for (list, references) in lists {
        if let Some(missing) = references.iter().find(|r| !all_tasks.contains_key(*r)) {
            return Err(ValidationError::UnknownReference {
                task: name.to_string(),
                list,
                reference: missing.clone(),
            });
        }
    }
    Ok(())
}

/// Findings for one host or task in a configuration check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryReport {
    pub name: String,
    pub issues: Vec<String>,
}

impl EntryReport {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }
}

/// The result of checking a whole resolved configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigReport {
    pub hosts: Vec<EntryReport>,
    pub tasks: Vec<EntryReport>,
}

impl ConfigReport {
    pub fn has_errors(&self) -> bool {
        self.hosts
            .iter()
            .chain(self.tasks.iter())
            .any(|entry| !entry.is_valid())
    }
}

/// Checks every host and task. Unlike `validate`, this collects every issue instead of
/// stopping at the first one.
pub fn check_config(config: &ResolvedConfig) -> ConfigReport {
    let hosts = config
        .hosts
        .iter()
        .map(|(name, host)| {
            let mut issues = Vec::new();
            if !host.is_usable() {
                issues.push("missing address".to_string());
            }
            EntryReport {
                name: name.clone(),
                issues,
            }
        })
        .collect();

    let tasks = config
        .tasks
        .iter()
        .map(|(name, task)| {
            let mut issues = Vec::new();
            if let Err(e) = validate(task, name) {
                issues.push(e.to_string());
            }
            if let Err(e) = validate_references(task, name, &config.tasks) {
                issues.push(e.to_string());
            }
            for host in task.target_hosts() {
                if !config.hosts.contains_key(&host) {
                    issues.push(format!("host \"{}\" not found", host));
                }
            }
            EntryReport {
                name: name.clone(),
                issues,
            }
        })
        .collect();

    ConfigReport { hosts, tasks }
}
