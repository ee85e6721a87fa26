//! # Task Executor
//!
//! Runs a task from a `ResolvedConfig` against its hosts, strictly in order:
//!
//! 1. every task named in `before`, each on its own hosts;
//! 2. the task itself, on the `--host` overrides or its configured hosts;
//! 3. every task named in `after`, each on its own hosts.
//!
//! Hosts are visited one at a time. The first failure anywhere ends the whole run:
//! no further steps, hosts or chained tasks are attempted, and nothing is rolled back.
//! Chaining is one level deep; a chained task's own `before`/`after` lists are ignored.
use crate::{
    core::task_validator::{self, ValidationError},
    models::{ResolvedConfig, Task},
    system::remote::{Connector, RemoteError, RemoteShell},
};
use colored::*;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("task \"{0}\" not found in config")]
    TaskNotFound(String),
    #[error("host \"{0}\" not found in config")]
    HostNotFound(String),
    #[error("task \"{0}\" has no target hosts (set 'host' or 'hosts', or pass --host)")]
    NoTargetHosts(String),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("ssh connection to {host} failed: {source}")]
    Connection {
        host: String,
        #[source]
        source: RemoteError,
    },
    #[error("step {step} on {host} failed: {source}")]
    StepFailed {
        step: usize,
        host: String,
        #[source]
        source: RemoteError,
    },
    #[error("command on {host} failed: {source}")]
    CommandFailed {
        host: String,
        #[source]
        source: RemoteError,
    },
    #[error("no command provided")]
    EmptyCommand,
}

/// What a successful run covered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Number of hosts the main task ran on.
    pub hosts: usize,
}

/// Drives tasks over a `Connector`.
pub struct TaskExecutor<'a, C: Connector + ?Sized> {
    config: &'a ResolvedConfig,
    connector: &'a C,
}

impl<'a, C: Connector + ?Sized> TaskExecutor<'a, C> {
    pub fn new(config: &'a ResolvedConfig, connector: &'a C) -> Self {
        Self { config, connector }
    }

    /// Runs `task_name` with its before/after chain.
    ///
    /// `host_overrides`, when non-empty, replaces the task's own hosts. It never applies
    /// to chained tasks.
    pub fn run(&self, task_name: &str, host_overrides: &[String]) -> Result<RunSummary, ExecError> {
        let task = self.lookup_task(task_name)?;

        // Everything that can be checked up front is checked before any session is opened.
        task_validator::validate(task, task_name)?;
        task_validator::validate_references(task, task_name, &self.config.tasks)?;
        for chained in task.before.iter().chain(task.after.iter()) {
            task_validator::validate(self.lookup_task(chained)?, chained)?;
        }

        let targets = if host_overrides.is_empty() {
            task.target_hosts()
        } else {
            host_overrides.to_vec()
        };
        if targets.is_empty() {
            return Err(ExecError::NoTargetHosts(task_name.to_string()));
        }
        log::debug!("Running task '{}' on {:?}", task_name, targets);

        for name in &task.before {
            self.run_chained(name, &targets)?;
        }

        print_task_header(task_name);
        self.run_body(task, &targets)?;

        for name in &task.after {
            self.run_chained(name, &targets)?;
        }

        Ok(RunSummary {
            hosts: targets.len(),
        })
    }

    /// Runs a single ad-hoc command on one host.
    pub fn exec(&self, host_name: &str, command: &str) -> Result<(), ExecError> {
        if command.trim().is_empty() {
            return Err(ExecError::EmptyCommand);
        }
        let mut shell = self.open(host_name)?;
        let outcome = shell.run(command).map_err(|source| ExecError::CommandFailed {
            host: host_name.to_string(),
            source,
        });
        release(shell.as_mut(), host_name);
        outcome
    }

    fn lookup_task(&self, name: &str) -> Result<&'a Task, ExecError> {
        self.config
            .tasks
            .get(name)
            .ok_or_else(|| ExecError::TaskNotFound(name.to_string()))
    }

    /// Runs a `before`/`after` task on its own hosts. A chained task without hosts only
    /// produces the note and runs nothing.
    fn run_chained(&self, name: &str, parent_targets: &[String]) -> Result<(), ExecError> {
        let task = self.lookup_task(name)?;
        let targets = task.target_hosts();

        if let Some(note) = disjoint_hosts_note(name, &targets, parent_targets) {
            println!("{} {}", "[!]".yellow().bold(), note.yellow());
        }

        print_task_header(name);
        self.run_body(task, &targets)
    }

    fn run_body(&self, task: &Task, targets: &[String]) -> Result<(), ExecError> {
        let show_host_header = targets.len() > 1;
        for host_name in targets {
            self.run_on_host(host_name, task, show_host_header)?;
        }
        Ok(())
    }

    fn run_on_host(
        &self,
        host_name: &str,
        task: &Task,
        show_host_header: bool,
    ) -> Result<(), ExecError> {
        if show_host_header {
            println!("  {} {}", "[H]".cyan(), host_name.bold());
        }

        let mut shell = self.open(host_name)?;
        let outcome = run_steps(shell.as_mut(), host_name, task, show_host_header);
        release(shell.as_mut(), host_name);
        outcome?;

        if show_host_header {
            println!(
                "    {} {}",
                "✓".green(),
                format!(t!("run.host_done"), name = host_name)
            );
        }
        Ok(())
    }

    fn open(&self, host_name: &str) -> Result<Box<dyn RemoteShell>, ExecError> {
        let host = self
            .config
            .hosts
            .get(host_name)
            .ok_or_else(|| ExecError::HostNotFound(host_name.to_string()))?;
        self.connector
            .connect(host)
            .map_err(|source| ExecError::Connection {
                host: host_name.to_string(),
                source,
            })
    }
}

fn run_steps(
    shell: &mut dyn RemoteShell,
    host_name: &str,
    task: &Task,
    indented: bool,
) -> Result<(), ExecError> {
    let total = task.steps.len();
    let indent = if indented { "    " } else { "  " };
    for (i, step) in task.steps.iter().enumerate() {
        let number = i + 1;
        println!(
            "{}{} {} {}",
            indent,
            "→".blue(),
            format!("[{}/{}]", number, total).dimmed(),
            step.green()
        );
        shell
            .run(&task.command_for(step))
            .map_err(|source| ExecError::StepFailed {
                step: number,
                host: host_name.to_string(),
                source,
            })?;
    }
    Ok(())
}

/// Closes a session. A failure to close is logged and never replaces the run's own result.
fn release(shell: &mut dyn RemoteShell, host_name: &str) {
    if let Err(e) = shell.close() {
        log::warn!("Failed to close session to {}: {}", host_name, e);
    }
}

fn print_task_header(name: &str) {
    println!(
        "{} {}",
        "[T]".blue().bold(),
        format!(t!("run.task_header"), name = name).bold()
    );
}

/// The note printed when a chained task shares no host with the task that chains it.
pub fn disjoint_hosts_note(name: &str, targets: &[String], parent_targets: &[String]) -> Option<String> {
    if hosts_overlap(targets, parent_targets) {
        return None;
    }
    Some(format!(
        t!("run.disjoint_hosts"),
        name = name,
        hosts = targets.join(", ")
    ))
}

/// `true` when the two host lists share at least one name.
pub fn hosts_overlap(hosts: &[String], others: &[String]) -> bool {
    hosts.iter().any(|h| others.contains(h))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Host;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Events = Rc<RefCell<Vec<String>>>;

    /// Records every connect/run/close and fails where told to.
    #[derive(Default)]
    struct FakeConnector {
        events: Events,
        fail_step: Option<(String, String)>,
        fail_connect: Option<String>,
        fail_close: bool,
    }

    struct FakeShell {
        address: String,
        events: Events,
        fail_command: Option<String>,
        fail_close: bool,
    }

    impl Connector for FakeConnector {
        fn connect(&self, host: &Host) -> Result<Box<dyn RemoteShell>, RemoteError> {
            if self.fail_connect.as_deref() == Some(host.address.as_str()) {
                return Err(RemoteError::NoAuthMethods);
            }
            self.events
                .borrow_mut()
                .push(format!("connect {}", host.address));
            let fail_command = self
                .fail_step
                .as_ref()
                .filter(|(address, _)| *address == host.address)
                .map(|(_, command)| command.clone());
            Ok(Box::new(FakeShell {
                address: host.address.clone(),
                events: Rc::clone(&self.events),
                fail_command,
                fail_close: self.fail_close,
            }))
        }
    }

    impl RemoteShell for FakeShell {
        fn run(&mut self, command: &str) -> Result<(), RemoteError> {
            self.events
                .borrow_mut()
                .push(format!("run {}: {}", self.address, command));
            if self.fail_command.as_deref() == Some(command) {
                return Err(RemoteError::NonZeroExit { status: 1 });
            }
            Ok(())
        }

        fn close(&mut self) -> Result<(), RemoteError> {
            self.events
                .borrow_mut()
                .push(format!("close {}", self.address));
            if self.fail_close {
                return Err(RemoteError::Io(std::io::Error::other("reset")));
            }
            Ok(())
        }
    }

    fn host(address: &str) -> Host {
        Host {
            address: address.to_string(),
            port: 22,
            user: "deploy".to_string(),
            key_file: None,
            password: None,
        }
    }

    fn task(hosts: &[&str], steps: &[&str]) -> Task {
        Task {
            hosts: hosts.iter().map(|h| h.to_string()).collect(),
            steps: steps.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    fn config() -> ResolvedConfig {
        let mut config = ResolvedConfig::default();
        for name in ["web1", "web2", "db"] {
            config.hosts.insert(name.to_string(), host(name));
        }

        let mut deploy = task(&["web1", "web2"], &["git pull", "make", "restart"]);
        deploy.before = vec!["backup".to_string()];
        deploy.after = vec!["notify".to_string()];
        config.tasks.insert("deploy".to_string(), deploy);
        config
            .tasks
            .insert("backup".to_string(), task(&["db"], &["dump"]));
        config
            .tasks
            .insert("notify".to_string(), task(&["web1"], &["wall done"]));
        config
    }

    fn events(connector: &FakeConnector) -> Vec<String> {
        connector.events.borrow().clone()
    }

    #[test]
    fn test_before_main_after_order() {
        let config = config();
        let connector = FakeConnector::default();
        let summary = TaskExecutor::new(&config, &connector)
            .run("deploy", &[])
            .unwrap();

        assert_eq!(summary, RunSummary { hosts: 2 });
        assert_eq!(
            events(&connector),
            vec![
                "connect db",
                "run db: dump",
                "close db",
                "connect web1",
                "run web1: git pull",
                "run web1: make",
                "run web1: restart",
                "close web1",
                "connect web2",
                "run web2: git pull",
                "run web2: make",
                "run web2: restart",
                "close web2",
                "connect web1",
                "run web1: wall done",
                "close web1",
            ]
        );
    }

    #[test]
    fn test_step_failure_stops_everything() {
        let config = config();
        let connector = FakeConnector {
            fail_step: Some(("web1".to_string(), "make".to_string())),
            ..Default::default()
        };
        let err = TaskExecutor::new(&config, &connector)
            .run("deploy", &[])
            .unwrap_err();

        match &err {
            ExecError::StepFailed { step, host, .. } => {
                assert_eq!(*step, 2);
                assert_eq!(host, "web1");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(
            err.to_string(),
            "step 2 on web1 failed: command exited with status 1"
        );

        // No third step, no second host, no after-chain; the session is still closed.
        assert_eq!(
            events(&connector),
            vec![
                "connect db",
                "run db: dump",
                "close db",
                "connect web1",
                "run web1: git pull",
                "run web1: make",
                "close web1",
            ]
        );
    }

    #[test]
    fn test_before_failure_skips_main_task() {
        let config = config();
        let connector = FakeConnector {
            fail_step: Some(("db".to_string(), "dump".to_string())),
            ..Default::default()
        };
        let err = TaskExecutor::new(&config, &connector)
            .run("deploy", &[])
            .unwrap_err();
        assert!(matches!(err, ExecError::StepFailed { step: 1, .. }));
        assert_eq!(events(&connector), vec!["connect db", "run db: dump", "close db"]);
    }

    #[test]
    fn test_overrides_do_not_propagate_to_chained_tasks() {
        let config = config();
        let connector = FakeConnector::default();
        let summary = TaskExecutor::new(&config, &connector)
            .run("deploy", &["web2".to_string()])
            .unwrap();

        assert_eq!(summary, RunSummary { hosts: 1 });
        let connects: Vec<_> = events(&connector)
            .into_iter()
            .filter(|e| e.starts_with("connect"))
            .collect();
        assert_eq!(connects, vec!["connect db", "connect web2", "connect web1"]);
    }

    #[test]
    fn test_dangling_reference_fails_before_connecting() {
        let mut config = config();
        if let Some(deploy) = config.tasks.get_mut("deploy") {
            deploy.before.push("missing".to_string());
        }
        let connector = FakeConnector::default();
        let err = TaskExecutor::new(&config, &connector)
            .run("deploy", &[])
            .unwrap_err();

        assert!(matches!(
            err,
            ExecError::Invalid(ValidationError::UnknownReference { list: "before", .. })
        ));
        assert!(events(&connector).is_empty());
    }

    #[test]
    fn test_invalid_chained_task_fails_before_connecting() {
        let mut config = config();
        config
            .tasks
            .insert("notify".to_string(), task(&["web1"], &[]));
        let connector = FakeConnector::default();
        let err = TaskExecutor::new(&config, &connector)
            .run("deploy", &[])
            .unwrap_err();

        assert!(matches!(err, ExecError::Invalid(ValidationError::NoSteps { .. })));
        assert!(events(&connector).is_empty());
    }

    #[test]
    fn test_unknown_task() {
        let config = config();
        let connector = FakeConnector::default();
        let err = TaskExecutor::new(&config, &connector)
            .run("nope", &[])
            .unwrap_err();
        assert_eq!(err.to_string(), "task \"nope\" not found in config");
    }

    #[test]
    fn test_no_target_hosts() {
        let mut config = ResolvedConfig::default();
        config
            .tasks
            .insert("adhoc".to_string(), task(&[], &["uptime"]));
        config.hosts.insert("web1".to_string(), host("web1"));
        let connector = FakeConnector::default();
        let executor = TaskExecutor::new(&config, &connector);

        let err = executor.run("adhoc", &[]).unwrap_err();
        assert!(matches!(err, ExecError::NoTargetHosts(_)));

        // The same task works once a host is given on the command line.
        executor.run("adhoc", &["web1".to_string()]).unwrap();
        assert_eq!(
            events(&connector),
            vec!["connect web1", "run web1: uptime", "close web1"]
        );
    }

    #[test]
    fn test_unknown_host_fails_when_reached() {
        let mut config = ResolvedConfig::default();
        config.hosts.insert("web1".to_string(), host("web1"));
        config
            .tasks
            .insert("t".to_string(), task(&["web1", "ghost"], &["uptime"]));
        let connector = FakeConnector::default();
        let err = TaskExecutor::new(&config, &connector)
            .run("t", &[])
            .unwrap_err();

        assert_eq!(err.to_string(), "host \"ghost\" not found in config");
        assert_eq!(
            events(&connector),
            vec!["connect web1", "run web1: uptime", "close web1"]
        );
    }

    #[test]
    fn test_workdir_is_prefixed() {
        let mut config = ResolvedConfig::default();
        config.hosts.insert("web1".to_string(), host("web1"));
        let mut t = task(&["web1"], &["ls"]);
        t.workdir = Some("/srv/app".to_string());
        config.tasks.insert("t".to_string(), t);
        let connector = FakeConnector::default();
        TaskExecutor::new(&config, &connector).run("t", &[]).unwrap();
        assert!(
            events(&connector).contains(&"run web1: cd /srv/app && ls".to_string())
        );
    }

    #[test]
    fn test_connection_failure_names_host() {
        let config = config();
        let connector = FakeConnector {
            fail_connect: Some("db".to_string()),
            ..Default::default()
        };
        let err = TaskExecutor::new(&config, &connector)
            .run("backup", &[])
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "ssh connection to db failed: no authentication methods available"
        );
        assert!(events(&connector).is_empty());
    }

    #[test]
    fn test_close_failure_does_not_fail_the_run() {
        let config = config();
        let connector = FakeConnector {
            fail_close: true,
            ..Default::default()
        };
        TaskExecutor::new(&config, &connector)
            .run("backup", &[])
            .unwrap();
        assert_eq!(
            events(&connector),
            vec!["connect db", "run db: dump", "close db"]
        );
    }

    #[test]
    fn test_exec_runs_single_command() {
        let config = config();
        let connector = FakeConnector::default();
        let executor = TaskExecutor::new(&config, &connector);

        executor.exec("web2", "uptime").unwrap();
        assert_eq!(
            events(&connector),
            vec!["connect web2", "run web2: uptime", "close web2"]
        );

        assert!(matches!(
            executor.exec("web2", "  "),
            Err(ExecError::EmptyCommand)
        ));
        assert!(matches!(
            executor.exec("ghost", "uptime"),
            Err(ExecError::HostNotFound(_))
        ));
    }

    #[test]
    fn test_chained_task_without_hosts_is_skipped() {
        let mut config = ResolvedConfig::default();
        config.hosts.insert("web1".to_string(), host("web1"));
        let mut main = task(&[], &["build"]);
        main.before = vec!["prep".to_string()];
        config.tasks.insert("main".to_string(), main);
        config
            .tasks
            .insert("prep".to_string(), task(&[], &["mkdir -p /tmp/prep"]));
        let connector = FakeConnector::default();

        let summary = TaskExecutor::new(&config, &connector)
            .run("main", &["web1".to_string()])
            .unwrap();

        assert_eq!(summary, RunSummary { hosts: 1 });
        assert_eq!(
            events(&connector),
            vec!["connect web1", "run web1: build", "close web1"]
        );
    }

    #[test]
    fn test_disjoint_hosts_note() {
        let web = vec!["web1".to_string(), "web2".to_string()];
        let db = vec!["db".to_string()];

        let note = disjoint_hosts_note("backup", &db, &web).unwrap();
        assert!(note.contains("backup"));
        assert!(note.contains("db"));

        assert_eq!(disjoint_hosts_note("notify", &["web2".to_string()], &web), None);

        // No hosts at all never overlaps, so the note is shown.
        assert!(disjoint_hosts_note("prep", &[], &web).is_some());
    }

    #[test]
    fn test_hosts_overlap() {
        let a = vec!["web1".to_string(), "web2".to_string()];
        let b = vec!["db".to_string()];
        let c = vec!["web2".to_string()];
        assert!(!hosts_overlap(&a, &b));
        assert!(hosts_overlap(&a, &c));
        assert!(hosts_overlap(&c, &a));
    }
}
