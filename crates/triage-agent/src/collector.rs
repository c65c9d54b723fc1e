//! System and network fact collection through OS utilities.
//!
//! Each fact is one shell command whose trimmed stdout is recorded under a
//! fixed label. Commands run strictly one after another. A command that
//! fails to start, times out, or writes to stderr is logged and left out of
//! the map; collection itself never fails.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{Instrument, Span};

use triage_core::types::FactMap;

/// System attributes: label, command.
pub const SYSTEM_COMMANDS: &[(&str, &str)] = &[
    ("Hostname", "hostname"),
    ("System Info", "systeminfo"),
    ("User Accounts", "net users"),
    ("Admin Group", "net localgroup administrators"),
    ("Running Services", "wmic service list brief | findstr \"Running\""),
];

/// Network configuration: label, command.
pub const NETWORK_COMMANDS: &[(&str, &str)] = &[
    ("Network Shares", "net share"),
    ("Active Connections", "netstat -naob"),
    ("Routing Table", "route print"),
    ("ARP Cache", "arp -a"),
    ("IP Configuration", "ipconfig /all"),
];

const DEFAULT_SYSTEM_ROOT: &str = r"C:\Windows";

/// Absolute `cmd.exe` under `system_root` (`%SystemRoot%`), so the shell is
/// never found through a PATH search.
#[cfg_attr(not(windows), allow(dead_code))]
fn system_shell(system_root: Option<OsString>) -> PathBuf {
    let root = system_root
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| DEFAULT_SYSTEM_ROOT.into());
    PathBuf::from(root).join("System32").join("cmd.exe")
}

/// Captured output of one command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("failed to start: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Runs one shell command line to completion.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &str, timeout: Duration) -> Result<CommandOutput, CommandError>;
}

/// Runs commands through the platform shell (`cmd /C` on Windows, `sh -c`
/// elsewhere) so pipelines work.
pub struct ShellRunner;

impl ShellRunner {
    #[cfg(windows)]
    fn shell(command: &str) -> Command {
        let mut cmd = Command::new(system_shell(std::env::var_os("SystemRoot")));
        // Passed verbatim: quoting inside pipelines must reach cmd untouched.
        cmd.arg("/C").raw_arg(command);
        cmd
    }

    #[cfg(not(windows))]
    fn shell(command: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        cmd
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, command: &str, limit: Duration) -> Result<CommandOutput, CommandError> {
        let mut cmd = Self::shell(command);
        cmd.stdin(Stdio::null()).kill_on_drop(true);

        let output = timeout(limit, cmd.output())
            .await
            .map_err(|_| CommandError::Timeout(limit))??;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// Sequential fact collector.
pub struct Collector<R> {
    runner: R,
    command_timeout: Duration,
    span: Span,
}

impl<R: CommandRunner> Collector<R> {
    pub fn new(runner: R, command_timeout: Duration) -> Self {
        Self {
            runner,
            command_timeout,
            span: Span::none(),
        }
    }

    /// Attach the logging span collection runs under.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub async fn collect_system_info(&self) -> FactMap {
        let span = tracing::info_span!(parent: &self.span, "collect", category = "system");
        self.collect(SYSTEM_COMMANDS).instrument(span).await
    }

    pub async fn collect_network_info(&self) -> FactMap {
        let span = tracing::info_span!(parent: &self.span, "collect", category = "network");
        self.collect(NETWORK_COMMANDS).instrument(span).await
    }

    async fn collect(&self, commands: &[(&str, &str)]) -> FactMap {
        let mut facts = FactMap::new();

        for &(label, command) in commands {
            tracing::info!(fact = label, command, "Executing");

            match self.runner.run(command, self.command_timeout).await {
                Ok(output) if output.stderr.is_empty() => {
                    facts.insert(label.to_string(), output.stdout);
                }
                Ok(output) => {
                    tracing::warn!(fact = label, stderr = %output.stderr, "Command reported an error, fact skipped");
                }
                Err(e @ CommandError::Spawn(_)) => {
                    tracing::error!(fact = label, error = %e, "Shell could not be started, fact skipped");
                }
                Err(e) => {
                    tracing::warn!(fact = label, error = %e, "Command failed, fact skipped");
                }
            }
        }

        tracing::info!(
            collected = facts.len(),
            attempted = commands.len(),
            "Fact collection complete"
        );
        facts
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Replays canned outcomes per command and records call order.
    #[derive(Default)]
    pub(crate) struct ScriptedRunner {
        stdout: HashMap<String, String>,
        stderr: HashMap<String, String>,
        timeouts: Vec<String>,
        pub(crate) calls: Mutex<Vec<String>>,
    }

    impl ScriptedRunner {
        pub(crate) fn ok(mut self, command: &str, stdout: &str) -> Self {
            self.stdout.insert(command.to_string(), stdout.to_string());
            self
        }

        pub(crate) fn stderr(mut self, command: &str, stderr: &str) -> Self {
            self.stderr.insert(command.to_string(), stderr.to_string());
            self
        }

        pub(crate) fn timeout(mut self, command: &str) -> Self {
            self.timeouts.push(command.to_string());
            self
        }
    }

    #[async_trait]
    impl CommandRunner for ScriptedRunner {
        async fn run(&self, command: &str, limit: Duration) -> Result<CommandOutput, CommandError> {
            self.calls.lock().unwrap().push(command.to_string());

            if self.timeouts.iter().any(|c| c == command) {
                return Err(CommandError::Timeout(limit));
            }
            match self.stdout.get(command) {
                Some(stdout) => Ok(CommandOutput {
                    stdout: stdout.clone(),
                    stderr: self.stderr.get(command).cloned().unwrap_or_default(),
                }),
                None => Err(CommandError::Spawn(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "not recognized as an internal or external command",
                ))),
            }
        }
    }

    #[tokio::test]
    async fn test_system_info_runs_every_command_in_order() {
        let mut runner = ScriptedRunner::default();
        for (_, command) in SYSTEM_COMMANDS {
            runner = runner.ok(command, "output");
        }
        let collector = Collector::new(runner, Duration::from_secs(30));

        let facts = collector.collect_system_info().await;

        assert_eq!(facts.len(), SYSTEM_COMMANDS.len());
        let calls = collector.runner.calls.lock().unwrap().clone();
        let expected: Vec<String> = SYSTEM_COMMANDS.iter().map(|(_, c)| c.to_string()).collect();
        assert_eq!(calls, expected);
    }

    #[tokio::test]
    async fn test_failed_commands_are_skipped_not_fatal() {
        let runner = ScriptedRunner::default()
            .ok("net share", "C$  C:\\  Default share")
            .ok("netstat -naob", "")
            .stderr("netstat -naob", "The requested operation requires elevation.")
            .timeout("route print")
            .ok("ipconfig /all", "Windows IP Configuration");
        let collector = Collector::new(runner, Duration::from_secs(30));

        let facts = collector.collect_network_info().await;

        let labels: Vec<&str> = facts.keys().map(String::as_str).collect();
        assert_eq!(labels, vec!["IP Configuration", "Network Shares"]);
        assert_eq!(facts["Network Shares"], "C$  C:\\  Default share");
        // Failures do not short-circuit the remaining commands.
        assert_eq!(
            collector.runner.calls.lock().unwrap().len(),
            NETWORK_COMMANDS.len()
        );
    }

    #[test]
    fn test_system_shell_follows_system_root() {
        let shell = system_shell(Some(OsString::from(r"D:\WINNT")));
        assert!(shell.starts_with(r"D:\WINNT"));
        assert!(shell.ends_with(PathBuf::from("System32").join("cmd.exe")));

        for unset in [None, Some(OsString::new())] {
            let shell = system_shell(unset);
            assert!(shell.starts_with(DEFAULT_SYSTEM_ROOT));
            assert!(shell.ends_with(PathBuf::from("System32").join("cmd.exe")));
        }
    }

    #[tokio::test]
    async fn test_shell_runner_captures_trimmed_stdout() {
        let output = ShellRunner
            .run("echo triage", Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(output.stdout, "triage");
    }

    #[cfg(not(windows))]
    #[tokio::test]
    async fn test_shell_runner_enforces_timeout() {
        let result = ShellRunner
            .run("sleep 5", Duration::from_millis(100))
            .await;
        assert!(matches!(result, Err(CommandError::Timeout(_))));
    }

    #[cfg(not(windows))]
    #[tokio::test]
    async fn test_shell_runner_supports_pipelines() {
        let output = ShellRunner
            .run("printf 'a\\nRunning b\\nc\\n' | grep Running", Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(output.stdout, "Running b");
        assert!(output.stderr.is_empty());
    }
}
