//! Stages that run external commands.

use super::{Stage, StageResult};
use crate::context::RunContext;
use crate::core::StageOutput;
use crate::errors::{CheckFailure, ReleaseflowError};
use async_trait::async_trait;
use std::process::{ExitStatus, Stdio};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Number of trailing output lines kept as failure diagnostics.
const DIAGNOSTIC_TAIL_LINES: usize = 20;

/// How a failing command is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Failures are `ToolchainError`.
    Toolchain,
    /// Failures are `CheckFailure`.
    Check,
}

/// Runs a list of shell commands in order, stopping at the first failure.
///
/// Commands run in the context's working directory with every exported
/// metadata key set as an environment variable. Child processes are killed
/// if the stage is dropped by a timeout or cancellation.
#[derive(Debug, Clone)]
pub struct CommandStage {
    name: String,
    commands: Vec<String>,
    kind: CommandKind,
    shell: Vec<String>,
}

impl CommandStage {
    /// Creates a command stage using `sh -c`.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: CommandKind, commands: Vec<String>) -> Self {
        Self {
            name: name.into(),
            commands,
            kind,
            shell: vec!["sh".into(), "-c".into()],
        }
    }

    /// Sets the shell prefix, e.g. `["bash", "-euo", "pipefail", "-c"]`.
    #[must_use]
    pub fn with_shell(mut self, shell: Vec<String>) -> Self {
        if !shell.is_empty() {
            self.shell = shell;
        }
        self
    }

    /// Returns the commands.
    #[must_use]
    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    /// Returns the failure kind.
    #[must_use]
    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    fn failure(&self, command: &str, status: &str, diagnostics: String) -> ReleaseflowError {
        match self.kind {
            CommandKind::Check => {
                CheckFailure::new(command, status).with_diagnostics(diagnostics).into()
            }
            CommandKind::Toolchain => {
                let mut message = format!("`{command}` {status}");
                if !diagnostics.trim().is_empty() {
                    message.push_str(": ");
                    message.push_str(diagnostics.trim());
                }
                ReleaseflowError::Toolchain(message)
            }
        }
    }

    async fn run_command(&self, ctx: &RunContext, command: &str) -> Result<String, ReleaseflowError> {
        let (program, args) = self
            .shell
            .split_first()
            .ok_or_else(|| ReleaseflowError::toolchain("empty shell prefix"))?;

        info!(stage = %self.name, command = command, "running command");

        let output = Command::new(program)
            .args(args)
            .arg(command)
            .current_dir(ctx.workdir())
            .envs(ctx.metadata().to_map())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| self.failure(command, &format!("could not be started: {e}"), String::new()))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stdout.lines().chain(stderr.lines()) {
            debug!(stage = %self.name, "{line}");
        }

        if !output.status.success() {
            let status = status_label(output.status);
            warn!(stage = %self.name, command = command, status = %status, "command failed");
            return Err(self.failure(command, &status, tail(&stdout, &stderr)));
        }

        Ok(stdout.lines().next().unwrap_or_default().trim().to_string())
    }
}

fn status_label(status: ExitStatus) -> String {
    status.code().map_or_else(
        || "terminated by signal".to_string(),
        |code| format!("exited with code {code}"),
    )
}

/// Last lines of combined output, stderr last.
fn tail(stdout: &str, stderr: &str) -> String {
    let lines: Vec<&str> = stdout
        .lines()
        .chain(stderr.lines())
        .filter(|l| !l.trim().is_empty())
        .collect();
    let start = lines.len().saturating_sub(DIAGNOSTIC_TAIL_LINES);
    lines[start..].join("\n")
}

#[async_trait]
impl Stage for CommandStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &RunContext) -> StageResult {
        let mut notes = Vec::with_capacity(self.commands.len());
        for command in &self.commands {
            let first_line = self.run_command(ctx, command).await?;
            if !first_line.is_empty() {
                notes.push(first_line);
            }
        }

        Ok(StageOutput::value("commands", serde_json::json!(self.commands)).with_notes(notes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::trigger::{EventKind, TriggerContext};

    fn ctx() -> RunContext {
        RunContext::new(TriggerContext::new(EventKind::Push, "refs/heads/main"))
    }

    fn stage(kind: CommandKind, commands: &[&str]) -> CommandStage {
        CommandStage::new(
            "Lint",
            kind,
            commands.iter().map(|c| (*c).to_string()).collect(),
        )
    }

    #[tokio::test]
    async fn test_commands_succeed_and_record_first_line() {
        let output = stage(CommandKind::Check, &["echo 'rustc 1.80.0'", "true"])
            .execute(&ctx())
            .await
            .unwrap();
        assert_eq!(output.notes, vec!["rustc 1.80.0".to_string()]);
    }

    #[tokio::test]
    async fn test_first_failure_stops_the_stage() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("ran");
        let second = format!("touch {}", marker.display());

        let err = stage(CommandKind::Check, &["echo 'Diff in src/lib.rs' >&2; exit 1", &second])
            .execute(&ctx())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Check);
        let msg = err.to_string();
        assert!(msg.contains("exited with code 1"));
        assert!(msg.contains("Diff in src/lib.rs"));
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_toolchain_kind() {
        let err = stage(CommandKind::Toolchain, &["exit 7"])
            .execute(&ctx())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Toolchain);
        assert!(err.to_string().contains("exited with code 7"));
    }

    #[tokio::test]
    async fn test_exports_visible_to_commands() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx().with_workdir(dir.path());
        ctx.metadata().export("RELEASE_FILE", "gen_inds_v1.tar.gz").unwrap();

        stage(CommandKind::Check, &["test \"$RELEASE_FILE\" = gen_inds_v1.tar.gz", "pwd > where"])
            .execute(&ctx)
            .await
            .unwrap();

        let recorded = std::fs::read_to_string(dir.path().join("where")).unwrap();
        assert_eq!(
            std::fs::canonicalize(recorded.trim()).unwrap(),
            std::fs::canonicalize(dir.path()).unwrap()
        );
    }

    #[tokio::test]
    async fn test_missing_shell_fails_to_start() {
        let err = stage(CommandKind::Check, &["true"])
            .with_shell(vec!["/nonexistent/shell".into(), "-c".into()])
            .execute(&ctx())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("could not be started"));
    }

    #[test]
    fn test_tail_keeps_last_lines() {
        let stdout: String = (0..30).map(|i| format!("line {i}\n")).collect();
        let tail = tail(&stdout, "error: boom\n");
        assert_eq!(tail.lines().count(), DIAGNOSTIC_TAIL_LINES);
        assert!(tail.ends_with("error: boom"));
    }
}
