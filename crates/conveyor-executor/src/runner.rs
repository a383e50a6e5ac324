//! Process-backed command runner.

use async_trait::async_trait;
use conveyor_config::VariableContext;
use conveyor_core::buildspec::{CommandOutcome, CommandRecord, CommandRunner};
use conveyor_core::{Error, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::debug;

/// Runs command records as local processes. Placeholders in arguments are
/// interpolated from the run's variable bindings, and the bindings are also
/// exported into the child's environment.
pub struct ProcessRunner {
    working_dir: PathBuf,
}

impl ProcessRunner {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
        }
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(
        &self,
        command: &CommandRecord,
        vars: &HashMap<String, String>,
    ) -> Result<CommandOutcome> {
        let ctx = VariableContext::from_bindings(vars.clone());
        let args = ctx.interpolate_args(&command.args);

        debug!(program = %command.program, ?args, "Spawning command");

        let output = Command::new(&command.program)
            .args(&args)
            .envs(vars)
            .current_dir(&self.working_dir)
            .output()
            .await
            .map_err(|e| {
                Error::Internal(format!("failed to spawn {}: {}", command.program, e))
            })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).to_string();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(CommandOutcome {
            exit_code: output.status.code().unwrap_or(-1),
            output: combined.trim_end().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_runs_command_and_captures_output() {
        let runner = ProcessRunner::new(".");
        let cmd = CommandRecord::new("echo", ["hello"]);
        let outcome = runner.run(&cmd, &HashMap::new()).await.unwrap();
        assert!(outcome.is_success());
        assert_eq!(outcome.output, "hello");
    }

    #[tokio::test]
    async fn test_interpolates_placeholders() {
        let runner = ProcessRunner::new(".");
        let cmd = CommandRecord::new("echo", ["${GREETING}"]).requiring(["GREETING"]);
        let vars = HashMap::from([("GREETING".to_string(), "hi there".to_string())]);
        let outcome = runner.run(&cmd, &vars).await.unwrap();
        assert_eq!(outcome.output, "hi there");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_reported_not_an_error() {
        let runner = ProcessRunner::new(".");
        let cmd = CommandRecord::new("sh", ["-c", "exit 3"]);
        let outcome = runner.run(&cmd, &HashMap::new()).await.unwrap();
        assert_eq!(outcome.exit_code, 3);
        assert!(!outcome.is_success());
    }

    #[tokio::test]
    async fn test_missing_program_is_an_error() {
        let runner = ProcessRunner::new(".");
        let cmd = CommandRecord::new("definitely-not-a-program-xyz", [] as [&str; 0]);
        let result = runner.run(&cmd, &HashMap::new()).await;
        assert!(result.is_err());
    }
}
