//! The external inference routine that drives the arm.

use super::PickAndPlaceParams;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Instant;
use thiserror::Error;

/// Lines of inference stderr kept in an error message.
const STDERR_TAIL_LINES: usize = 8;

/// Errors raised by the inference routine.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("failed to launch inference: {0}")]
    Launch(String),
    #[error("inference exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("{0}")]
    Other(String),
}

/// A blocking robot control routine.
///
/// Implementations may run for tens of seconds, touch hardware, and give
/// no progress signal. They are only ever called from the blocking pool
/// while the concurrency gate is held.
pub trait InferenceRunner: Send + Sync {
    /// Runs the pick-and-place policy to completion.
    fn run_pick_and_place(&self, params: &PickAndPlaceParams) -> Result<(), InferenceError>;
}

/// How to launch the inference program.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Program followed by its fixed arguments.
    pub command: Vec<String>,
    /// Working directory for the program.
    pub working_dir: Option<PathBuf>,
    /// Checkpoint used when a request does not name one.
    pub default_model_id: Option<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            command: vec![
                "python".to_string(),
                "-m".to_string(),
                "scripts.run_inference_pick_and_place".to_string(),
            ],
            working_dir: None,
            default_model_id: None,
        }
    }
}

/// Runs the inference program as a child process.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    config: PolicyConfig,
}

impl CommandRunner {
    pub fn new(config: PolicyConfig) -> Self {
        Self { config }
    }

    fn build_command(&self, params: &PickAndPlaceParams) -> Result<Command, InferenceError> {
        let (program, fixed) = self
            .config
            .command
            .split_first()
            .ok_or_else(|| InferenceError::Launch("no inference command configured".into()))?;

        let mut params = params.clone();
        if params.model_id.is_none() {
            params.model_id = self.config.default_model_id.clone();
        }

        let mut command = Command::new(program);
        command
            .args(fixed)
            .args(params.to_args())
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.config.working_dir {
            command.current_dir(dir);
        }
        Ok(command)
    }
}

impl InferenceRunner for CommandRunner {
    fn run_pick_and_place(&self, params: &PickAndPlaceParams) -> Result<(), InferenceError> {
        let mut command = self.build_command(params)?;
        let started = Instant::now();

        tracing::info!(?params, "Launching pick-and-place inference");
        let output = command
            .output()
            .map_err(|e| InferenceError::Launch(e.to_string()))?;

        let elapsed = started.elapsed();
        if output.status.success() {
            tracing::info!(elapsed_s = elapsed.as_secs_f64(), "Inference finished");
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(InferenceError::Failed {
            status: output.status.to_string(),
            stderr: tail(&stderr, STDERR_TAIL_LINES),
        })
    }
}

fn tail(text: &str, lines: usize) -> String {
    let collected: Vec<&str> = text.trim_end().lines().collect();
    let start = collected.len().saturating_sub(lines);
    collected[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tail_keeps_last_lines() {
        assert_eq!(tail("a\nb\nc\nd\n", 2), "c\nd");
        assert_eq!(tail("only", 5), "only");
        assert_eq!(tail("", 3), "");
    }

    #[test]
    fn test_empty_command_is_launch_error() {
        let runner = CommandRunner::new(PolicyConfig {
            command: vec![],
            ..Default::default()
        });
        assert!(matches!(
            runner.run_pick_and_place(&PickAndPlaceParams::default()),
            Err(InferenceError::Launch(_))
        ));
    }

    #[test]
    fn test_default_model_applied() {
        let runner = CommandRunner::new(PolicyConfig {
            command: vec!["infer".into(), "--fast".into()],
            working_dir: None,
            default_model_id: Some("act_carrot".into()),
        });
        let command = runner.build_command(&PickAndPlaceParams::default()).unwrap();
        let args: Vec<_> = command
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(args, vec!["--fast", "--model-id", "act_carrot"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_non_zero_exit_reported() {
        let runner = CommandRunner::new(PolicyConfig {
            command: vec![
                "sh".into(),
                "-c".into(),
                "echo 'motor bus not found' >&2; exit 3".into(),
                "inference".into(),
            ],
            ..Default::default()
        });
        let err = runner
            .run_pick_and_place(&PickAndPlaceParams::default())
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("motor bus not found"), "{message}");
    }

    #[cfg(unix)]
    #[test]
    fn test_success_exit() {
        let runner = CommandRunner::new(PolicyConfig {
            command: vec!["true".into()],
            ..Default::default()
        });
        assert!(runner
            .run_pick_and_place(&PickAndPlaceParams::default())
            .is_ok());
    }
}
