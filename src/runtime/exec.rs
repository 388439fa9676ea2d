// Artifact execution: the seam between a prepared invocation and a process

use std::path::PathBuf;
use std::process::{Command, Stdio};

use serde_json::Value;
use tracing::debug;

use crate::error::{RunnerError, RunnerResult};
use crate::message::ActionOutput;
use crate::runtime::environment::{InvocationEnvironment, INPUT_ENV_VAR};

/// Everything needed to run the artifact once.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedInvocation {
    pub binary: PathBuf,
    pub env: InvocationEnvironment,
}

impl PreparedInvocation {
    /// The encoded payload bound for this invocation.
    pub fn input(&self) -> &str {
        self.env.get(INPUT_ENV_VAR).map(String::as_str).unwrap_or("{}")
    }
}

/// Runs a prepared invocation. Implementations must be safe to call
/// concurrently for independent invocations.
pub trait ArtifactExecutor: Send + Sync {
    fn execute(&self, invocation: &PreparedInvocation) -> RunnerResult<ActionOutput>;
}

/// Executes the artifact as a child process.
///
/// The child sees only the invocation environment and receives the encoded
/// payload as its single argument. Its result is the JSON object printed on
/// the last non-empty stdout line.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessExecutor;

impl ArtifactExecutor for ProcessExecutor {
    fn execute(&self, invocation: &PreparedInvocation) -> RunnerResult<ActionOutput> {
        let output = Command::new(&invocation.binary)
            .arg(invocation.input())
            .env_clear()
            .envs(&invocation.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| RunnerError::Execution {
                path: invocation.binary.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let exit_code = output.status.code();
        debug!(
            exit_code = ?exit_code,
            stdout_bytes = output.stdout.len(),
            stderr_bytes = output.stderr.len(),
            "artifact exited"
        );

        let (result, logs) = parse_result(&stdout)?;
        Ok(ActionOutput {
            result,
            logs,
            stderr,
            exit_code,
        })
    }
}

/// Split stdout into preceding log lines and the decoded result object.
pub fn parse_result(stdout: &str) -> RunnerResult<(serde_json::Map<String, Value>, Vec<String>)> {
    let mut lines: Vec<&str> = stdout.trim_end().lines().collect();
    let last_line = lines.pop().unwrap_or("").trim();
    if last_line.is_empty() {
        return Err(RunnerError::BadResult {
            last_line: String::new(),
        });
    }

    match serde_json::from_str::<Value>(last_line) {
        Ok(Value::Object(result)) => Ok((result, lines.into_iter().map(str::to_string).collect())),
        _ => Err(RunnerError::BadResult {
            last_line: last_line.to_string(),
        }),
    }
}
