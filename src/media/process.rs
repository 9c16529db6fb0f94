//! Child process execution with a time budget.

use crate::media::error::{PipelineError, Stage};
use std::ffi::OsStr;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Captured result of a finished process
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    /// Standard output
    pub stdout: String,
    /// Standard error
    pub stderr: String,
    /// Exit code, `None` if terminated by a signal
    pub exit_code: Option<i32>,
}

impl ProcessOutput {
    /// Check if the process succeeded (exit code 0)
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.exit_code, Some(0))
    }

    /// Diagnostic text: stderr, or stdout when stderr is empty
    #[must_use]
    pub fn diagnostics(&self) -> &str {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim()
        } else {
            stderr
        }
    }
}

/// Runs `program` with `args`, capturing output.
///
/// The child is killed when the budget runs out.
///
/// # Errors
///
/// Returns [`PipelineError::Io`] if the process cannot be spawned and
/// [`PipelineError::Timeout`] if it does not finish within `budget`.
pub async fn run<I, S>(
    program: &str,
    args: I,
    budget: Duration,
    stage: Stage,
) -> Result<ProcessOutput, PipelineError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!(program, stage = %stage, "Spawning process");
    let child = cmd.spawn().map_err(|e| {
        warn!(program, error = %e, "Failed to spawn process");
        PipelineError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to start '{program}': {e}"),
        ))
    })?;

    // Dropping the future on timeout drops the child, which kills it
    let output = tokio::time::timeout(budget, child.wait_with_output())
        .await
        .map_err(|_| {
            warn!(program, stage = %stage, secs = budget.as_secs(), "Process timed out");
            PipelineError::Timeout {
                stage,
                secs: budget.as_secs(),
            }
        })??;

    let result = ProcessOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        exit_code: output.status.code(),
    };

    debug!(
        program,
        exit_code = ?result.exit_code,
        stdout_len = result.stdout.len(),
        stderr_len = result.stderr.len(),
        "Process completed"
    );
    Ok(result)
}
