//! Subprocess Runner (spec §2/§4.7/§4.9): launches the package installer,
//! lint, type-check, dev-server, and version-control CLI inside a session
//! directory with streamed output and a hard timeout.
//!
//! Grounded on `examples/EffortlessMetrics-shipper/crates/shipper-cargo/src/lib.rs`'s
//! `cargo_publish`/`CargoOutput` (own-process spawn, timeout-then-kill,
//! captured stdout/stderr) -- the teacher repo never spawns a subprocess, so
//! this pattern is imported from the closest match in the rest of the pack.
//! Adapted to `tokio::process::Command` so output is streamed line-by-line
//! (spec §5: "Subprocess output is streamed, not buffered in-memory except
//! for line scanning") instead of collected after the fact.

use std::path::Path;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum SubprocessError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} timed out after {timeout_secs}s")]
    Timeout { program: String, timeout_secs: u64 },
}

#[derive(Debug, Clone)]
pub struct SubprocessOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl SubprocessOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Runs `program` with `args` inside `cwd`, streaming each stdout/stderr
/// line through `on_line`, bounded by `timeout`. On timeout the child is
/// killed and `timed_out` is set rather than returning an error, so callers
/// (e.g. Verify) can still inspect partial output.
pub async fn run_streaming<F>(
    program: &str,
    args: &[&str],
    cwd: &Path,
    timeout: Duration,
    on_line: F,
) -> Result<SubprocessOutput, SubprocessError>
where
    F: FnMut(&str),
{
    run_streaming_with_env(program, args, cwd, &[], timeout, on_line).await
}

/// Same as [`run_streaming`], with extra environment variables set on the
/// child (used by `git_action` to pin `GIT_CEILING_DIRECTORIES`, spec §4.7).
pub async fn run_streaming_with_env<F>(
    program: &str,
    args: &[&str],
    cwd: &Path,
    envs: &[(&str, &str)],
    timeout: Duration,
    mut on_line: F,
) -> Result<SubprocessOutput, SubprocessError>
where
    F: FnMut(&str),
{
    let mut child = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .envs(envs.iter().copied())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .spawn()
        .map_err(|source| SubprocessError::Spawn {
            program: program.to_string(),
            source,
        })?;

    let stdout = child.stdout.take().expect("piped stdout");
    let stderr = child.stderr.take().expect("piped stderr");
    let mut stdout_lines = BufReader::new(stdout).lines();
    let mut stderr_lines = BufReader::new(stderr).lines();

    let mut out = String::new();
    let mut err = String::new();

    let run = async {
        loop {
            tokio::select! {
                line = stdout_lines.next_line() => {
                    match line {
                        Ok(Some(line)) => {
                            on_line(&line);
                            out.push_str(&line);
                            out.push('\n');
                        }
                        Ok(None) => {}
                        Err(_) => {}
                    }
                }
                line = stderr_lines.next_line() => {
                    match line {
                        Ok(Some(line)) => {
                            on_line(&line);
                            err.push_str(&line);
                            err.push('\n');
                        }
                        Ok(None) => {}
                        Err(_) => {}
                    }
                }
                status = child.wait() => {
                    return status;
                }
            }
        }
    };

    match tokio::time::timeout(timeout, run).await {
        Ok(Ok(status)) => Ok(SubprocessOutput {
            exit_code: status.code(),
            stdout: out,
            stderr: err,
            timed_out: false,
        }),
        Ok(Err(source)) => Err(SubprocessError::Spawn {
            program: program.to_string(),
            source,
        }),
        Err(_) => {
            let _ = child.kill().await;
            let _ = child.wait().await;
            Ok(SubprocessOutput {
                exit_code: None,
                stdout: out,
                stderr: err,
                timed_out: true,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn successful_command_captures_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let output = run_streaming("echo", &["hello"], dir.path(), Duration::from_secs(5), |_| {})
            .await
            .unwrap();
        assert!(output.success());
        assert!(output.stdout.contains("hello"));
    }

    #[tokio::test]
    async fn nonzero_exit_is_not_success() {
        let dir = tempfile::tempdir().unwrap();
        let output = run_streaming("false", &[], dir.path(), Duration::from_secs(5), |_| {})
            .await
            .unwrap();
        assert!(!output.success());
        assert_eq!(output.exit_code, Some(1));
    }

    #[tokio::test]
    async fn slow_command_is_killed_on_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let output = run_streaming(
            "sleep",
            &["5"],
            dir.path(),
            Duration::from_millis(50),
            |_| {},
        )
        .await
        .unwrap();
        assert!(output.timed_out);
        assert!(!output.success());
    }

    #[tokio::test]
    async fn missing_program_yields_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_streaming(
            "definitely-not-a-real-program-xyz",
            &[],
            dir.path(),
            Duration::from_secs(5),
            |_| {},
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SubprocessError::Spawn { .. }));
    }
}
