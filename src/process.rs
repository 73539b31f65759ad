//! External process execution.
//!
//! Every external collaborator (git, the venv tooling, the model server, the
//! invocation script) goes through this module. Two interaction modes exist:
//!
//! - `Collect`: stdout/stderr are buffered and returned; nonzero exit fails.
//!   Policy: stderr content on a zero-exit run is surfaced as a warning and
//!   does not fail the operation, since several of our collaborators write
//!   informational text there.
//! - `Inherit`: the child shares the parent's stdio. Used where output is not
//!   needed programmatically (dependency install) to avoid buffering it.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    /// Buffer stdout/stderr and return them.
    Collect,
    /// Pass the parent's stdio through to the child.
    Inherit,
}

/// Explicit description of a command to run: program, ordered arguments,
/// working directory, and capture mode.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    capture: CaptureMode,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            capture: CaptureMode::Collect,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn inherit_output(mut self) -> Self {
        self.capture = CaptureMode::Inherit;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }
        cmd
    }
}

// Bounded so one noisy collaborator cannot flood an error message.
const STDERR_EXCERPT_MAX: usize = 300;

fn stderr_excerpt(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let excerpt: String = trimmed.chars().take(STDERR_EXCERPT_MAX).collect();
    format!(": {excerpt}")
}

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to launch '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' exited with code {code}{}", stderr_excerpt(.stderr))]
    NonZeroExit {
        program: String,
        code: i32,
        stderr: String,
    },
}

/// Buffered output of a completed `Collect`-mode command.
#[derive(Debug, Default)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Run a command to completion and resolve on zero exit.
pub async fn run(spec: &CommandSpec) -> Result<ProcessOutput, ProcessError> {
    debug!("running: {} {:?}", spec.program, spec.args);

    match spec.capture {
        CaptureMode::Collect => run_collect(spec).await,
        CaptureMode::Inherit => run_inherit(spec).await,
    }
}

async fn run_collect(spec: &CommandSpec) -> Result<ProcessOutput, ProcessError> {
    let output = spec
        .command()
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|source| ProcessError::Spawn {
            program: spec.program.clone(),
            source,
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if !output.status.success() {
        return Err(ProcessError::NonZeroExit {
            program: spec.program.clone(),
            code: output.status.code().unwrap_or(-1),
            stderr,
        });
    }

    if !stderr.trim().is_empty() {
        warn!("{} wrote to stderr: {}", spec.program, stderr.trim());
    }

    Ok(ProcessOutput { stdout, stderr })
}

async fn run_inherit(spec: &CommandSpec) -> Result<ProcessOutput, ProcessError> {
    let status = spec
        .command()
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .await
        .map_err(|source| ProcessError::Spawn {
            program: spec.program.clone(),
            source,
        })?;

    if !status.success() {
        return Err(ProcessError::NonZeroExit {
            program: spec.program.clone(),
            code: status.code().unwrap_or(-1),
            stderr: String::new(),
        });
    }

    Ok(ProcessOutput::default())
}

/// Spawn a long-lived command and stream its merged stdout/stderr line by
/// line over a channel. The caller keeps ownership of the child for
/// waiting/killing; the channel closes when both streams end.
pub fn spawn_lines(
    spec: &CommandSpec,
) -> Result<(Child, mpsc::UnboundedReceiver<String>), ProcessError> {
    let mut child = spec
        .command()
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ProcessError::Spawn {
            program: spec.program.clone(),
            source,
        })?;

    let (tx, rx) = mpsc::unbounded_channel();

    if let Some(stdout) = child.stdout.take() {
        let tx = tx.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
    }

    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
    }

    Ok((child, rx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_collect_success() {
        let spec = CommandSpec::new("sh").args(["-c", "printf hello"]);
        let output = run(&spec).await.unwrap();
        assert_eq!(output.stdout, "hello");
    }

    #[tokio::test]
    async fn test_run_collect_nonzero_exit() {
        let spec = CommandSpec::new("sh").args(["-c", "echo oops >&2; exit 3"]);
        let err = run(&spec).await.unwrap_err();
        match err {
            ProcessError::NonZeroExit { code, stderr, .. } => {
                assert_eq!(code, 3);
                assert!(stderr.contains("oops"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_run_collect_stderr_does_not_fail() {
        // Informational stderr text on zero exit is a warning, not a failure.
        let spec = CommandSpec::new("sh").args(["-c", "echo note >&2; printf ok"]);
        let output = run(&spec).await.unwrap();
        assert_eq!(output.stdout, "ok");
        assert!(output.stderr.contains("note"));
    }

    #[tokio::test]
    async fn test_run_spawn_failure() {
        let spec = CommandSpec::new("definitely-not-a-real-binary-xyz");
        let err = run(&spec).await.unwrap_err();
        assert!(matches!(err, ProcessError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_spawn_lines_streams_output() {
        let spec = CommandSpec::new("sh").args(["-c", "echo one; echo two >&2"]);
        let (mut child, mut rx) = spawn_lines(&spec).unwrap();

        let mut lines = Vec::new();
        while let Some(line) = rx.recv().await {
            lines.push(line);
        }
        let status = child.wait().await.unwrap();

        assert!(status.success());
        lines.sort();
        assert_eq!(lines, vec!["one".to_string(), "two".to_string()]);
    }

    #[test]
    fn test_nonzero_exit_display_includes_stderr() {
        let err = ProcessError::NonZeroExit {
            program: "git".to_string(),
            code: 128,
            stderr: "fatal: not a git repository\n".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "'git' exited with code 128: fatal: not a git repository"
        );

        // Nothing captured (Inherit mode) keeps the message short.
        let silent = ProcessError::NonZeroExit {
            program: "pip".to_string(),
            code: 1,
            stderr: "  \n".to_string(),
        };
        assert_eq!(silent.to_string(), "'pip' exited with code 1");
    }

    #[test]
    fn test_command_spec_builder() {
        let spec = CommandSpec::new("git")
            .arg("diff")
            .args(["--cached", "--name-only"])
            .current_dir("/tmp");
        assert_eq!(spec.program(), "git");
        assert_eq!(spec.args, vec!["diff", "--cached", "--name-only"]);
        assert_eq!(spec.capture, CaptureMode::Collect);
        assert_eq!(spec.inherit_output().capture, CaptureMode::Inherit);
    }
}
