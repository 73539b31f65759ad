//! Model server lifecycle.
//!
//! Owns the one long-lived inference server process for a pipeline run.
//! Startup races three event sources: a readiness marker in the server's
//! output, a fixed grace timeout after which readiness is assumed (some
//! server builds print no readiness text), and process exit. Precedence is
//! explicit: exit before readiness always wins and is fatal, regardless of
//! the timer. No other component may terminate the server; teardown paths
//! call `stop()`, with a `Drop` kill as backstop.

use std::time::Duration;

use tokio::process::Child;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, PipelineResult};
use crate::process::{self, CommandSpec};

/// Case-insensitive substring signalling the server accepts requests.
pub const READY_MARKER: &str = "listening on";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    NotStarted,
    Starting,
    Ready,
    Stopped,
}

pub fn is_ready_marker(line: &str) -> bool {
    line.to_lowercase().contains(READY_MARKER)
}

pub struct ModelServer {
    ollama_bin: String,
    grace: Duration,
    state: ServerState,
    child: Option<Child>,
}

impl ModelServer {
    pub fn new(ollama_bin: &str, grace: Duration) -> Self {
        Self {
            ollama_bin: ollama_bin.to_string(),
            grace,
            state: ServerState::NotStarted,
            child: None,
        }
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.child.is_some()
    }

    /// Launch the server and resolve once it is considered ready.
    pub async fn start(&mut self) -> PipelineResult<()> {
        let spec = CommandSpec::new(&self.ollama_bin).arg("serve");
        self.start_with_spec(&spec).await
    }

    async fn start_with_spec(&mut self, spec: &CommandSpec) -> PipelineResult<()> {
        info!("Starting model server...");
        self.state = ServerState::Starting;

        let (mut child, mut lines) = process::spawn_lines(spec)?;

        let grace = tokio::time::sleep(self.grace);
        tokio::pin!(grace);
        let mut lines_open = true;

        loop {
            tokio::select! {
                biased;

                // Exit before readiness wins over marker and timer.
                status = child.wait() => {
                    self.state = ServerState::Stopped;
                    let code = status
                        .map(|s| s.code().unwrap_or(-1))
                        .unwrap_or(-1);
                    return Err(PipelineError::ServerStart { code });
                }

                maybe_line = lines.recv(), if lines_open => {
                    match maybe_line {
                        Some(line) => {
                            debug!("server: {}", line);
                            if is_ready_marker(&line) {
                                debug!("readiness marker seen");
                                break;
                            }
                        }
                        // Streams closed without exit; wait on exit/timer.
                        None => lines_open = false,
                    }
                }

                _ = &mut grace => {
                    debug!("grace timeout elapsed, assuming server is ready");
                    break;
                }
            }
        }

        // Keep draining output so the server never blocks on a full pipe.
        tokio::spawn(async move {
            while let Some(line) = lines.recv().await {
                debug!("server: {}", line);
            }
        });

        self.child = Some(child);
        self.state = ServerState::Ready;
        info!("Model server ready");
        Ok(())
    }

    /// Ensure the model artifact is present. Must complete before generation.
    pub async fn pull_model(&self, model: &str) -> PipelineResult<()> {
        info!("Pulling model '{}'...", model);
        let spec = CommandSpec::new(&self.ollama_bin).arg("pull").arg(model);

        process::run(&spec)
            .await
            .map_err(|e| PipelineError::ModelPull {
                model: model.to_string(),
                reason: e.to_string(),
            })?;

        Ok(())
    }

    /// Terminate the owned server process. Safe to call when nothing is
    /// running; must run on every teardown path of the pipeline.
    pub async fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            debug!("stopping model server");
            if let Err(e) = child.kill().await {
                warn!("Failed to stop model server: {}", e);
            }
        }
        self.state = ServerState::Stopped;
    }
}

impl Drop for ModelServer {
    fn drop(&mut self) {
        // Backstop only; normal teardown goes through stop().
        if let Some(child) = self.child.as_mut() {
            let _ = child.start_kill();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_server(script: &str) -> CommandSpec {
        CommandSpec::new("sh").args(["-c", script])
    }

    #[test]
    fn test_ready_marker_is_case_insensitive() {
        assert!(is_ready_marker("Listening on 127.0.0.1:11434"));
        assert!(is_ready_marker("time=... msg=\"LISTENING ON [::]:11434\""));
        assert!(!is_ready_marker("loading model weights"));
    }

    #[tokio::test]
    async fn test_marker_wins_before_timeout() {
        let mut server = ModelServer::new("unused", Duration::from_secs(30));
        let spec = fake_server("echo 'Listening on 127.0.0.1:11434'; sleep 30");

        // With a 30s grace, only the marker can resolve this quickly.
        server.start_with_spec(&spec).await.unwrap();
        assert_eq!(server.state(), ServerState::Ready);
        assert!(server.is_running());

        server.stop().await;
        assert_eq!(server.state(), ServerState::Stopped);
        assert!(!server.is_running());
    }

    #[tokio::test]
    async fn test_timeout_assumes_ready_without_marker() {
        let mut server = ModelServer::new("unused", Duration::from_millis(100));
        let spec = fake_server("sleep 30");

        server.start_with_spec(&spec).await.unwrap();
        assert_eq!(server.state(), ServerState::Ready);

        server.stop().await;
    }

    #[tokio::test]
    async fn test_premature_exit_is_fatal() {
        let mut server = ModelServer::new("unused", Duration::from_secs(30));
        let spec = fake_server("exit 1");

        let err = server.start_with_spec(&spec).await.unwrap_err();
        match err {
            PipelineError::ServerStart { code } => assert_eq!(code, 1),
            other => panic!("unexpected error: {other:?}"),
        }
        // The handle is released on the failure path.
        assert!(!server.is_running());
        assert_eq!(server.state(), ServerState::Stopped);
    }

    #[tokio::test]
    async fn test_premature_clean_exit_is_also_fatal() {
        // A server that quits immediately is unusable even with exit code 0.
        let mut server = ModelServer::new("unused", Duration::from_secs(30));
        let spec = fake_server("true");

        let err = server.start_with_spec(&spec).await.unwrap_err();
        assert!(matches!(err, PipelineError::ServerStart { code: 0 }));
    }

    #[tokio::test]
    async fn test_stop_without_start_is_noop() {
        let mut server = ModelServer::new("unused", Duration::from_secs(5));
        assert_eq!(server.state(), ServerState::NotStarted);
        server.stop().await;
        assert_eq!(server.state(), ServerState::Stopped);
    }
}
