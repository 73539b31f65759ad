//! Message generation via the external model-invocation script.
//!
//! One spawn per diff unit: the prompt is written to the script's stdin, the
//! stream is closed, and everything the script prints on stdout becomes the
//! generated message. Invocations are sequential so only one model-server
//! connection is in flight at a time. Accumulation of output chunks is an
//! explicit reducer (`fold_chunks`) kept independent of process spawning.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::debug;

use crate::error::{PipelineError, PipelineResult};
use crate::process::ProcessError;

/// Text produced by one invocation, attributed to a file in per-file mode.
#[derive(Debug, Clone)]
pub struct GeneratedMessage {
    pub file: Option<String>,
    pub raw: String,
}

impl GeneratedMessage {
    /// Whitespace removed from both ends; internal whitespace preserved.
    pub fn trimmed(&self) -> &str {
        self.raw.trim()
    }
}

/// Fold a sequence of output chunks into a finalized message.
pub fn fold_chunks<I>(file: Option<String>, chunks: I) -> GeneratedMessage
where
    I: IntoIterator<Item = String>,
{
    let mut raw = String::new();
    for chunk in chunks {
        raw.push_str(&chunk);
    }
    GeneratedMessage { file, raw }
}

async fn read_chunks<R: AsyncRead + Unpin>(mut reader: R) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => chunks.push(String::from_utf8_lossy(&buf[..n]).into_owned()),
        }
    }
    chunks
}

pub struct MessageGenerator {
    python: PathBuf,
    script: PathBuf,
    repo: PathBuf,
    output_txt: PathBuf,
    output_csv: PathBuf,
    temperature: f32,
}

impl MessageGenerator {
    /// `python` is the venv interpreter; `script` and `repo` are absolute.
    /// `output_txt` and `output_csv` are the artifact files the script is
    /// told to write.
    pub fn new(
        python: PathBuf,
        script: PathBuf,
        repo: &Path,
        output_txt: PathBuf,
        output_csv: PathBuf,
        temperature: f32,
    ) -> Self {
        Self {
            python,
            script,
            repo: repo.to_path_buf(),
            output_txt,
            output_csv,
            temperature,
        }
    }

    /// Run one invocation for one diff unit.
    pub async fn generate(
        &self,
        prompt: &str,
        file: Option<&str>,
    ) -> PipelineResult<GeneratedMessage> {
        let unit = file.unwrap_or("staged changes").to_string();
        debug!("invoking generator for {}", unit);

        let mut child = Command::new(&self.python)
            .arg(&self.script)
            .arg("--sequential")
            .arg("--temperature")
            .arg(self.temperature.to_string())
            .arg("--output_txt")
            .arg(&self.output_txt)
            .arg("--output_csv")
            .arg(&self.output_csv)
            .current_dir(&self.repo)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                program: self.python.to_string_lossy().into_owned(),
                source,
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| PipelineError::Io(std::io::Error::new(std::io::ErrorKind::Other, "stdin not captured")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PipelineError::Io(std::io::Error::new(std::io::ErrorKind::Other, "stdout not captured")))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| PipelineError::Io(std::io::Error::new(std::io::ErrorKind::Other, "stderr not captured")))?;

        // Feed the prompt concurrently with reading so a prompt larger than
        // the pipe buffer cannot deadlock either side. Dropping stdin closes
        // the stream and lets the script see end-of-input.
        let prompt_bytes = prompt.as_bytes().to_vec();
        let writer = tokio::spawn(async move {
            let _ = stdin.write_all(&prompt_bytes).await;
        });

        let (chunks, err_chunks, status) =
            tokio::join!(read_chunks(stdout), read_chunks(stderr), child.wait());
        let _ = writer.await;

        let status = status?;
        let message = fold_chunks(file.map(str::to_string), chunks);

        if !status.success() {
            return Err(PipelineError::ModelInvocation {
                unit,
                code: status.code().unwrap_or(-1),
                stderr: err_chunks.concat().trim().to_string(),
            });
        }

        debug!("generator produced {} bytes for {}", message.raw.len(), unit);
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_fold_chunks_concatenates_in_order() {
        let message = fold_chunks(
            None,
            vec!["Add ".to_string(), "retry ".to_string(), "logic\n".to_string()],
        );
        assert_eq!(message.raw, "Add retry logic\n");
        assert_eq!(message.trimmed(), "Add retry logic");
        assert!(message.file.is_none());
    }

    #[test]
    fn test_fold_chunks_empty_stream() {
        let message = fold_chunks(Some("a.py".to_string()), Vec::<String>::new());
        assert_eq!(message.raw, "");
        assert_eq!(message.trimmed(), "");
        assert_eq!(message.file.as_deref(), Some("a.py"));
    }

    #[test]
    fn test_trimmed_preserves_internal_whitespace() {
        let message = fold_chunks(None, vec!["  Fix a bug\n\nin two places  \n".to_string()]);
        assert_eq!(message.trimmed(), "Fix a bug\n\nin two places");
    }

    fn fake_generator(tmp: &tempfile::TempDir, script_body: &str) -> MessageGenerator {
        let script = tmp.path().join("fake.sh");
        std::fs::write(&script, script_body).unwrap();
        MessageGenerator::new(
            PathBuf::from("sh"),
            script,
            tmp.path(),
            tmp.path().join("generated.txt"),
            tmp.path().join("generated.csv"),
            0.7,
        )
    }

    #[tokio::test]
    async fn test_generate_collects_stdout() {
        let tmp = tempdir().unwrap();
        // Consumes the prompt, then emits a message with stray whitespace.
        let generator = fake_generator(&tmp, "cat > /dev/null\nprintf '  Add feature X\\n'\n");

        let message = generator.generate("prompt text", Some("a.py")).await.unwrap();
        assert_eq!(message.trimmed(), "Add feature X");
        assert_eq!(message.file.as_deref(), Some("a.py"));
    }

    #[tokio::test]
    async fn test_generate_nonzero_exit_fails_with_stderr() {
        let tmp = tempdir().unwrap();
        let generator = fake_generator(&tmp, "cat > /dev/null\necho broken >&2\nexit 5\n");

        let err = generator.generate("prompt", None).await.unwrap_err();
        match err {
            PipelineError::ModelInvocation { unit, code, stderr } => {
                assert_eq!(unit, "staged changes");
                assert_eq!(code, 5);
                assert_eq!(stderr, "broken");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_generate_large_prompt_does_not_deadlock() {
        let tmp = tempdir().unwrap();
        // Echoes the prompt's byte count; forces full stdin consumption.
        let generator = fake_generator(&tmp, "wc -c\n");

        let prompt = "x".repeat(256 * 1024);
        let message = generator.generate(&prompt, None).await.unwrap();
        assert_eq!(message.trimmed(), (256 * 1024).to_string());
    }
}
