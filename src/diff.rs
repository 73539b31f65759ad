//! Staged-change collection via the git CLI.
//!
//! Two granularities: one aggregate diff over everything staged, or a
//! per-file enumeration with on-demand isolated diffs. An empty aggregate
//! diff is the "no changes" sentinel, not an error; an empty per-file diff
//! (pure renames and similar path-tracking edge cases) is skipped by the
//! caller rather than terminating the run.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{PipelineError, PipelineResult};
use crate::process::{self, CommandSpec};

/// Whitespace-only diff output means there is nothing staged.
pub fn is_empty_diff(diff: &str) -> bool {
    diff.trim().is_empty()
}

/// Parse `git diff --name-only` output into an ordered list of paths.
pub fn parse_name_only(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

pub struct DiffCollector {
    repo: PathBuf,
}

impl DiffCollector {
    pub fn new(repo: &Path) -> Self {
        Self {
            repo: repo.to_path_buf(),
        }
    }

    async fn git(&self, args: &[&str]) -> PipelineResult<String> {
        let spec = CommandSpec::new("git")
            .args(args.iter().copied())
            .current_dir(&self.repo);
        let output = process::run(&spec)
            .await
            .map_err(|e| PipelineError::DiffCollection(e.to_string()))?;
        Ok(output.stdout)
    }

    /// Full staged diff over the whole change set.
    pub async fn staged_diff(&self) -> PipelineResult<String> {
        self.git(&["diff", "--cached"]).await
    }

    /// Ordered list of files with staged modifications.
    pub async fn changed_files(&self) -> PipelineResult<Vec<String>> {
        let output = self.git(&["diff", "--name-only", "--cached"]).await?;
        let files = parse_name_only(&output);
        debug!("{} staged file(s)", files.len());
        Ok(files)
    }

    /// Isolated staged diff for one file.
    pub async fn file_diff(&self, file: &str) -> PipelineResult<String> {
        self.git(&["diff", "--cached", "--", file]).await
    }
}
