use anyhow::{Context, Result};
use std::path::PathBuf;

/// Find the git root directory by searching upward from current directory.
pub fn find_git_root() -> Option<PathBuf> {
    let current = std::env::current_dir().ok()?;
    let mut path = current.as_path();

    loop {
        if path.join(".git").exists() {
            return Some(path.to_path_buf());
        }
        path = path.parent()?;
    }
}

/// Resolve the repository the pipeline operates on.
pub fn resolve_repo_root(repo: Option<String>) -> Result<PathBuf> {
    if let Some(path) = repo {
        PathBuf::from(&path)
            .canonicalize()
            .with_context(|| format!("Failed to canonicalize provided repository root: {}", path))
    } else if let Some(root) = find_git_root() {
        Ok(root)
    } else {
        std::env::current_dir().context("Failed to get current directory")
    }
}
