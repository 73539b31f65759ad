//! Environment provisioning for the model-invocation script.
//!
//! The invocation script runs inside an isolated virtual environment.
//! Provisioning is idempotent: a pre-existing environment is a no-op, and a
//! missing dependency manifest is tolerated with a warning. Any nonzero exit
//! here is fatal and aborts the run before a model call is ever attempted.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{PipelineError, PipelineResult};
use crate::process::{self, CommandSpec};

pub struct Provisioner {
    python_bin: String,
    venv_dir: PathBuf,
    requirements: PathBuf,
}

impl Provisioner {
    /// `requirements` must already be resolved against the repository root.
    pub fn new(python_bin: &str, venv_dir: PathBuf, requirements: PathBuf) -> Self {
        Self {
            python_bin: python_bin.to_string(),
            venv_dir,
            requirements,
        }
    }

    pub fn venv_dir(&self) -> &Path {
        &self.venv_dir
    }

    /// Interpreter inside the virtual environment, used for generation.
    pub fn venv_python(&self) -> PathBuf {
        self.venv_dir.join("bin").join("python")
    }

    fn venv_pip(&self) -> PathBuf {
        self.venv_dir.join("bin").join("pip")
    }

    /// Create the virtual environment if it does not exist yet.
    pub async fn ensure_environment(&self) -> PipelineResult<()> {
        if self.venv_dir.exists() {
            debug!("virtual environment already present at {:?}", self.venv_dir);
            return Ok(());
        }

        info!("Creating virtual environment at {:?}...", self.venv_dir);
        let spec = CommandSpec::new(&self.python_bin)
            .args(["-m", "venv"])
            .arg(self.venv_dir.to_string_lossy());

        process::run(&spec)
            .await
            .map_err(|e| PipelineError::Setup(format!("could not create environment: {e}")))?;

        Ok(())
    }

    /// Install declared dependencies into the environment.
    ///
    /// A missing manifest is skipped with a warning, not a failure. Install
    /// output streams through to the terminal since it is not consumed
    /// programmatically.
    pub async fn install_dependencies(&self) -> PipelineResult<()> {
        if !self.requirements.exists() {
            warn!(
                "No dependency manifest at {:?}, skipping install",
                self.requirements
            );
            return Ok(());
        }

        info!("Installing dependencies from {:?}...", self.requirements);
        let spec = CommandSpec::new(self.venv_pip().to_string_lossy())
            .args(["install", "-r"])
            .arg(self.requirements.to_string_lossy())
            .inherit_output();

        process::run(&spec)
            .await
            .map_err(|e| PipelineError::Setup(format!("dependency install failed: {e}")))?;

        Ok(())
    }
}
