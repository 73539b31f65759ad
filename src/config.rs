//! Configuration and artifact storage.
//!
//! Settings live in `config.json` under the storage directory, which defaults
//! to `~/.commitgen` and can be overridden with the `COMMITGEN_HOME`
//! environment variable or the `--cache-dir` flag. The same directory holds
//! transient artifacts written by the generator script.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Environment variable overriding the storage directory.
pub const HOME_ENV: &str = "COMMITGEN_HOME";

/// User-tunable generation settings. Every field has a default so a missing
/// or partial config file is never an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenConfig {
    /// Model name passed to the server's pull command.
    pub model: String,
    /// Sampling temperature forwarded to the invocation script.
    pub temperature: f32,
    /// Exemplar commit messages, ordered by descending influence. Empty means
    /// the baseline prompt is used instead of the few-shot one.
    pub exemplars: Vec<String>,
    /// Interpreter used to create the virtual environment.
    pub python_bin: String,
    /// Model server binary.
    pub ollama_bin: String,
    /// Virtual environment directory. Defaults to `<storage>/venv`.
    pub venv_dir: Option<PathBuf>,
    /// Dependency manifest, relative to the repository root. Its absence is
    /// tolerated (install is skipped with a warning).
    pub requirements: PathBuf,
    /// Model-invocation script, relative to the repository root.
    pub generator_script: PathBuf,
    /// Grace period in seconds after which server readiness is assumed even
    /// without a readiness marker.
    pub ready_grace_secs: u64,
}

impl Default for GenConfig {
    fn default() -> Self {
        Self {
            model: "mistral".to_string(),
            temperature: 0.7,
            exemplars: Vec::new(),
            python_bin: "python3".to_string(),
            ollama_bin: "ollama".to_string(),
            venv_dir: None,
            requirements: PathBuf::from("requirements.txt"),
            generator_script: PathBuf::from("src/main.py"),
            ready_grace_secs: 5,
        }
    }
}

/// Creatable storage directory for config and transient artifacts.
pub struct Storage {
    base_dir: PathBuf,
}

impl Storage {
    /// Resolve the storage directory.
    ///
    /// Priority: explicit `cache_dir` argument, then `COMMITGEN_HOME`, then
    /// `~/.commitgen`. The directory is created if absent.
    pub fn new(cache_dir: Option<String>) -> Result<Self> {
        let base_dir = match cache_dir {
            Some(dir) => PathBuf::from(dir),
            None => match std::env::var(HOME_ENV) {
                Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
                _ => dirs::home_dir()
                    .context("Could not determine home directory")?
                    .join(".commitgen"),
            },
        };

        std::fs::create_dir_all(&base_dir)
            .with_context(|| format!("Failed to create storage directory: {:?}", base_dir))?;

        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn config_path(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Path for a transient artifact file (e.g. the generator's output file).
    pub fn artifact_path(&self, name: &str) -> PathBuf {
        self.base_dir.join(name)
    }

    /// Virtual environment directory for the given config.
    pub fn venv_dir(&self, config: &GenConfig) -> PathBuf {
        config
            .venv_dir
            .clone()
            .unwrap_or_else(|| self.base_dir.join("venv"))
    }

    /// Load the config file, falling back to defaults when it is missing.
    /// An unreadable or invalid file is downgraded to defaults with a
    /// warning rather than failing the run.
    pub fn load_config(&self) -> GenConfig {
        let path = self.config_path();
        if !path.exists() {
            debug!("no config file at {:?}, using defaults", path);
            return GenConfig::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<GenConfig>(&content) {
                Ok(config) => config,
                Err(e) => {
                    warn!("Failed to parse {:?}: {}. Using defaults.", path, e);
                    GenConfig::default()
                }
            },
            Err(e) => {
                warn!("Failed to read {:?}: {}. Using defaults.", path, e);
                GenConfig::default()
            }
        }
    }

    /// Write the config file (used to seed a template on `setup`).
    pub fn save_config(&self, config: &GenConfig) -> Result<()> {
        let content =
            serde_json::to_string_pretty(config).context("Failed to serialize config")?;
        std::fs::write(self.config_path(), content)
            .with_context(|| format!("Failed to write config file: {:?}", self.config_path()))?;
        Ok(())
    }
}
