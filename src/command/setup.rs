//! One-time setup: provision the environment and fetch the model, without
//! touching the working tree. Re-running is safe; every step is idempotent.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;

use crate::config::{GenConfig, Storage};
use crate::provision::Provisioner;
use crate::server::ModelServer;

pub async fn run_setup(repo: &Path, storage: &Storage, config: &GenConfig) -> Result<()> {
    // Seed a config template the user can edit.
    if !storage.config_path().exists() {
        storage.save_config(config)?;
        println!("Wrote default config to {:?}", storage.config_path());
    }

    let provisioner = Provisioner::new(
        &config.python_bin,
        storage.venv_dir(config),
        repo.join(&config.requirements),
    );
    provisioner.ensure_environment().await?;
    provisioner.install_dependencies().await?;

    let mut server = ModelServer::new(
        &config.ollama_bin,
        Duration::from_secs(config.ready_grace_secs),
    );
    server.start().await?;
    let pulled = server.pull_model(&config.model).await;
    server.stop().await;
    pulled?;

    println!(
        "✅ Environment ready at {}. Model '{}' is available.",
        provisioner.venv_dir().display(),
        config.model
    );
    Ok(())
}
