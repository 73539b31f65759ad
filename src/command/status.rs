//! Readiness report: what is in place and what a run would still need.

use std::path::Path;

use anyhow::Result;

use crate::config::{GenConfig, Storage};

fn mark(ok: bool) -> &'static str {
    if ok {
        "✅"
    } else {
        "❌"
    }
}

pub fn run_status(repo: &Path, storage: &Storage, config: &GenConfig) -> Result<()> {
    println!("Repository:    {}", repo.display());
    println!("Storage dir:   {}", storage.base_dir().display());
    println!(
        "Config file:   {} {}",
        mark(storage.config_path().exists()),
        storage.config_path().display()
    );
    println!("Model:         {}", config.model);

    let venv = storage.venv_dir(config);
    println!("Environment:   {} {}", mark(venv.exists()), venv.display());

    let manifest = repo.join(&config.requirements);
    println!(
        "Manifest:      {} {} (optional)",
        mark(manifest.exists()),
        manifest.display()
    );

    let script = repo.join(&config.generator_script);
    println!("Script:        {} {}", mark(script.exists()), script.display());

    for binary in [config.ollama_bin.as_str(), config.python_bin.as_str(), "git"] {
        match which::which(binary) {
            Ok(path) => println!("{:<14} ✅ {}", format!("{}:", binary), path.display()),
            Err(_) => println!("{:<14} ❌ not found on PATH", format!("{}:", binary)),
        }
    }

    Ok(())
}
