//! The generation pipeline.
//!
//! Strictly sequenced: provision the environment, start the model server,
//! pull the model, collect the staged changes, then prompt/generate/review.
//! Exactly one changed file takes the aggregate path; two or more take the
//! per-file path. Generation is separated from review so the pipeline can
//! run to a reviewable result without touching stdin. Server teardown runs
//! on every exit path, including errors raised by any later stage.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, warn};

use crate::config::{GenConfig, Storage};
use crate::diff::{self, DiffCollector};
use crate::error::PipelineError;
use crate::generator::{GeneratedMessage, MessageGenerator};
use crate::prompt::{build_prompt, PromptScope};
use crate::provision::Provisioner;
use crate::review::{self, ReviewEntry};
use crate::server::ModelServer;

pub async fn run_generate(repo: &Path, storage: &Storage, config: &GenConfig) -> Result<()> {
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

    // The server must come down whether the rest of the pipeline succeeds
    // or not; Drop only backstops abnormal unwinds.
    let result = generate_with_server(repo, storage, config, &provisioner, &server).await;
    server.stop().await;
    result
}

async fn generate_with_server(
    repo: &Path,
    storage: &Storage,
    config: &GenConfig,
    provisioner: &Provisioner,
    server: &ModelServer,
) -> Result<()> {
    server.pull_model(&config.model).await?;

    let collector = DiffCollector::new(repo);
    let generator = MessageGenerator::new(
        provisioner.venv_python(),
        repo.join(&config.generator_script),
        repo,
        storage.artifact_path("generated.txt"),
        storage.artifact_path("generated.csv"),
        config.temperature,
    );

    match generate_messages(&collector, &generator, config).await? {
        Generated::Nothing => {
            println!("No staged changes found.");
            Ok(())
        }
        Generated::Aggregate(message) => {
            review::review_aggregate(&message)?;
            Ok(())
        }
        Generated::PerFile(entries) => {
            review::review_batch(&entries)?;
            Ok(())
        }
    }
}

/// What the pipeline produced, ready for review.
enum Generated {
    Nothing,
    Aggregate(GeneratedMessage),
    PerFile(Vec<ReviewEntry>),
}

async fn generate_messages(
    collector: &DiffCollector,
    generator: &MessageGenerator,
    config: &GenConfig,
) -> Result<Generated> {
    let files = collector.changed_files().await?;
    if files.is_empty() {
        return Ok(Generated::Nothing);
    }

    if files.len() == 1 {
        let diff_text = collector.staged_diff().await?;
        if diff::is_empty_diff(&diff_text) {
            return Ok(Generated::Nothing);
        }

        let prompt = build_prompt(&diff_text, &config.exemplars, &PromptScope::Aggregate);
        let message = generator.generate(&prompt, None).await?;
        return Ok(Generated::Aggregate(message));
    }

    let entries = collect_per_file(collector, generator, config, &files).await?;
    if entries.is_empty() {
        return Ok(Generated::Nothing);
    }
    Ok(Generated::PerFile(entries))
}

async fn collect_per_file(
    collector: &DiffCollector,
    generator: &MessageGenerator,
    config: &GenConfig,
    files: &[String],
) -> Result<Vec<ReviewEntry>> {
    let mut entries: Vec<ReviewEntry> = Vec::new();

    for file in files {
        let diff_text = collector.file_diff(file).await?;
        if diff::is_empty_diff(&diff_text) {
            // Pure renames and similar cases produce no per-file diff.
            debug!("skipping {} (empty diff)", file);
            continue;
        }

        let scope = PromptScope::PerFile(file.clone());
        let prompt = build_prompt(&diff_text, &config.exemplars, &scope);

        match generator.generate(&prompt, Some(file)).await {
            Ok(message) => entries.push(ReviewEntry {
                file: file.clone(),
                result: Ok(message),
            }),
            // One file failing to generate does not abort its siblings; it
            // stays in the review list marked as failed.
            Err(e @ PipelineError::ModelInvocation { .. }) => {
                warn!("{}", e);
                entries.push(ReviewEntry {
                    file: file.clone(),
                    result: Err(e.to_string()),
                });
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(entries)
}
