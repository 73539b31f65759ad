//! Error taxonomy for the generation pipeline.
//!
//! Fatal errors abort the whole run; the server teardown still executes on
//! every error path (see `command::generate`). Two outcomes that look like
//! errors deliberately are not: an empty change set and a user declining a
//! review prompt are ordinary terminal states and never surface here.

use thiserror::Error;

use crate::process::ProcessError;

/// Fatal pipeline failures, grouped by the stage that produced them.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Environment creation or dependency install failed. Aborts before any
    /// model invocation is attempted.
    #[error("environment setup failed: {0}")]
    Setup(String),

    /// The model server exited before it became ready.
    #[error("model server exited with code {code} before becoming ready")]
    ServerStart { code: i32 },

    /// The model artifact could not be pulled.
    #[error("failed to pull model '{model}': {reason}")]
    ModelPull { model: String, reason: String },

    /// A git query failed.
    #[error("diff collection failed: {0}")]
    DiffCollection(String),

    /// The model-invocation process exited nonzero for one diff unit.
    /// In per-file mode this fails only that file's entry, not the batch.
    #[error("generation failed for {unit} (exit code {code})")]
    ModelInvocation {
        unit: String,
        code: i32,
        stderr: String,
    },

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
