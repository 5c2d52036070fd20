//! Typed error hierarchy for the orchestrator.
//!
//! Three enums cover the three failure surfaces:
//! - `LlmError` — a language-model invocation failed
//! - `StepError` — one capability call failed; always recovered by the step runner
//! - `RunError` — the only failures a caller ever sees

use finrouter_common::{ArtifactKind, StepKind};
use thiserror::Error;

/// Errors from invoking a language model.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Request to {provider} failed: {source}")]
    Http {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} returned HTTP {status}: {body}")]
    Status {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("{provider} returned no text")]
    EmptyResponse { provider: &'static str },

    #[error("Missing API key: set {0}")]
    MissingApiKey(&'static str),

    #[error("Failed to spawn model process: {0}")]
    SpawnFailed(#[source] std::io::Error),

    #[error("Model process exited with code {exit_code}: {stderr}")]
    ProcessFailed { exit_code: i32, stderr: String },

    #[error("{provider} does not support {feature}")]
    Unsupported {
        provider: &'static str,
        feature: &'static str,
    },

    #[error("Scripted failure: {0}")]
    Scripted(String),
}

/// Errors from a single step capability. The step runner records these and moves on.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("No capability registered for step {0}")]
    Unregistered(StepKind),

    #[error("Step {kind} requires an uploaded {artifact}")]
    MissingArtifact { kind: StepKind, artifact: ArtifactKind },

    #[error("Failed to read artifact at {path}: {source}")]
    ArtifactRead {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported artifact at {path}: {reason}")]
    UnsupportedArtifact {
        path: std::path::PathBuf,
        reason: String,
    },

    #[error("Step {kind} timed out after {secs}s")]
    TimedOut { kind: StepKind, secs: u64 },

    #[error("Model call failed: {0}")]
    Model(#[from] LlmError),

    #[error("Search failed: {0}")]
    Search(String),

    #[error("{0}")]
    Failed(String),
}

/// Errors surfaced to the caller of a run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Synthesis of {outputs} step outputs failed: {source}")]
    SynthesisFailed {
        outputs: usize,
        #[source]
        source: LlmError,
    },

    #[error("Run did not produce a final response")]
    NoFinalResponse,

    #[error("Run exceeded its deadline of {secs}s")]
    DeadlineExceeded { secs: u64 },
}

impl RunError {
    /// Short machine-readable kind, used in checkpoints and API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            RunError::SynthesisFailed { .. } => "synthesis_failed",
            RunError::NoFinalResponse => "no_final_response",
            RunError::DeadlineExceeded { .. } => "deadline_exceeded",
        }
    }
}
