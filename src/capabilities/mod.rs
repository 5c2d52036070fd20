//! Step capabilities and the registry that maps step kinds to them.
//!
//! Every capability receives the same [`StepInput`]: the step's query, the
//! dependency context built from earlier outputs, the older conversation
//! history, and the per-request artifacts. Capabilities differ only in which
//! external calls they make.

pub mod document;
pub mod general;
pub mod image;
pub mod news;
pub mod prompts;
pub mod refiner;

pub use document::DocumentQna;
pub use general::GeneralQna;
pub use image::ImageQna;
pub use news::{NewsQna, NewsSearch, SearchOptions, TavilyClient};
pub use refiner::Refiner;

use crate::errors::StepError;
use crate::history::format_history;
use crate::llm::LanguageModel;
use anyhow::{Result, bail};
use async_trait::async_trait;
use finrouter_common::{ArtifactKind, StepKind, Turn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Uploaded files available to a single run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifacts {
    pub document: Option<PathBuf>,
    pub image: Option<PathBuf>,
}

impl Artifacts {
    pub fn get(&self, kind: ArtifactKind) -> Option<&Path> {
        match kind {
            ArtifactKind::Document => self.document.as_deref(),
            ArtifactKind::Image => self.image.as_deref(),
        }
    }
}

/// Everything a capability is given for one step.
#[derive(Debug, Clone, Default)]
pub struct StepInput {
    pub query: String,
    pub dependency_context: String,
    /// Turns older than the routing window.
    pub history: Vec<Turn>,
    pub artifacts: Artifacts,
}

impl StepInput {
    pub fn history_text(&self) -> String {
        format_history(&self.history)
    }

    /// The shared prompt layout filled from this input.
    pub fn prompt_text(&self) -> String {
        prompts::step_prompt(&self.query, &self.dependency_context, &self.history_text())
    }
}

#[async_trait]
pub trait Capability: Send + Sync {
    async fn execute(&self, input: StepInput) -> Result<String, StepError>;
}

/// Path of the artifact a step needs, or `MissingArtifact`.
pub fn require_artifact(input: &StepInput, kind: StepKind) -> Result<PathBuf, StepError> {
    let Some(artifact) = kind.required_artifact() else {
        return Err(StepError::Failed(format!("{} takes no artifact", kind)));
    };
    input
        .artifacts
        .get(artifact)
        .map(Path::to_path_buf)
        .ok_or(StepError::MissingArtifact { kind, artifact })
}

/// Adapts a plain closure into a capability.
pub struct FnCapability<F> {
    f: F,
}

impl<F> FnCapability<F>
where
    F: Fn(StepInput) -> Result<String, StepError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> Capability for FnCapability<F>
where
    F: Fn(StepInput) -> Result<String, StepError> + Send + Sync,
{
    async fn execute(&self, input: StepInput) -> Result<String, StepError> {
        (self.f)(input)
    }
}

/// Maps each non-terminal step kind to its capability.
#[derive(Default, Clone)]
pub struct StepRegistry {
    capabilities: HashMap<StepKind, Arc<dyn Capability>>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The production set: all five capabilities backed by one model and one search client.
    pub fn standard(
        model: Arc<dyn LanguageModel>,
        search: Arc<dyn NewsSearch>,
        search_options: SearchOptions,
    ) -> Self {
        let mut registry = Self::new();
        registry.insert(StepKind::DocumentQna, Arc::new(DocumentQna::new(model.clone())));
        registry.insert(
            StepKind::News,
            Arc::new(NewsQna::new(model.clone(), search, search_options)),
        );
        registry.insert(StepKind::GeneralQna, Arc::new(GeneralQna::new(model.clone())));
        registry.insert(StepKind::ImageQna, Arc::new(ImageQna::new(model.clone())));
        registry.insert(StepKind::Refiner, Arc::new(Refiner::new(model)));
        registry
    }

    /// Register a capability. The aggregator is terminal and cannot be registered.
    pub fn register(&mut self, kind: StepKind, capability: Arc<dyn Capability>) -> Result<()> {
        if kind.is_terminal() {
            bail!("{} is handled by the orchestrator and cannot be registered", kind);
        }
        self.insert(kind, capability);
        Ok(())
    }

    fn insert(&mut self, kind: StepKind, capability: Arc<dyn Capability>) {
        self.capabilities.insert(kind, capability);
    }

    pub fn get(&self, kind: StepKind) -> Option<Arc<dyn Capability>> {
        self.capabilities.get(&kind).cloned()
    }

    pub fn contains(&self, kind: StepKind) -> bool {
        self.capabilities.contains_key(&kind)
    }

    /// Registered kinds in wire-name order.
    pub fn kinds(&self) -> Vec<StepKind> {
        let mut kinds: Vec<StepKind> = self.capabilities.keys().copied().collect();
        kinds.sort();
        kinds
    }
}
