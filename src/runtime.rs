//! Wires configured collaborators into an [`Orchestrator`].

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::capabilities::news::StaticSearch;
use crate::capabilities::{NewsSearch, StepRegistry, TavilyClient};
use crate::checkpoint::{CheckpointDb, CheckpointHandle};
use crate::errors::LlmError;
use crate::finrouter_config::{FinrouterConfig, LlmProvider, MemoryProvider};
use crate::llm::{ClaudeCliModel, GeminiModel, LanguageModel};
use crate::memory::{InMemoryStore, Mem0Client, MemoryStore};
use crate::orchestrator::Orchestrator;
use crate::uploads::UploadStore;

pub fn build_model(config: &FinrouterConfig) -> Result<Arc<dyn LanguageModel>> {
    let llm = &config.toml.llm;
    match llm.provider {
        LlmProvider::Gemini => {
            let key = config
                .secrets
                .google_api_key
                .clone()
                .ok_or(LlmError::MissingApiKey("GOOGLE_API_KEY"))?;
            Ok(Arc::new(GeminiModel::new(key, llm.model.clone(), llm.temperature)))
        }
        LlmProvider::ClaudeCli => Ok(Arc::new(ClaudeCliModel::new(config.claude_cmd()))),
    }
}

pub fn build_memory(config: &FinrouterConfig) -> Result<Arc<dyn MemoryStore>> {
    match config.toml.memory.provider {
        MemoryProvider::Mem0 => {
            let key = config
                .secrets
                .mem0_api_key
                .clone()
                .context("MEM0_API_KEY is not set; set it or use memory.provider = \"local\"")?;
            Ok(Arc::new(Mem0Client::new(key)))
        }
        MemoryProvider::Local => Ok(Arc::new(InMemoryStore::new())),
    }
}

/// Without a Tavily key every news step fails with a search error.
pub fn build_search(config: &FinrouterConfig) -> Arc<dyn NewsSearch> {
    match &config.secrets.tavily_api_key {
        Some(key) => Arc::new(TavilyClient::new(key.clone())),
        None => {
            tracing::warn!("TAVILY_API_KEY is not set; news steps will fail");
            Arc::new(StaticSearch::failing("TAVILY_API_KEY is not set"))
        }
    }
}

pub fn build_orchestrator(config: &FinrouterConfig) -> Result<Orchestrator> {
    let model = build_model(config)?;
    let memory = build_memory(config)?;
    let registry = StepRegistry::standard(model.clone(), build_search(config), config.toml.search_options());

    let mut orchestrator = Orchestrator::new(model, registry, memory, config.toml.orchestrator_settings());
    if config.toml.orchestrator.checkpoints {
        let db = CheckpointDb::new(&config.checkpoint_db()).context("Failed to open checkpoint database")?;
        orchestrator = orchestrator.with_checkpoints(CheckpointHandle::new(db));
    }

    tracing::info!(
        llm = %config.toml.llm.provider,
        memory = %config.toml.memory.provider,
        checkpoints = config.toml.orchestrator.checkpoints,
        "Orchestrator ready"
    );
    Ok(orchestrator)
}

pub fn build_uploads(config: &FinrouterConfig) -> UploadStore {
    UploadStore::new(config.uploads_dir())
}
