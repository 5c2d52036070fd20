//! Question answering over an uploaded text document.
//!
//! The document is split into paragraph chunks, chunks are ranked by term
//! overlap with the query, and the best few go to the model as passages.

use super::prompts::DOCUMENT_SYSTEM_PROMPT;
use super::{Capability, StepInput, require_artifact};
use crate::errors::StepError;
use crate::llm::{LanguageModel, Prompt};
use async_trait::async_trait;
use finrouter_common::StepKind;
use std::collections::HashSet;
use std::sync::Arc;

const TARGET_CHUNK_CHARS: usize = 1200;
const TOP_PASSAGES: usize = 4;

pub struct DocumentQna {
    model: Arc<dyn LanguageModel>,
}

impl DocumentQna {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }
}

/// Split on blank lines, then pack paragraphs into chunks near the target size.
fn chunk_paragraphs(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for paragraph in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        if !current.is_empty() && current.len() + paragraph.len() > TARGET_CHUNK_CHARS {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(paragraph);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() > 2)
        .map(|t| t.to_lowercase())
        .collect()
}

/// Indices of the best-matching chunks, in document order. Falls back to the
/// leading chunks when nothing overlaps.
fn select_passages(chunks: &[String], query: &str, limit: usize) -> Vec<usize> {
    let query_terms = terms(query);
    let mut scored: Vec<(usize, usize)> = chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| (i, terms(chunk).intersection(&query_terms).count()))
        .filter(|(_, score)| *score > 0)
        .collect();

    let mut picked: Vec<usize> = if scored.is_empty() {
        (0..chunks.len().min(limit)).collect()
    } else {
        scored.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.into_iter().take(limit).map(|(i, _)| i).collect()
    };
    picked.sort_unstable();
    picked
}

#[async_trait]
impl Capability for DocumentQna {
    async fn execute(&self, input: StepInput) -> Result<String, StepError> {
        let path = require_artifact(&input, StepKind::DocumentQna)?;
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|source| StepError::ArtifactRead {
                path: path.clone(),
                source,
            })?;
        let text = String::from_utf8(bytes).map_err(|_| StepError::UnsupportedArtifact {
            path: path.clone(),
            reason: "document is not UTF-8 text".to_string(),
        })?;

        let chunks = chunk_paragraphs(&text);
        if chunks.is_empty() {
            return Err(StepError::UnsupportedArtifact {
                path,
                reason: "document is empty".to_string(),
            });
        }

        let selection_query = format!("{} {}", input.query, input.dependency_context);
        let mut passages = String::new();
        for (n, index) in select_passages(&chunks, &selection_query, TOP_PASSAGES)
            .into_iter()
            .enumerate()
        {
            passages.push_str(&format!("[{}] {}\n\n", n + 1, chunks[index]));
        }

        let user = format!("{}\n\n--- Document Passages ---\n{}", input.prompt_text(), passages.trim_end());
        let prompt = Prompt::new(user).with_system(DOCUMENT_SYSTEM_PROMPT);
        Ok(self.model.complete(&prompt).await?)
    }
}
