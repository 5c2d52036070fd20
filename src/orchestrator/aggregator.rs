use crate::errors::RunError;
use crate::history::format_history;
use crate::llm::{LanguageModel, Prompt};
use finrouter_common::Turn;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const NO_OUTPUTS_SENTINEL: &str = "No agent outputs to aggregate.";

const SYNTHESIS_SYSTEM_PROMPT: &str = "You are an expert at synthesizing information from multiple sources.";

/// What the aggregator reads from a finished run.
#[derive(Debug, Clone)]
pub struct AggregationInput<'a> {
    pub request: &'a str,
    pub routing_rationale: &'a str,
    /// Step outputs keyed by wire name.
    pub outputs: BTreeMap<String, String>,
    pub recent_history: &'a [Turn],
    pub memory_summary: &'a str,
}

/// Folds step outputs into the final response.
pub struct Aggregator {
    model: Arc<dyn LanguageModel>,
}

impl Aggregator {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    pub async fn aggregate(&self, input: &AggregationInput<'_>) -> Result<String, RunError> {
        if input.outputs.is_empty() {
            return Ok(NO_OUTPUTS_SENTINEL.to_string());
        }
        if input.outputs.len() == 1
            && let Some(only) = input.outputs.values().next()
        {
            return Ok(only.clone());
        }

        let prompt = Prompt::new(synthesis_prompt(input)).with_system(SYNTHESIS_SYSTEM_PROMPT);
        self.model.complete(&prompt).await.map_err(|source| {
            tracing::error!(error = %source, outputs = input.outputs.len(), "Synthesis failed");
            RunError::SynthesisFailed {
                outputs: input.outputs.len(),
                source,
            }
        })
    }
}

fn synthesis_prompt(input: &AggregationInput<'_>) -> String {
    let responses = serde_json::to_string_pretty(&input.outputs).unwrap_or_default();
    format!(
        "You are an expert output aggregator. Along with the initial query you are given the \
         responses from the tools, the previous conversation history and past memories related \
         to the user. Combine them into a coherent, comprehensive answer to the initial query, \
         taking the conversation history into account where needed.\n\n\
         Initial query: {}\n\
         Routing reasoning: {}\n\n\
         Responses:\n{}\n\n\
         Conversation history: {}\n\n\
         Past memories: {}\n\n\
         Create a unified response that integrates insights from all the responses and the \
         conversation history if needed, while avoiding redundancy.",
        input.request,
        input.routing_rationale,
        responses,
        format_history(input.recent_history),
        input.memory_summary
    )
}
