use super::prompts::REFINER_SYSTEM_PROMPT;
use super::{Capability, StepInput};
use crate::errors::StepError;
use crate::llm::{LanguageModel, Prompt};
use async_trait::async_trait;
use std::sync::Arc;

/// Summarizes, rephrases or elaborates earlier content. Usually planned with
/// dependencies on the steps whose output it reworks, or for follow-ups that
/// quote prior answers in the query.
pub struct Refiner {
    model: Arc<dyn LanguageModel>,
}

impl Refiner {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Capability for Refiner {
    async fn execute(&self, input: StepInput) -> Result<String, StepError> {
        if input.query.trim().is_empty() && input.dependency_context.trim().is_empty() {
            return Err(StepError::Failed("nothing to refine".to_string()));
        }
        let prompt = Prompt::new(input.prompt_text()).with_system(REFINER_SYSTEM_PROMPT);
        Ok(self.model.complete(&prompt).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedModel;

    #[tokio::test]
    async fn test_refiner_uses_dependency_context() {
        let model = Arc::new(ScriptedModel::with_default("Short version."));
        let out = Refiner::new(model.clone())
            .execute(StepInput {
                query: "Shorten this".into(),
                dependency_context: "Dependency: Document_qna output: long text\n".into(),
                ..StepInput::default()
            })
            .await
            .unwrap();
        assert_eq!(out, "Short version.");
        assert!(model.prompts()[0].user.contains("long text"));
    }

    #[tokio::test]
    async fn test_refiner_rejects_empty_input_without_model_call() {
        let model = Arc::new(ScriptedModel::with_default("x"));
        let err = Refiner::new(model.clone())
            .execute(StepInput::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StepError::Failed(_)));
        assert_eq!(model.call_count(), 0);
    }
}
