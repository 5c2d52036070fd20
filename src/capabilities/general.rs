use super::prompts::GENERAL_SYSTEM_PROMPT;
use super::{Capability, StepInput};
use crate::errors::StepError;
use crate::llm::{LanguageModel, Prompt};
use async_trait::async_trait;
use std::sync::Arc;

/// Answers general finance and reasoning questions with a single model call.
pub struct GeneralQna {
    model: Arc<dyn LanguageModel>,
}

impl GeneralQna {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Capability for GeneralQna {
    async fn execute(&self, input: StepInput) -> Result<String, StepError> {
        let prompt = Prompt::new(input.prompt_text()).with_system(GENERAL_SYSTEM_PROMPT);
        Ok(self.model.complete(&prompt).await?)
    }
}
