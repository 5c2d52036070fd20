use super::prompts::{IMAGE_ANALYSIS_SYSTEM_PROMPT, QUESTION_REFINEMENT_SYSTEM_PROMPT};
use super::{Capability, StepInput, require_artifact};
use crate::errors::StepError;
use crate::llm::{Attachment, LanguageModel, Prompt};
use async_trait::async_trait;
use finrouter_common::StepKind;
use std::sync::Arc;

/// Answers questions about an uploaded image of a financial document.
///
/// Two model calls: one reduces the step input to a single focused question,
/// the second sends that question with the image inline.
pub struct ImageQna {
    model: Arc<dyn LanguageModel>,
}

impl ImageQna {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Capability for ImageQna {
    async fn execute(&self, input: StepInput) -> Result<String, StepError> {
        let path = require_artifact(&input, StepKind::ImageQna)?;
        let mime = mime_guess::from_path(&path).first_or_octet_stream();
        if mime.type_() != mime_guess::mime::IMAGE {
            return Err(StepError::UnsupportedArtifact {
                path,
                reason: format!("expected an image, found {}", mime),
            });
        }
        let data = tokio::fs::read(&path)
            .await
            .map_err(|source| StepError::ArtifactRead {
                path: path.clone(),
                source,
            })?;

        let refine = Prompt::new(input.prompt_text()).with_system(QUESTION_REFINEMENT_SYSTEM_PROMPT);
        let refined = self.model.complete(&refine).await?;
        let refined = refined.trim();

        let user = format!(
            "Original Input: {}\nRefined Question: {}",
            input.query, refined
        );
        let prompt = Prompt::new(user)
            .with_system(IMAGE_ANALYSIS_SYSTEM_PROMPT)
            .with_attachment(Attachment {
                mime_type: mime.essence_str().to_string(),
                data,
            });
        Ok(self.model.complete(&prompt).await?)
    }
}
