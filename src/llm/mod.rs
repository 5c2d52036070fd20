//! Language-model clients.
//!
//! Every model call in the orchestrator goes through [`LanguageModel`]: the
//! router's planning call, each capability's calls, and the aggregator's
//! synthesis call.

pub mod claude_cli;
pub mod gemini;
pub mod scripted;

pub use claude_cli::ClaudeCliModel;
pub use gemini::GeminiModel;
pub use scripted::ScriptedModel;

use crate::errors::LlmError;
use async_trait::async_trait;

/// Binary content sent inline with a prompt (currently only images).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// One model request: an optional system instruction, the user text and any
/// inline attachments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Prompt {
    pub system: Option<String>,
    pub user: String,
    pub attachments: Vec<Attachment>,
}

impl Prompt {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            system: None,
            user: user.into(),
            attachments: Vec::new(),
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }
}

/// Text-in, text-out model contract.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &str;

    async fn complete(&self, prompt: &Prompt) -> Result<String, LlmError>;
}
