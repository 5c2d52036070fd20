//! Model backed by the `claude` CLI in print mode.

use super::{LanguageModel, Prompt};
use crate::errors::LlmError;
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;

const PROVIDER: &str = "claude-cli";

pub struct ClaudeCliModel {
    command: String,
}

impl ClaudeCliModel {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// Uses `CLAUDE_CMD` when set, otherwise `claude` on the PATH.
    pub fn from_env() -> Self {
        Self::new(std::env::var("CLAUDE_CMD").unwrap_or_else(|_| "claude".to_string()))
    }

    fn args(prompt: &Prompt) -> Vec<String> {
        let mut args = vec![
            "--print".to_string(),
            "--output-format".to_string(),
            "text".to_string(),
            "-p".to_string(),
            prompt.user.clone(),
        ];
        if let Some(system) = &prompt.system {
            args.push("--system-prompt".to_string());
            args.push(system.clone());
        }
        args
    }
}

#[async_trait]
impl LanguageModel for ClaudeCliModel {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String, LlmError> {
        if !prompt.attachments.is_empty() {
            return Err(LlmError::Unsupported {
                provider: PROVIDER,
                feature: "inline attachments",
            });
        }

        let output = Command::new(&self.command)
            .args(Self::args(prompt))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(LlmError::SpawnFailed)?;

        if !output.status.success() {
            return Err(LlmError::ProcessFailed {
                exit_code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if text.is_empty() {
            return Err(LlmError::EmptyResponse { provider: PROVIDER });
        }
        Ok(text)
    }
}
