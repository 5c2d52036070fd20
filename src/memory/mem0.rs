//! Client for the hosted Mem0 memory API.

use super::{MemoryEntry, MemoryStore};
use anyhow::{Context, Result};
use async_trait::async_trait;
use finrouter_common::Identity;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.mem0.ai";

pub struct Mem0Client {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct RawMemory {
    #[serde(default)]
    memory: String,
    #[serde(default)]
    metadata: Option<serde_json::Value>,
}

impl From<RawMemory> for MemoryEntry {
    fn from(raw: RawMemory) -> Self {
        let session_id = raw
            .metadata
            .as_ref()
            .and_then(|m| m.get("session_id"))
            .and_then(|v| v.as_str())
            .map(str::to_string);
        MemoryEntry {
            text: raw.memory,
            session_id,
        }
    }
}

/// The list endpoint returns either a bare array or `{"results": [...]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListResponse {
    Bare(Vec<RawMemory>),
    Wrapped { results: Vec<RawMemory> },
}

impl Mem0Client {
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn memories_url(&self) -> String {
        format!("{}/v1/memories/", self.base_url)
    }

    fn auth(&self) -> String {
        format!("Token {}", self.api_key)
    }
}

#[async_trait]
impl MemoryStore for Mem0Client {
    async fn entries(&self, identity: &Identity) -> Result<Vec<MemoryEntry>> {
        let response = self
            .client
            .get(self.memories_url())
            .header("Authorization", self.auth())
            .query(&[("user_id", identity.user_id.as_str())])
            .send()
            .await
            .context("Failed to reach Mem0")?
            .error_for_status()
            .context("Mem0 rejected the memory listing")?;

        let list: ListResponse = response
            .json()
            .await
            .context("Failed to parse Mem0 memory listing")?;
        let raw = match list {
            ListResponse::Bare(items) => items,
            ListResponse::Wrapped { results } => results,
        };
        Ok(raw.into_iter().map(MemoryEntry::from).collect())
    }

    async fn save(&self, identity: &Identity, user_message: &str, response: &str) -> Result<()> {
        let body = json!({
            "messages": [
                { "role": "user", "content": user_message },
                { "role": "assistant", "content": response },
            ],
            "user_id": identity.user_id,
            "metadata": { "session_id": identity.session_id },
        });

        self.client
            .post(self.memories_url())
            .header("Authorization", self.auth())
            .json(&body)
            .send()
            .await
            .context("Failed to reach Mem0")?
            .error_for_status()
            .context("Mem0 rejected the memory write")?;
        Ok(())
    }
}
