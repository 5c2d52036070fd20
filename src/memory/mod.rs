//! Long-term conversation memory.
//!
//! Memory is best-effort: a failed load degrades to a fixed marker string and a
//! failed save is only logged. Neither ever fails a run.

pub mod local;
pub mod mem0;

pub use local::InMemoryStore;
pub use mem0::Mem0Client;

use anyhow::Result;
use async_trait::async_trait;
use finrouter_common::Identity;

pub const FRESH_CONVERSATION: &str = "This is a fresh conversation";
pub const LOAD_ERROR_SUMMARY: &str = "Error loading conversation context";

/// A stored memory entry for one identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryEntry {
    pub text: String,
    pub session_id: Option<String>,
}

#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Every entry recorded for the identity's user. Session filtering is done
    /// by [`load_summary`].
    async fn entries(&self, identity: &Identity) -> Result<Vec<MemoryEntry>>;

    /// Record one exchange for the identity.
    async fn save(&self, identity: &Identity, user_message: &str, response: &str) -> Result<()>;
}

/// Join the entries belonging to the identity's session into a digest.
pub fn summarize(identity: &Identity, entries: &[MemoryEntry]) -> String {
    let lines: Vec<&str> = entries
        .iter()
        .filter(|e| e.session_id.as_deref() == Some(identity.session_id.as_str()))
        .map(|e| e.text.as_str())
        .collect();
    if lines.is_empty() {
        FRESH_CONVERSATION.to_string()
    } else {
        format!("Summarized memory:\n{}", lines.join("\n"))
    }
}

/// Load the memory digest for an identity, degrading on failure.
pub async fn load_summary(store: &dyn MemoryStore, identity: &Identity) -> String {
    match store.entries(identity).await {
        Ok(entries) => summarize(identity, &entries),
        Err(e) => {
            tracing::warn!(thread_id = %identity.thread_id(), error = %e, "Memory load failed");
            LOAD_ERROR_SUMMARY.to_string()
        }
    }
}

/// Save an exchange, logging instead of failing.
pub async fn save_exchange(store: &dyn MemoryStore, identity: &Identity, user_message: &str, response: &str) {
    if let Err(e) = store.save(identity, user_message, response).await {
        tracing::warn!(thread_id = %identity.thread_id(), error = %e, "Memory save failed");
    }
}
