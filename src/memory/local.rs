use super::{MemoryEntry, MemoryStore};
use anyhow::Result;
use async_trait::async_trait;
use finrouter_common::Identity;
use std::collections::HashMap;
use std::sync::Mutex;

/// Process-local memory keyed by user id. Each saved exchange becomes one entry.
#[derive(Default)]
pub struct InMemoryStore {
    users: Mutex<HashMap<String, Vec<MemoryEntry>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an entry directly.
    pub fn insert(&self, user_id: &str, entry: MemoryEntry) {
        self.users
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(user_id.to_string())
            .or_default()
            .push(entry);
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn entries(&self, identity: &Identity) -> Result<Vec<MemoryEntry>> {
        let users = self.users.lock().unwrap_or_else(|e| e.into_inner());
        Ok(users.get(&identity.user_id).cloned().unwrap_or_default())
    }

    async fn save(&self, identity: &Identity, user_message: &str, response: &str) -> Result<()> {
        self.insert(
            &identity.user_id,
            MemoryEntry {
                text: format!("User asked: {} | Assistant answered: {}", user_message, response),
                session_id: Some(identity.session_id.clone()),
            },
        );
        Ok(())
    }
}
