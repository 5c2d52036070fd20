//! Conversation history windowing and the per-identity conversation buffer.
//!
//! Routing and aggregation look at the most recent turns; individual steps look
//! at everything older, since the recent turns are already represented by the
//! request itself.

use finrouter_common::{Identity, Turn};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Number of turns routing and aggregation see, and that steps skip.
pub const HISTORY_WINDOW: usize = 10;

/// The last `window` turns.
pub fn recent_window(history: &[Turn], window: usize) -> &[Turn] {
    let start = history.len().saturating_sub(window);
    &history[start..]
}

/// Every turn except the last `window`.
pub fn older_portion(history: &[Turn], window: usize) -> &[Turn] {
    let end = history.len().saturating_sub(window);
    &history[..end]
}

/// Render turns as `Role: content` lines for a prompt.
pub fn format_history(turns: &[Turn]) -> String {
    let mut formatted = String::new();
    for turn in turns {
        formatted.push_str(turn.role.label());
        formatted.push_str(": ");
        formatted.push_str(&turn.content);
        formatted.push('\n');
    }
    formatted.trim().to_string()
}

/// Bounded per-identity conversation buffers.
///
/// This is the only state shared across requests. Appends for one identity
/// are serialized by the mutex.
pub struct ConversationBuffer {
    capacity: usize,
    threads: Mutex<HashMap<String, VecDeque<Turn>>>,
}

impl Default for ConversationBuffer {
    fn default() -> Self {
        Self::new(HISTORY_WINDOW)
    }
}

impl ConversationBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            threads: Mutex::new(HashMap::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current turns for an identity, oldest first.
    pub fn snapshot(&self, identity: &Identity) -> Vec<Turn> {
        let threads = self.threads.lock().unwrap_or_else(|e| e.into_inner());
        threads
            .get(&identity.thread_id())
            .map(|turns| turns.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Record one user/assistant exchange, dropping the oldest turns past capacity.
    pub fn append_exchange(&self, identity: &Identity, user_message: &str, response: &str) {
        let mut threads = self.threads.lock().unwrap_or_else(|e| e.into_inner());
        let turns = threads.entry(identity.thread_id()).or_default();
        turns.push_back(Turn::user(user_message));
        turns.push_back(Turn::assistant(response));
        while turns.len() > self.capacity {
            turns.pop_front();
        }
    }

    pub fn clear(&self, identity: &Identity) {
        let mut threads = self.threads.lock().unwrap_or_else(|e| e.into_inner());
        threads.remove(&identity.thread_id());
    }
}
