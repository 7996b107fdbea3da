//! In-memory session store — useful for testing and ephemeral sessions.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use stepwise_core::error::SessionError;
use stepwise_core::session::{SessionEntry, SessionStore};
use tokio::sync::RwLock;

/// A bounded session store that keeps every log in a `VecDeque`.
pub struct InMemorySessionStore {
    max_lines: usize,
    logs: Arc<RwLock<HashMap<String, VecDeque<Value>>>>,
}

impl InMemorySessionStore {
    pub fn new(max_lines: usize) -> Self {
        Self {
            max_lines: max_lines.max(1),
            logs: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new(crate::file_store::DEFAULT_MAX_LINES)
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn append_entry(&self, session_id: &str, entry: &Value) {
        let mut logs = self.logs.write().await;
        let log = logs.entry(session_id.to_string()).or_default();
        log.push_back(entry.clone());
        while log.len() > self.max_lines {
            log.pop_front();
        }
    }

    async fn read_entries(&self, session_id: &str) -> Result<Vec<SessionEntry>, SessionError> {
        let logs = self.logs.read().await;
        Ok(logs
            .get(session_id)
            .map(|log| log.iter().cloned().map(SessionEntry::Event).collect())
            .unwrap_or_default())
    }

    async fn clear(&self, session_id: &str) -> Result<(), SessionError> {
        self.logs.write().await.remove(session_id);
        Ok(())
    }

    async fn sessions(&self) -> Result<Vec<String>, SessionError> {
        let mut ids: Vec<String> = self.logs.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}
