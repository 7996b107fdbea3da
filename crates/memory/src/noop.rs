//! No-op session store — disables the session log entirely.

use async_trait::async_trait;
use serde_json::Value;
use stepwise_core::error::SessionError;
use stepwise_core::session::{SessionEntry, SessionStore};

/// A session store that records nothing.
pub struct NoopSessionStore;

#[async_trait]
impl SessionStore for NoopSessionStore {
    fn name(&self) -> &str {
        "none"
    }

    async fn append_entry(&self, _session_id: &str, _entry: &Value) {}

    async fn read_entries(&self, _session_id: &str) -> Result<Vec<SessionEntry>, SessionError> {
        Ok(Vec::new())
    }

    async fn clear(&self, _session_id: &str) -> Result<(), SessionError> {
        Ok(())
    }

    async fn sessions(&self) -> Result<Vec<String>, SessionError> {
        Ok(Vec::new())
    }
}
