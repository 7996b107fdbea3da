//! Session log traits — bounded, append-only per-session trace storage and
//! retrieval over it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SessionError;

/// One line of a session log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SessionEntry {
    /// A well-formed JSON line (normally a mode event).
    Event(Value),
    /// A line that could not be parsed, kept verbatim.
    Raw { raw: String },
}

impl SessionEntry {
    /// Parse one stored line, falling back to [`SessionEntry::Raw`].
    pub fn from_line(line: &str) -> Self {
        match serde_json::from_str::<Value>(line) {
            Ok(value) => Self::Event(value),
            Err(_) => Self::Raw {
                raw: line.to_string(),
            },
        }
    }

    /// The text the retriever matches against.
    pub fn to_text(&self) -> String {
        match self {
            Self::Event(value) => value.to_string(),
            Self::Raw { raw } => raw.clone(),
        }
    }

    /// The `mode` field, when this is a mode event.
    pub fn mode(&self) -> Option<&str> {
        match self {
            Self::Event(value) => value.get("mode").and_then(Value::as_str),
            Self::Raw { .. } => None,
        }
    }
}

/// Whether `id` is usable as a storage key (a file stem).
///
/// Keys are restricted to ASCII alphanumerics, `-`, `_` and `.`, and may
/// not start with a dot.
pub fn is_safe_key(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Validate a session id for use as a storage key.
pub fn validate_session_id(id: &str) -> Result<(), SessionError> {
    if is_safe_key(id) {
        Ok(())
    } else {
        Err(SessionError::InvalidId(id.to_string()))
    }
}

/// The session store trait.
///
/// Appends are best-effort: a failed write is logged by the implementation
/// and never surfaces to the orchestrator.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// A human-readable name for this backend.
    fn name(&self) -> &str;

    /// Append one entry, then evict the oldest entries beyond the bound.
    async fn append_entry(&self, session_id: &str, entry: &Value);

    /// The ordered log.
    async fn read_entries(&self, session_id: &str) -> Result<Vec<SessionEntry>, SessionError>;

    /// Truncate the log.
    async fn clear(&self, session_id: &str) -> Result<(), SessionError>;

    /// Known session ids, sorted.
    async fn sessions(&self) -> Result<Vec<String>, SessionError>;
}

/// A scored retrieval hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snippet {
    /// Position of the entry in the session log.
    pub index: usize,
    pub score: f32,
    pub text: String,
}

/// A ranking strategy over a session's entries.
pub trait RetrievalStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// Score `entries` against `query` and return at most `top_k` hits,
    /// best first.
    fn rank(&self, entries: &[SessionEntry], query: &str, top_k: usize) -> Vec<Snippet>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn malformed_line_becomes_raw() {
        let entry = SessionEntry::from_line("{not json");
        assert_eq!(
            entry,
            SessionEntry::Raw {
                raw: "{not json".into()
            }
        );
        assert_eq!(entry.to_text(), "{not json");
        assert!(entry.mode().is_none());
    }

    #[test]
    fn event_line_exposes_mode() {
        let entry = SessionEntry::from_line(r#"{"mode":"THINK","timestamp":"2024-01-01T00:00:00Z"}"#);
        assert_eq!(entry.mode(), Some("THINK"));
    }

    #[test]
    fn raw_serializes_as_object() {
        let v = serde_json::to_value(SessionEntry::Raw { raw: "x".into() }).unwrap();
        assert_eq!(v, json!({"raw": "x"}));
    }

    #[test]
    fn session_id_validation() {
        assert!(validate_session_id("default").is_ok());
        assert!(validate_session_id("run-2024_01.a").is_ok());
        assert!(validate_session_id("").is_err());
        assert!(validate_session_id("../etc").is_err());
        assert!(validate_session_id("a/b").is_err());
        assert!(validate_session_id(".hidden").is_err());
    }
}
