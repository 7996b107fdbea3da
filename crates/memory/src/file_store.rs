//! File-based session store — one JSON-lines log per session.
//!
//! Each line is one mode event. Storage location:
//! `~/.stepwise/sessions/<session_id>.jsonl`
//!
//! Appends go straight to the end of the file. When a log grows past
//! `max_lines` the oldest lines are dropped and the file is rewritten with
//! the surviving tail.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use stepwise_core::error::SessionError;
use stepwise_core::session::{SessionEntry, SessionStore, validate_session_id};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Default bound on lines per session log.
pub const DEFAULT_MAX_LINES: usize = 1000;

/// A file-backed session store using JSONL (one JSON object per line).
///
/// Line caches are loaded lazily per session on first append; all writes
/// for this store are serialized through one lock, so events land in
/// emission order.
pub struct FileSessionStore {
    dir: PathBuf,
    max_lines: usize,
    cache: Mutex<HashMap<String, VecDeque<String>>>,
}

impl FileSessionStore {
    /// Create a store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>, max_lines: usize) -> Self {
        Self {
            dir: dir.into(),
            max_lines: max_lines.max(1),
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn path_for(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{session_id}.jsonl"))
    }

    async fn load_lines(path: &Path) -> Result<Vec<String>, SessionError> {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => Ok(content
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(str::to_string)
                .collect()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(SessionError::Storage(format!(
                "Failed to read session log {}: {e}",
                path.display()
            ))),
        }
    }

    async fn ensure_dir(&self) -> Result<(), SessionError> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            SessionError::Storage(format!("Failed to create session directory: {e}"))
        })
    }

    /// Rewrite the whole log from `lines`.
    async fn flush(&self, path: &Path, lines: &VecDeque<String>) -> Result<(), SessionError> {
        let mut content = String::new();
        for line in lines {
            content.push_str(line);
            content.push('\n');
        }
        tokio::fs::write(path, content)
            .await
            .map_err(|e| SessionError::Storage(format!("Failed to write session log: {e}")))
    }

    async fn append_line(path: &Path, line: &str) -> Result<(), SessionError> {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| SessionError::Storage(format!("Failed to open session log: {e}")))?;
        file.write_all(format!("{line}\n").as_bytes())
            .await
            .map_err(|e| SessionError::Storage(format!("Failed to append to session log: {e}")))?;
        file.flush()
            .await
            .map_err(|e| SessionError::Storage(format!("Failed to flush session log: {e}")))
    }

    async fn try_append(&self, session_id: &str, entry: &Value) -> Result<(), SessionError> {
        validate_session_id(session_id)?;
        let line = serde_json::to_string(entry)
            .map_err(|e| SessionError::Storage(format!("Failed to serialize entry: {e}")))?;
        let path = self.path_for(session_id);

        let mut cache = self.cache.lock().await;
        if !cache.contains_key(session_id) {
            let lines = Self::load_lines(&path).await?;
            cache.insert(session_id.to_string(), lines.into());
        }
        let Some(lines) = cache.get_mut(session_id) else {
            return Ok(());
        };

        self.ensure_dir().await?;
        lines.push_back(line);
        if lines.len() > self.max_lines {
            let evicted = lines.len() - self.max_lines;
            lines.drain(..evicted);
            debug!(session = session_id, evicted, "Pruned session log");
            self.flush(&path, lines).await
        } else if let Some(last) = lines.back() {
            Self::append_line(&path, last).await
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn append_entry(&self, session_id: &str, entry: &Value) {
        if let Err(e) = self.try_append(session_id, entry).await {
            warn!(session = session_id, error = %e, "Session append failed");
            // Drop the cache so the next append reloads from disk
            self.cache.lock().await.remove(session_id);
        }
    }

    async fn read_entries(&self, session_id: &str) -> Result<Vec<SessionEntry>, SessionError> {
        validate_session_id(session_id)?;
        let lines = Self::load_lines(&self.path_for(session_id)).await?;
        // A log written under a larger bound still reads back within this one
        let skip = lines.len().saturating_sub(self.max_lines);
        Ok(lines
            .iter()
            .skip(skip)
            .map(|line| SessionEntry::from_line(line))
            .collect())
    }

    async fn clear(&self, session_id: &str) -> Result<(), SessionError> {
        validate_session_id(session_id)?;
        let mut cache = self.cache.lock().await;
        cache.remove(session_id);
        let path = self.path_for(session_id);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tokio::fs::write(&path, "")
                .await
                .map_err(|e| SessionError::Storage(format!("Failed to clear session log: {e}")))?;
        }
        Ok(())
    }

    async fn sessions(&self) -> Result<Vec<String>, SessionError> {
        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(SessionError::Storage(format!(
                    "Failed to list sessions: {e}"
                )));
            }
        };

        let mut ids = Vec::new();
        while let Some(item) = dir
            .next_entry()
            .await
            .map_err(|e| SessionError::Storage(format!("Failed to list sessions: {e}")))?
        {
            let path = item.path();
            if path.extension().and_then(|e| e.to_str()) == Some("jsonl") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}
