//! Error types for the Stepwise domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`Error`] wraps them all.

use thiserror::Error;

/// The top-level error type for all Stepwise operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Session log errors ---
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    // --- Plan errors ---
    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether the agent loop may fold this error into its observations and
    /// keep going. See [`is_recoverable_message`].
    pub fn is_recoverable(&self) -> bool {
        is_recoverable_message(&self.to_string())
    }
}

/// Message fragments that mark a runtime error as recoverable.
///
/// Covers missing files, permission problems, timeouts, failed commands
/// and provider rate limiting. Matching is case-insensitive.
pub const RECOVERABLE_PATTERNS: &[&str] = &[
    "enoent",
    "no such file",
    "file not found",
    "permission denied",
    "eacces",
    "timed out",
    "timeout",
    "command failed",
    "rate limit",
    "too many requests",
];

/// Classify an error message as recoverable (`true`) or fatal (`false`).
pub fn is_recoverable_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    RECOVERABLE_PATTERNS.iter().any(|p| lower.contains(p))
}

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Tool execution failed: {tool_name} — {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Permission denied: {tool_name} — {reason}")]
    PermissionDenied { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Invalid tool registration: {0}")]
    InvalidRegistration(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid session id: {0}")]
    InvalidId(String),
}

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Illegal step transition for step {step_id}: {from} -> {to}")]
    IllegalTransition {
        step_id: String,
        from: String,
        to: String,
    },

    #[error("Step {step_id} has used {attempts} of {max_attempts} attempts")]
    AttemptsExhausted {
        step_id: String,
        attempts: u32,
        max_attempts: u32,
    },

    #[error("Plan not found: {0}")]
    NotFound(String),

    #[error("Planning failed: {0}")]
    PlanningFailed(String),

    #[error("Plan store error: {0}")]
    Store(String),

    #[error("Plan aborted: {0}")]
    Aborted(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 500,
            message: "upstream exploded".into(),
        });
        assert!(err.to_string().contains("500"));
        assert!(err.to_string().contains("upstream exploded"));
    }

    #[test]
    fn rate_limit_is_recoverable() {
        let err = Error::Provider(ProviderError::RateLimited {
            retry_after_secs: 5,
        });
        assert!(err.is_recoverable());
    }

    #[test]
    fn timeouts_and_missing_files_are_recoverable() {
        assert!(is_recoverable_message("ENOENT: no such file or directory, open 'a.txt'"));
        assert!(is_recoverable_message("Request timed out: 30s"));
        assert!(is_recoverable_message("Command failed: exit 2"));
        assert!(is_recoverable_message("Permission denied (os error 13)"));
    }

    #[test]
    fn unknown_tool_is_fatal() {
        let err = Error::Tool(ToolError::UnknownTool("teleport".into()));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn authentication_is_fatal() {
        let err = Error::Provider(ProviderError::AuthenticationFailed("bad key".into()));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn illegal_transition_mentions_both_states() {
        let err = PlanError::IllegalTransition {
            step_id: "2".into(),
            from: "COMPLETED".into(),
            to: "EXECUTING".into(),
        };
        let text = err.to_string();
        assert!(text.contains("COMPLETED"));
        assert!(text.contains("EXECUTING"));
    }
}
