//! # error
//!
//! Centralised tick error type.
//!
//! Every stage up to state persistence returns `Result<_, TickError>`.  The
//! runner funnels any `Err` into one failure path that appends the error to
//! `errors.ndjson` (using [`TickError::kind`] as the `type` column), fires an
//! alert and exits non-zero.  Agent output that fails to parse and webhook
//! delivery problems are *not* represented here: they are recovered locally.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TickError {
    /// Reading, writing or creating one of the persisted files failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `state.json` exists but is not a valid state record.  Never repaired.
    #[error("Failed to decode state file {path}: {source}")]
    StateDecode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The state record could not be rendered back to JSON.
    #[error("Failed to encode state: {0}")]
    StateEncode(#[source] serde_json::Error),

    /// The agent process ran past its deadline and was killed.
    #[error("Claude Code timed out after {} minutes", .0.as_secs() / 60)]
    AgentTimeout(Duration),

    /// The agent executable could not be resolved on `PATH`.
    #[error("Claude Code CLI not found ({0}). Is it installed?")]
    AgentNotFound(String),

    /// Spawning or waiting on the agent failed for any other reason.
    #[error("Claude Code process failed: {0}")]
    AgentProcess(#[source] std::io::Error),
}

impl TickError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TickError::Io { path: path.into(), source }
    }

    /// Stable label written to the `type` column of the error log.
    pub fn kind(&self) -> &'static str {
        match self {
            TickError::Io { .. }          => "IoError",
            TickError::StateDecode { .. } => "StateDecodeError",
            TickError::StateEncode(_)     => "StateEncodeError",
            TickError::AgentTimeout(_)    => "AgentTimeout",
            TickError::AgentNotFound(_)   => "AgentNotFound",
            TickError::AgentProcess(_)    => "AgentProcessError",
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message_in_minutes() {
        let err = TickError::AgentTimeout(Duration::from_secs(300));
        assert_eq!(err.to_string(), "Claude Code timed out after 5 minutes");
        assert_eq!(err.kind(), "AgentTimeout");
    }

    #[test]
    fn test_io_error_names_path() {
        let err = TickError::io(
            "/data/alpaca-bot/state.json",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("/data/alpaca-bot/state.json"));
        assert_eq!(err.kind(), "IoError");
    }
}
