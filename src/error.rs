//! Error taxonomy for hookgate
//!
//! Git-level failures are recovered inside the cache and never reach callers;
//! plugin failures are folded into outcomes. These types exist so that the
//! recovery code can log and classify what went wrong.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HookgateError {
    /// One git subcommand failed or timed out.
    #[error("git {command} failed: {message}")]
    CommandFailure { command: String, message: String },

    /// A whole refresh attempt failed.
    #[error("refresh failed: {reason}")]
    RefreshFailure { reason: String },

    /// The circuit breaker rejected the call without attempting it.
    #[error("circuit open, retry after {retry_after:?}")]
    CircuitOpenRejection { retry_after: Duration },

    #[error("failed to load plugin '{name}': {reason}")]
    PluginLoadFailure { name: String, reason: String },

    #[error("plugin '{name}' failed: {reason}")]
    PluginExecutionFailure { name: String, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{0} not found")]
    NotFound(String),
}

impl HookgateError {
    pub fn refresh(reason: impl Into<String>) -> Self {
        Self::RefreshFailure {
            reason: reason.into(),
        }
    }

    pub fn load(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PluginLoadFailure {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, HookgateError>;
