//! Harness failure type.

use sockfd_core::SocketError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Socket(#[from] SocketError),
    /// A scenario observed something other than what it expected.
    #[error("check failed: {0}")]
    Check(String),
    #[error("{failed} of {total} scenario(s) failed")]
    ScenariosFailed { failed: usize, total: usize },
    #[error("log validation failed: {0} error(s)")]
    InvalidLog(usize),
}

impl HarnessError {
    pub fn check(message: impl Into<String>) -> Self {
        Self::Check(message.into())
    }

    /// The socket error behind this failure, if any.
    #[must_use]
    pub fn socket_error(&self) -> Option<&SocketError> {
        match self {
            Self::Socket(err) => Some(err),
            _ => None,
        }
    }
}

/// Fails with [`HarnessError::Check`] unless `cond` holds.
pub fn ensure(cond: bool, message: impl FnOnce() -> String) -> Result<(), HarnessError> {
    if cond {
        Ok(())
    } else {
        Err(HarnessError::Check(message()))
    }
}
