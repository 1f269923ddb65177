//! Error types for the wake scheduling core.

use std::time::Duration;

/// Top-level error type for background reactivation.
#[derive(Debug, thiserror::Error)]
pub enum WakeError {
    /// The OS refused an exact schedule because the exact-alarm grant is missing.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The OS scheduling primitive rejected or failed a request.
    #[error("platform error: {0}")]
    Platform(String),

    /// The application layer has not attached its end of the bridge yet.
    #[error("application channel is not bound")]
    ChannelUnbound,

    /// An outbound call did not resolve within its bounded wait.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),

    /// Malformed or unsupported bridge envelope.
    #[error("contract error: {0}")]
    Contract(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WakeError {
    /// `true` for the exact-alarm denial the adapter recovers from locally.
    #[must_use]
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied(_))
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, WakeError>;
