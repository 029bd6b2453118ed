use thiserror::Error;

/// Errors that can occur within any transport adapter.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("send failed: {0}")]
    SendFailed(String),

    /// Authentication failure — transport-fatal per spec §7: break the
    /// event loop, let the supervisor decide whether to restart.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("operation timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl TransportError {
    pub fn code(&self) -> &'static str {
        match self {
            TransportError::ConnectionFailed(_) => "CONNECTION_FAILED",
            TransportError::SendFailed(_) => "SEND_FAILED",
            TransportError::AuthFailed(_) => "AUTH_FAILED",
            TransportError::Timeout { .. } => "TIMEOUT",
            TransportError::ConfigError(_) => "CONFIG_ERROR",
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, TransportError::AuthFailed(_))
    }
}
