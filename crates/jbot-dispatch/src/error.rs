use thiserror::Error;

/// Errors surfaced by the dispatch kernel itself, as distinct from a
/// command's own user-visible diagnostic text (spec §7: commands never
/// propagate errors upward, they reply with one).
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("unknown channel: {0}")]
    UnknownChannel(String),

    #[error("invalid auto-reply pattern {pattern:?}: {reason}")]
    InvalidAutoReplyPattern { pattern: String, reason: String },

    #[error("transport error: {0}")]
    Transport(#[from] jbot_transport::TransportError),
}

pub type Result<T> = std::result::Result<T, DispatchError>;
