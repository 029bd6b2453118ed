use thiserror::Error;

/// Boot-fatal and persistence-layer errors (spec's "error kind" #1).
#[derive(Debug, Error)]
pub enum JbotError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("{path}:{line}: malformed config line: {text:?}")]
    ConfigSyntax {
        path: String,
        line: usize,
        text: String,
    },

    #[error("missing required config key: {0}")]
    ConfigMissing(String),

    #[error("persistence decode failed: {0}")]
    Decode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl JbotError {
    /// Short error code, matching the convention used across this codebase's
    /// error enums for log correlation.
    pub fn code(&self) -> &'static str {
        match self {
            JbotError::Config(_) => "CONFIG_ERROR",
            JbotError::ConfigSyntax { .. } => "CONFIG_SYNTAX",
            JbotError::ConfigMissing(_) => "CONFIG_MISSING",
            JbotError::Decode(_) => "DECODE_ERROR",
            JbotError::Io(_) => "IO_ERROR",
            JbotError::Serialization(_) => "SERIALIZATION_ERROR",
            JbotError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, JbotError>;
