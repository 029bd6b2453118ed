use thiserror::Error;

/// Errors that can occur within the periodic-scheduler subsystem.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("CVE feed fetch failed: {0}")]
    CveFeedFetch(String),

    #[error("CVE feed decode failed: {0}")]
    CveFeedDecode(String),

    #[error("persistence error: {0}")]
    Persistence(#[from] jbot_core::JbotError),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
