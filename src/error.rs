use thiserror::Error;

/// Errors raised by the record store, the notification capability and
/// configuration loading.
///
/// Public scheduler entry points never hand these to the caller; they are
/// logged and turned into an empty result at that boundary.
#[derive(Debug, Error)]
pub enum ReminderError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("file system error: {0}")]
    Io(#[from] std::io::Error),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("notification error: {0}")]
    Notification(String),

    #[error("record store error: {0}")]
    Store(String),

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ReminderError>;
