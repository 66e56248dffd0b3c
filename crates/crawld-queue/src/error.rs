use thiserror::Error;

/// Errors that can occur during queue operations.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The table name collides with a store-reserved prefix or is empty.
    #[error("invalid table name: {0}")]
    InvalidName(String),

    /// A supplied `priority` argument cannot be read as a number.
    /// The job is not inserted.
    #[error("invalid priority value: {0}")]
    InvalidPriority(String),

    /// The job payload could not be serialised. Nothing was persisted.
    #[error("payload encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// A stored payload could not be deserialised. Rows written by this
    /// crate always decode; this guards against rows from other writers.
    #[error("payload decode failed: {0}")]
    Decode(#[source] serde_json::Error),

    /// Underlying SQLite / rusqlite error.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A claim kept losing the race against concurrent consumers and the
    /// retry budget ran out.
    #[error("claim contention exceeded after {retries} retries")]
    ContentionExceeded { retries: u32 },
}

pub type Result<T> = std::result::Result<T, QueueError>;
