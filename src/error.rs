//! Semantic error kinds shared by the controller and node sides.

/// Result type alias for store and engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Empty key/value or otherwise malformed input. Surfaces as 4xx, never retried.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// A local write targeted a node outside the entry's replica window.
    /// The caller is expected to redrive the write through the placement function.
    #[error("entry does not belong on this node")]
    NotOwner,

    /// Key absent after exhausting every replica.
    #[error("key not found")]
    NotFound,

    /// Peer unreachable or answered non-2xx.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage error: {0}")]
    Storage(#[from] rocksdb::Error),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(err.to_string())
    }
}
