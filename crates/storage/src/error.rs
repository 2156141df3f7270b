/// All errors that can be returned by a key-value backend or the durable queue.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// Reading or writing the value under `key` failed.
    #[error("storage i/o error on '{key}': {reason}")]
    Io { key: String, reason: String },

    /// The value under `key` is not a valid JSON array of mutation records.
    ///
    /// The stored bytes are left untouched so nothing queued is lost.
    #[error("corrupt queue under '{key}': {reason}")]
    Corrupt { key: String, reason: String },

    /// A backend-specific failure (lock poisoned, directory unusable, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}
