use clipsync_core::{CoreError, MutationKind};
use clipsync_storage::StorageError;

/// Failure of a remote action call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    #[error("network error: {reason}")]
    Network { reason: String },

    #[error("server rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("invalid response: {reason}")]
    InvalidResponse { reason: String },

    #[error("no remote action for '{kind}'")]
    Unsupported { kind: MutationKind },

    #[error("record '{record_id}' cannot be replayed: {reason}")]
    MalformedRecord { record_id: String, reason: String },
}

/// Failure while appending to the mutation queue.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error(transparent)]
    InvalidMutation(#[from] CoreError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Failure of an optimistic command, surfaced to the initiating caller.
///
/// Local state has already been rolled back when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("no entity '{entity_id}' in the view store")]
    UnknownEntity { entity_id: String },

    #[error("{kind} on '{entity_id}' failed: {source}")]
    Remote {
        kind: MutationKind,
        entity_id: String,
        source: RemoteError,
    },

    #[error("could not queue mutation: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    InvalidMutation(#[from] CoreError),
}

impl From<QueueError> for CommandError {
    fn from(e: QueueError) -> Self {
        match e {
            QueueError::InvalidMutation(e) => CommandError::InvalidMutation(e),
            QueueError::Storage(e) => CommandError::Storage(e),
        }
    }
}
