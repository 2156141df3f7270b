use crate::kind::MutationKind;

/// Errors raised while building records or loading configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// A mutation is missing a field its kind requires, or carries an empty one.
    #[error("invalid {kind} mutation: {reason}")]
    InvalidMutation { kind: MutationKind, reason: String },

    /// An unrecognised mutation kind name (e.g. from the command line).
    #[error("unknown mutation kind '{name}'")]
    UnknownKind { name: String },

    /// The configuration file could not be read or parsed.
    #[error("config error in '{path}': {reason}")]
    Config { path: String, reason: String },
}
