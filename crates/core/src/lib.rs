//! clipsync-core: shared data model for the offline mutation queue.
//!
//! Defines what a queued user action looks like on disk ([`MutationRecord`]),
//! the engagement entities that optimistic commands mutate ([`Post`],
//! [`CommentThread`]), and the client configuration file.
//!
//! Every other crate in the workspace depends on this one.

pub mod clock;
pub mod config;
pub mod entity;
pub mod error;
pub mod ids;
pub mod kind;
pub mod record;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{read_config, ClientConfig, ConnectivitySettings, QueueSettings, RemoteSettings};
pub use entity::{Comment, CommentThread, Entity, EntityViewState, Post, PostStats};
pub use error::CoreError;
pub use ids::new_record_id;
pub use kind::MutationKind;
pub use record::{Mutation, MutationRecord};
