//! clipsync-engine: optimistic engagement commands with an offline queue.
//!
//! Every interactive verb (like, bookmark, follow, reclip, comment, reply,
//! comment and reply likes, view, share) runs through one combinator,
//! [`OptimisticExecutor::execute`]: the local state changes at once, then
//! the action is either confirmed with the server or, while offline,
//! appended to the durable [`MutationQueue`] for a later
//! [`drain`](MutationQueue::drain). Settled changes are announced on the
//! [`EventBus`] so every surface showing the same entity stays in step.

pub mod bus;
pub mod client;
pub mod commands;
pub mod connectivity;
pub mod error;
pub mod executor;
#[cfg(feature = "http")]
pub mod http;
pub mod queue;
pub mod remote;
pub mod store;

pub use bus::{EntityEvent, EventBus, EventCause, EventKind, Subscription, Topic};
pub use client::{Actor, ClipSync};
pub use connectivity::{Connectivity, DebouncedConnectivity, ManualConnectivity};
pub use error::{CommandError, QueueError, RemoteError};
pub use executor::{Command, Delivery, OptimisticExecutor, Outcome};
#[cfg(feature = "http")]
pub use http::HttpRemoteActions;
pub use queue::{DrainAbort, DrainReport, Enqueued, MutationQueue, ReplayHandler};
pub use remote::{LikeState, ReclipOutcome, RemoteActions, RemoteReplayer, Replayed};
pub use store::ViewStore;
