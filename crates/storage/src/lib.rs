//! Persistence for the offline mutation queue.
//!
//! [`KeyValueStorage`] is the narrow contract a platform store must meet;
//! [`DurableQueue`] layers the ordered, single-writer record list on top.

pub mod conformance;
mod error;
mod file;
mod memory;
mod queue;
mod traits;

pub use error::StorageError;
pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use queue::DurableQueue;
pub use traits::KeyValueStorage;
