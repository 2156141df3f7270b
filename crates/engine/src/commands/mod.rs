//! The ten interactive verbs, each one instance of the optimistic command.

mod comment;
mod post;

use clipsync_core::new_record_id;

/// Prefix of ids given to comments that the server has not assigned yet.
pub const PENDING_PREFIX: &str = "pending-";

fn placeholder_id() -> String {
    format!("{PENDING_PREFIX}{}", new_record_id())
}

/// Whether `id` names a locally created comment still waiting for its
/// server id.
pub fn is_placeholder(id: &str) -> bool {
    id.starts_with(PENDING_PREFIX)
}
