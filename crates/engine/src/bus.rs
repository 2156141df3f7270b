//! In-process entity event bus.
//!
//! Independent UI surfaces showing the same post or comment subscribe to a
//! topic `(EventKind, entity id)` and hear about settled changes made
//! elsewhere. Delivery is synchronous and best-effort. There is no replay:
//! a subscriber registered after a publish never sees it, so consumers
//! read current state on mount and use the bus for later deltas only.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use clipsync_core::MutationKind;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    LikeToggled,
    BookmarkToggled,
    FollowToggled,
    ReclipAdded,
    CommentAdded,
    ReplyAdded,
    CommentLikeToggled,
    ReplyLikeToggled,
    ViewAdded,
    ShareAdded,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::LikeToggled => "likeToggled",
            EventKind::BookmarkToggled => "bookmarkToggled",
            EventKind::FollowToggled => "followToggled",
            EventKind::ReclipAdded => "reclipAdded",
            EventKind::CommentAdded => "commentAdded",
            EventKind::ReplyAdded => "replyAdded",
            EventKind::CommentLikeToggled => "commentLikeToggled",
            EventKind::ReplyLikeToggled => "replyLikeToggled",
            EventKind::ViewAdded => "viewAdded",
            EventKind::ShareAdded => "shareAdded",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<MutationKind> for EventKind {
    fn from(kind: MutationKind) -> Self {
        match kind {
            MutationKind::Like => EventKind::LikeToggled,
            MutationKind::Bookmark => EventKind::BookmarkToggled,
            MutationKind::Follow => EventKind::FollowToggled,
            MutationKind::Reclip => EventKind::ReclipAdded,
            MutationKind::Comment => EventKind::CommentAdded,
            MutationKind::Reply => EventKind::ReplyAdded,
            MutationKind::CommentLike => EventKind::CommentLikeToggled,
            MutationKind::ReplyLike => EventKind::ReplyLikeToggled,
            MutationKind::View => EventKind::ViewAdded,
            MutationKind::Share => EventKind::ShareAdded,
        }
    }
}

/// The unit of subscription. Displays as `"{eventName}-{entityId}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Topic {
    pub kind: EventKind,
    pub entity_id: String,
}

impl Topic {
    pub fn new(kind: EventKind, entity_id: &str) -> Self {
        Topic {
            kind,
            entity_id: entity_id.to_string(),
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.kind, self.entity_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EventCause {
    /// The server accepted the action and the canonical state is in place.
    Confirmed,
    /// The action failed and local state went back to what it was.
    RolledBack,
}

/// A settled change to one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityEvent {
    pub kind: EventKind,
    pub entity_id: String,
    /// The fields that changed, e.g. `{"liked": true, "likes": 11}`.
    pub detail: serde_json::Value,
    pub cause: EventCause,
}

impl EntityEvent {
    pub fn topic(&self) -> Topic {
        Topic::new(self.kind, &self.entity_id)
    }
}

type Listener = Arc<dyn Fn(&EntityEvent) + Send + Sync>;

/// Cloneable handle to one bus. Clones share their subscribers.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Registry>,
}

#[derive(Default)]
struct Registry {
    next_id: AtomicU64,
    topics: Mutex<HashMap<Topic, Vec<(u64, Listener)>>>,
}

impl Registry {
    fn detach(&self, topic: &Topic, id: u64) {
        let mut topics = self.topics.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(listeners) = topics.get_mut(topic) {
            listeners.retain(|(lid, _)| *lid != id);
            if listeners.is_empty() {
                topics.remove(topic);
            }
        }
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for `(kind, entity_id)`. It stays registered until
    /// the returned guard is dropped or unsubscribed.
    pub fn subscribe<F>(&self, kind: EventKind, entity_id: &str, listener: F) -> Subscription
    where
        F: Fn(&EntityEvent) + Send + Sync + 'static,
    {
        let topic = Topic::new(kind, entity_id);
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .topics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(topic.clone())
            .or_default()
            .push((id, Arc::new(listener)));
        Subscription {
            registry: Arc::downgrade(&self.inner),
            topic,
            id,
        }
    }

    /// Deliver `event` to every current subscriber of its topic and return
    /// how many there were.
    ///
    /// Listeners run on the publishing thread after the registry lock is
    /// released, so they may subscribe or unsubscribe themselves.
    pub fn publish(&self, event: &EntityEvent) -> usize {
        let topic = event.topic();
        let listeners: Vec<Listener> = {
            let topics = self.inner.topics.lock().unwrap_or_else(PoisonError::into_inner);
            topics
                .get(&topic)
                .map(|ls| ls.iter().map(|(_, l)| l.clone()).collect())
                .unwrap_or_default()
        };
        tracing::debug!(topic = %topic, cause = ?event.cause, listeners = listeners.len(), "event published");
        for listener in &listeners {
            listener(event);
        }
        listeners.len()
    }

    pub fn subscriber_count(&self, kind: EventKind, entity_id: &str) -> usize {
        self.inner
            .topics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&Topic::new(kind, entity_id))
            .map_or(0, Vec::len)
    }
}

/// Keeps a listener registered. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes its listener"]
pub struct Subscription {
    registry: Weak<Registry>,
    topic: Topic,
    id: u64,
}

impl Subscription {
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.detach(&self.topic, self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic.to_string())
            .field("id", &self.id)
            .finish()
    }
}
