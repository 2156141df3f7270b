//! Engagement entities as the server returns them.
//!
//! UI surfaces hold these; optimistic commands transform them and then
//! replace them wholesale with the server's canonical copy.

use serde::{Deserialize, Serialize};

/// An entity whose engagement state is tracked by id.
pub trait Entity: Clone + Send + Sync + 'static {
    /// Id under which the entity is stored and announced.
    fn key(&self) -> &str;

    /// Merge a canonical server copy over local state.
    ///
    /// The default is a full replace. Implementations override it only for
    /// fields that a stale server snapshot must not turn back off.
    fn reconcile(local: &Self, canonical: Self) -> Self {
        let _ = local;
        canonical
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostStats {
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub comments: u64,
    #[serde(default)]
    pub shares: u64,
    #[serde(default)]
    pub reclips: u64,
}

/// A clip as served by the posts endpoints.
///
/// Fields this crate does not interpret (media, captions, tags) are kept in
/// `extra` so a round trip through the store loses nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub user_handle: String,
    #[serde(default)]
    pub stats: PostStats,
    #[serde(default)]
    pub user_liked: bool,
    #[serde(default)]
    pub is_bookmarked: bool,
    #[serde(default)]
    pub is_following: bool,
    #[serde(default)]
    pub user_reclipped: bool,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Flags and counters of a post as one UI surface displays them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntityViewState {
    pub user_liked: bool,
    pub is_bookmarked: bool,
    pub is_following: bool,
    pub user_reclipped: bool,
    pub likes: u64,
    pub comments: u64,
    pub shares: u64,
    pub reclips: u64,
    pub views: u64,
}

impl Post {
    pub fn new(id: &str, user_handle: &str) -> Self {
        Post {
            id: id.to_string(),
            user_handle: user_handle.to_string(),
            stats: PostStats::default(),
            user_liked: false,
            is_bookmarked: false,
            is_following: false,
            user_reclipped: false,
            extra: serde_json::Map::new(),
        }
    }

    pub fn view_state(&self) -> EntityViewState {
        EntityViewState {
            user_liked: self.user_liked,
            is_bookmarked: self.is_bookmarked,
            is_following: self.is_following,
            user_reclipped: self.user_reclipped,
            likes: self.stats.likes,
            comments: self.stats.comments,
            shares: self.stats.shares,
            reclips: self.stats.reclips,
            views: self.stats.views,
        }
    }

    pub fn with_like_toggled(&self) -> Post {
        let mut next = self.clone();
        next.user_liked = !self.user_liked;
        next.stats.likes = step(self.stats.likes, next.user_liked);
        next
    }

    pub fn with_bookmark_toggled(&self) -> Post {
        let mut next = self.clone();
        next.is_bookmarked = !self.is_bookmarked;
        next
    }

    pub fn with_follow_toggled(&self) -> Post {
        let mut next = self.clone();
        next.is_following = !self.is_following;
        next
    }

    /// Reclips only ever go one way.
    pub fn with_reclip(&self) -> Post {
        let mut next = self.clone();
        if !self.user_reclipped {
            next.user_reclipped = true;
            next.stats.reclips += 1;
        }
        next
    }

    pub fn with_view(&self) -> Post {
        let mut next = self.clone();
        next.stats.views += 1;
        next
    }

    pub fn with_share(&self) -> Post {
        let mut next = self.clone();
        next.stats.shares += 1;
        next
    }
}

impl Entity for Post {
    fn key(&self) -> &str {
        &self.id
    }

    fn reconcile(local: &Self, mut canonical: Self) -> Self {
        if local.user_reclipped && !canonical.user_reclipped {
            canonical.user_reclipped = true;
            canonical.stats.reclips = canonical.stats.reclips.max(local.stats.reclips);
        }
        canonical
    }
}

/// A comment or, when `parent_id` is set, a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub user_handle: String,
    pub text: String,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub user_liked: bool,
    #[serde(default)]
    pub replies: Vec<Comment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub reply_count: u64,
}

impl Comment {
    pub fn with_like_toggled(&self) -> Comment {
        let mut next = self.clone();
        next.user_liked = !self.user_liked;
        next.likes = step(self.likes, next.user_liked);
        next
    }
}

/// The ordered comment list shown under one post, keyed by the post id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentThread {
    pub post_id: String,
    pub comments: Vec<Comment>,
}

impl CommentThread {
    pub fn new(post_id: &str, comments: Vec<Comment>) -> Self {
        CommentThread {
            post_id: post_id.to_string(),
            comments,
        }
    }

    pub fn comment(&self, comment_id: &str) -> Option<&Comment> {
        self.comments.iter().find(|c| c.id == comment_id)
    }

    pub fn reply(&self, parent_id: &str, reply_id: &str) -> Option<&Comment> {
        self.comment(parent_id)?
            .replies
            .iter()
            .find(|r| r.id == reply_id)
    }

    pub fn with_comment(&self, comment: Comment) -> CommentThread {
        let mut next = self.clone();
        next.comments.push(comment);
        next
    }

    /// Append a reply under `parent_id`. Unknown parents leave the thread unchanged.
    pub fn with_reply(&self, parent_id: &str, reply: Comment) -> CommentThread {
        let mut next = self.clone();
        if let Some(parent) = next.comments.iter_mut().find(|c| c.id == parent_id) {
            parent.replies.push(reply);
            parent.reply_count += 1;
        }
        next
    }

    pub fn map_comment(
        &self,
        comment_id: &str,
        f: impl FnOnce(&Comment) -> Comment,
    ) -> CommentThread {
        let mut next = self.clone();
        if let Some(slot) = next.comments.iter_mut().find(|c| c.id == comment_id) {
            *slot = f(&*slot);
        }
        next
    }

    pub fn map_reply(
        &self,
        parent_id: &str,
        reply_id: &str,
        f: impl FnOnce(&Comment) -> Comment,
    ) -> CommentThread {
        let mut next = self.clone();
        let slot = next
            .comments
            .iter_mut()
            .find(|c| c.id == parent_id)
            .and_then(|p| p.replies.iter_mut().find(|r| r.id == reply_id));
        if let Some(slot) = slot {
            *slot = f(&*slot);
        }
        next
    }

    /// Replace the comment or reply `old_id` with `replacement` in place.
    ///
    /// If `old_id` is gone (the thread was refreshed meanwhile) the
    /// replacement is appended, unless an entry with its id already exists.
    pub fn swapped(&self, old_id: &str, replacement: Comment) -> CommentThread {
        let mut next = self.clone();

        if let Some(i) = next.comments.iter().position(|c| c.id == old_id) {
            next.comments[i] = replacement;
            return next;
        }
        let nested = next.comments.iter().enumerate().find_map(|(p, parent)| {
            parent
                .replies
                .iter()
                .position(|r| r.id == old_id)
                .map(|r| (p, r))
        });
        if let Some((p, r)) = nested {
            next.comments[p].replies[r] = replacement;
            return next;
        }

        match replacement.parent_id.as_deref() {
            Some(parent_id) => {
                if let Some(parent) = next.comments.iter_mut().find(|c| c.id == parent_id) {
                    if !parent.replies.iter().any(|r| r.id == replacement.id) {
                        parent.replies.push(replacement);
                    }
                }
            }
            None => {
                if !next.comments.iter().any(|c| c.id == replacement.id) {
                    next.comments.push(replacement);
                }
            }
        }
        next
    }
}

impl Entity for CommentThread {
    fn key(&self) -> &str {
        &self.post_id
    }
}

fn step(count: u64, up: bool) -> u64 {
    if up {
        count + 1
    } else {
        count.saturating_sub(1)
    }
}
