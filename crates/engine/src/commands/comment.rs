use clipsync_core::{Comment, CommentThread, Mutation, MutationKind, Post};
use clipsync_storage::KeyValueStorage;
use serde_json::json;

use super::{is_placeholder, placeholder_id};
use crate::bus::{EntityEvent, EventCause, EventKind};
use crate::client::ClipSync;
use crate::error::CommandError;
use crate::executor::{Command, Outcome};
use crate::remote::{LikeState, RemoteActions};
use crate::store::ViewStore;

impl<S: KeyValueStorage, R: RemoteActions> ClipSync<S, R> {
    /// Add a top-level comment under a post. Event `commentAdded-{postId}`.
    ///
    /// A placeholder with a `pending-` id is appended at once and the post's
    /// comment counter goes up with it. When the server answers, now or on a
    /// later drain, its comment takes the placeholder's slot. An empty thread
    /// is created if none is loaded for the post.
    pub async fn add_comment(&self, post_id: &str, text: &str) -> Result<Outcome, CommandError> {
        if self.threads.get(post_id).is_none() {
            self.threads.insert(CommentThread::new(post_id, Vec::new()));
        }
        let user = self.actor.user_id.clone();
        let placeholder = self.placeholder(post_id, None, text);
        let pending_id = placeholder.id.clone();
        let mutation = Mutation::comment(post_id, &user, text)
            .with_user_handle(&self.actor.user_handle)
            .with_placeholder(&pending_id);

        let (bump, unbump, counted) = (self.posts.clone(), self.posts.clone(), self.posts.clone());
        let (bump_id, unbump_id, counted_id) =
            (post_id.to_string(), post_id.to_string(), post_id.to_string());
        let command = Command::new(post_id, mutation, move |thread: &CommentThread| {
            thread.with_comment(placeholder)
        })
        .alongside(
            move || adjust_comment_count(&bump, &bump_id, 1),
            move || adjust_comment_count(&unbump, &unbump_id, -1),
        )
        .with_detail(move |t: &CommentThread| {
            let count = counted.get(&counted_id).map(|p| p.stats.comments);
            json!({ "comments": t.comments.len(), "commentCount": count })
        });

        self.executor
            .execute(
                self.threads.as_ref(),
                command,
                || self.remote.add_comment(&user, post_id, text),
                move |local: &CommentThread, created: Comment| local.swapped(&pending_id, created),
            )
            .await
    }

    /// Reply to a comment. Event `replyAdded-{parentId}`.
    pub async fn add_reply(
        &self,
        post_id: &str,
        parent_id: &str,
        text: &str,
    ) -> Result<Outcome, CommandError> {
        let thread = self.thread(post_id)?;
        if thread.comment(parent_id).is_none() {
            return Err(CommandError::UnknownEntity {
                entity_id: parent_id.to_string(),
            });
        }
        if is_placeholder(parent_id) {
            return Ok(Outcome::Ignored {
                reason: "parent comment is not synced yet".to_string(),
            });
        }

        let user = self.actor.user_id.clone();
        let placeholder = self.placeholder(post_id, Some(parent_id), text);
        let pending_id = placeholder.id.clone();
        let parent = parent_id.to_string();
        let detail_parent = parent.clone();

        let command = Command::new(
            post_id,
            Mutation::reply(post_id, parent_id, &user, text)
                .with_user_handle(&self.actor.user_handle)
                .with_placeholder(&pending_id),
            move |thread: &CommentThread| thread.with_reply(&parent, placeholder),
        )
        .announce_as(parent_id)
        .with_detail(move |t: &CommentThread| {
            let replies = t.comment(&detail_parent).map_or(0, |c| c.reply_count);
            json!({ "parentId": detail_parent, "replyCount": replies })
        });

        self.executor
            .execute(
                self.threads.as_ref(),
                command,
                || self.remote.add_reply(&user, post_id, parent_id, text),
                move |local: &CommentThread, created: Comment| local.swapped(&pending_id, created),
            )
            .await
    }

    /// Like or unlike a top-level comment. Event
    /// `commentLikeToggled-{commentId}`.
    pub async fn toggle_comment_like(
        &self,
        post_id: &str,
        comment_id: &str,
    ) -> Result<Outcome, CommandError> {
        let thread = self.thread(post_id)?;
        if thread.comment(comment_id).is_none() {
            return Err(CommandError::UnknownEntity {
                entity_id: comment_id.to_string(),
            });
        }
        if is_placeholder(comment_id) {
            return Ok(Outcome::Ignored {
                reason: "comment is not synced yet".to_string(),
            });
        }

        let user = self.actor.user_id.clone();
        let (target, detail_target, settle_target) =
            (comment_id.to_string(), comment_id.to_string(), comment_id.to_string());
        let command = Command::new(
            post_id,
            Mutation::comment_like(comment_id, &user),
            move |t: &CommentThread| t.map_comment(&target, Comment::with_like_toggled),
        )
        .announce_as(comment_id)
        .with_detail(move |t: &CommentThread| like_detail(t.comment(&detail_target)));

        self.executor
            .execute(
                self.threads.as_ref(),
                command,
                || self.remote.toggle_comment_like(&user, comment_id),
                move |local: &CommentThread, state: LikeState| {
                    local.map_comment(&settle_target, |c| state.settle(c))
                },
            )
            .await
    }

    /// Like or unlike a reply. Event `replyLikeToggled-{replyId}`.
    pub async fn toggle_reply_like(
        &self,
        post_id: &str,
        parent_id: &str,
        reply_id: &str,
    ) -> Result<Outcome, CommandError> {
        let thread = self.thread(post_id)?;
        if thread.reply(parent_id, reply_id).is_none() {
            return Err(CommandError::UnknownEntity {
                entity_id: reply_id.to_string(),
            });
        }
        if is_placeholder(reply_id) {
            return Ok(Outcome::Ignored {
                reason: "reply is not synced yet".to_string(),
            });
        }

        let user = self.actor.user_id.clone();
        let ids = (parent_id.to_string(), reply_id.to_string());
        let (detail_ids, settle_ids) = (ids.clone(), ids.clone());
        let command = Command::new(
            post_id,
            Mutation::reply_like(parent_id, reply_id, &user),
            move |t: &CommentThread| t.map_reply(&ids.0, &ids.1, Comment::with_like_toggled),
        )
        .announce_as(reply_id)
        .with_detail(move |t: &CommentThread| like_detail(t.reply(&detail_ids.0, &detail_ids.1)));

        self.executor
            .execute(
                self.threads.as_ref(),
                command,
                || self.remote.toggle_reply_like(&user, parent_id, reply_id),
                move |local: &CommentThread, state: LikeState| {
                    local.map_reply(&settle_ids.0, &settle_ids.1, |c| state.settle(c))
                },
            )
            .await
    }

    /// Put a comment created by a drain in place of the placeholder its
    /// queued `mutation` was recorded with, then announce it. Nothing
    /// happens if the thread is no longer loaded.
    pub(crate) fn settle_queued_comment(
        &self,
        mutation: &Mutation,
        pending_id: &str,
        created: Comment,
    ) {
        let Some(post_id) = mutation.post_id.as_deref() else {
            return;
        };
        let Some(thread) = self.threads.get(post_id) else {
            tracing::debug!(post_id, "thread not loaded; replayed comment not merged");
            return;
        };
        let settled = thread.swapped(pending_id, created);
        self.threads.insert(settled.clone());

        let event = match (mutation.kind, mutation.parent_id.as_deref()) {
            (MutationKind::Reply, Some(parent_id)) => {
                let replies = settled.comment(parent_id).map_or(0, |c| c.reply_count);
                EntityEvent {
                    kind: EventKind::ReplyAdded,
                    entity_id: parent_id.to_string(),
                    detail: json!({ "parentId": parent_id, "replyCount": replies }),
                    cause: EventCause::Confirmed,
                }
            }
            _ => {
                let count = self.posts.get(post_id).map(|p| p.stats.comments);
                EntityEvent {
                    kind: EventKind::CommentAdded,
                    entity_id: post_id.to_string(),
                    detail: json!({ "comments": settled.comments.len(), "commentCount": count }),
                    cause: EventCause::Confirmed,
                }
            }
        };
        self.bus().publish(&event);
    }

    fn thread(&self, post_id: &str) -> Result<CommentThread, CommandError> {
        self.threads
            .get(post_id)
            .ok_or_else(|| CommandError::UnknownEntity {
                entity_id: post_id.to_string(),
            })
    }

    fn placeholder(&self, post_id: &str, parent_id: Option<&str>, text: &str) -> Comment {
        Comment {
            id: placeholder_id(),
            post_id: post_id.to_string(),
            user_handle: self.actor.user_handle.clone(),
            text: text.to_string(),
            created_at: self.queue().clock().now_ms(),
            likes: 0,
            user_liked: false,
            replies: Vec::new(),
            parent_id: parent_id.map(str::to_string),
            reply_count: 0,
        }
    }
}

fn adjust_comment_count(posts: &ViewStore<Post>, post_id: &str, delta: i64) {
    if let Some(mut post) = posts.get(post_id) {
        post.stats.comments = post.stats.comments.saturating_add_signed(delta);
        posts.insert(post);
    }
}

fn like_detail(comment: Option<&Comment>) -> serde_json::Value {
    match comment {
        Some(c) => json!({ "liked": c.user_liked, "likes": c.likes }),
        None => serde_json::Value::Null,
    }
}
