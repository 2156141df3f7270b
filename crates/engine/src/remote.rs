//! The server-side actions the engine consumes, and replay dispatch.

use std::sync::Arc;

use async_trait::async_trait;
use clipsync_core::{Comment, MutationKind, MutationRecord, Post};
use serde::{Deserialize, Serialize};

use crate::error::RemoteError;
use crate::queue::ReplayHandler;

/// Response of the reclip endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReclipOutcome {
    /// The post that was reclipped, as the server now sees it.
    pub original_post: Post,
    /// The new post created on the actor's profile, when the server
    /// returned one (absent if the post had already been reclipped).
    #[serde(default)]
    pub reclipped_post: Option<Post>,
}

/// Response of a comment or reply like toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeState {
    pub liked: bool,
    /// Server-side count, if the endpoint reports one.
    #[serde(default)]
    pub likes: Option<u64>,
}

impl LikeState {
    /// Apply to the local copy of a comment.
    pub fn settle(self, local: &Comment) -> Comment {
        let mut next = local.clone();
        if next.user_liked != self.liked {
            next = next.with_like_toggled();
        }
        if let Some(likes) = self.likes {
            next.likes = likes;
        }
        next
    }
}

/// One async call per mutation kind, returning the canonical state of the
/// entity acted on.
#[async_trait]
pub trait RemoteActions: Send + Sync {
    async fn toggle_like(&self, user_id: &str, post_id: &str) -> Result<Post, RemoteError>;

    async fn toggle_bookmark(&self, user_id: &str, post_id: &str) -> Result<Post, RemoteError>;

    async fn toggle_follow(
        &self,
        user_id: &str,
        post_id: &str,
        author_handle: &str,
    ) -> Result<Post, RemoteError>;

    async fn reclip(
        &self,
        user_id: &str,
        post_id: &str,
        user_handle: &str,
    ) -> Result<ReclipOutcome, RemoteError>;

    async fn add_comment(
        &self,
        user_id: &str,
        post_id: &str,
        text: &str,
    ) -> Result<Comment, RemoteError>;

    async fn add_reply(
        &self,
        user_id: &str,
        post_id: &str,
        parent_id: &str,
        text: &str,
    ) -> Result<Comment, RemoteError>;

    async fn toggle_comment_like(
        &self,
        user_id: &str,
        comment_id: &str,
    ) -> Result<LikeState, RemoteError>;

    async fn toggle_reply_like(
        &self,
        user_id: &str,
        parent_id: &str,
        reply_id: &str,
    ) -> Result<LikeState, RemoteError>;

    async fn track_view(&self, user_id: &str, post_id: &str) -> Result<Post, RemoteError>;

    async fn track_share(&self, user_id: &str, post_id: &str) -> Result<Post, RemoteError>;
}

#[async_trait]
impl<T: RemoteActions + ?Sized> RemoteActions for Arc<T> {
    async fn toggle_like(&self, user_id: &str, post_id: &str) -> Result<Post, RemoteError> {
        (**self).toggle_like(user_id, post_id).await
    }

    async fn toggle_bookmark(&self, user_id: &str, post_id: &str) -> Result<Post, RemoteError> {
        (**self).toggle_bookmark(user_id, post_id).await
    }

    async fn toggle_follow(
        &self,
        user_id: &str,
        post_id: &str,
        author_handle: &str,
    ) -> Result<Post, RemoteError> {
        (**self).toggle_follow(user_id, post_id, author_handle).await
    }

    async fn reclip(
        &self,
        user_id: &str,
        post_id: &str,
        user_handle: &str,
    ) -> Result<ReclipOutcome, RemoteError> {
        (**self).reclip(user_id, post_id, user_handle).await
    }

    async fn add_comment(
        &self,
        user_id: &str,
        post_id: &str,
        text: &str,
    ) -> Result<Comment, RemoteError> {
        (**self).add_comment(user_id, post_id, text).await
    }

    async fn add_reply(
        &self,
        user_id: &str,
        post_id: &str,
        parent_id: &str,
        text: &str,
    ) -> Result<Comment, RemoteError> {
        (**self).add_reply(user_id, post_id, parent_id, text).await
    }

    async fn toggle_comment_like(
        &self,
        user_id: &str,
        comment_id: &str,
    ) -> Result<LikeState, RemoteError> {
        (**self).toggle_comment_like(user_id, comment_id).await
    }

    async fn toggle_reply_like(
        &self,
        user_id: &str,
        parent_id: &str,
        reply_id: &str,
    ) -> Result<LikeState, RemoteError> {
        (**self).toggle_reply_like(user_id, parent_id, reply_id).await
    }

    async fn track_view(&self, user_id: &str, post_id: &str) -> Result<Post, RemoteError> {
        (**self).track_view(user_id, post_id).await
    }

    async fn track_share(&self, user_id: &str, post_id: &str) -> Result<Post, RemoteError> {
        (**self).track_share(user_id, post_id).await
    }
}

/// What the server answered when a queued record was replayed.
#[derive(Debug, Clone, PartialEq)]
pub enum Replayed {
    Post(Post),
    Reclip(ReclipOutcome),
    /// The comment or reply the server created.
    Comment(Comment),
    Like(LikeState),
}

/// Replays queued records by dispatching each to the matching remote action.
///
/// As a [`ReplayHandler`] the responses are discarded; [`dispatch`] hands
/// them back for callers that reconcile local state after a drain.
///
/// [`dispatch`]: RemoteReplayer::dispatch
pub struct RemoteReplayer<R> {
    remote: R,
}

impl<R: RemoteActions> RemoteReplayer<R> {
    pub fn new(remote: R) -> Self {
        RemoteReplayer { remote }
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Call the remote action `record` describes and return its response.
    pub async fn dispatch(&self, record: &MutationRecord) -> Result<Replayed, RemoteError> {
        let m = &record.mutation;
        let field = |value: &Option<String>, name: &str| -> Result<String, RemoteError> {
            value.clone().ok_or_else(|| RemoteError::MalformedRecord {
                record_id: record.id.clone(),
                reason: format!("{} record has no {name}", m.kind),
            })
        };
        let user = m.user_id.as_str();

        let replayed = match m.kind {
            MutationKind::Like => Replayed::Post(
                self.remote
                    .toggle_like(user, &field(&m.post_id, "postId")?)
                    .await?,
            ),
            MutationKind::Bookmark => Replayed::Post(
                self.remote
                    .toggle_bookmark(user, &field(&m.post_id, "postId")?)
                    .await?,
            ),
            MutationKind::Follow => Replayed::Post(
                self.remote
                    .toggle_follow(
                        user,
                        &field(&m.post_id, "postId")?,
                        &field(&m.author_handle, "authorHandle")?,
                    )
                    .await?,
            ),
            MutationKind::Reclip => Replayed::Reclip(
                self.remote
                    .reclip(
                        user,
                        &field(&m.post_id, "postId")?,
                        &field(&m.user_handle, "userHandle")?,
                    )
                    .await?,
            ),
            MutationKind::Comment => Replayed::Comment(
                self.remote
                    .add_comment(user, &field(&m.post_id, "postId")?, &field(&m.text, "text")?)
                    .await?,
            ),
            MutationKind::Reply => Replayed::Comment(
                self.remote
                    .add_reply(
                        user,
                        &field(&m.post_id, "postId")?,
                        &field(&m.parent_id, "parentId")?,
                        &field(&m.text, "text")?,
                    )
                    .await?,
            ),
            MutationKind::CommentLike => Replayed::Like(
                self.remote
                    .toggle_comment_like(user, &field(&m.comment_id, "commentId")?)
                    .await?,
            ),
            MutationKind::ReplyLike => Replayed::Like(
                self.remote
                    .toggle_reply_like(
                        user,
                        &field(&m.parent_id, "parentId")?,
                        &field(&m.comment_id, "commentId")?,
                    )
                    .await?,
            ),
            MutationKind::View => Replayed::Post(
                self.remote
                    .track_view(user, &field(&m.post_id, "postId")?)
                    .await?,
            ),
            MutationKind::Share => Replayed::Post(
                self.remote
                    .track_share(user, &field(&m.post_id, "postId")?)
                    .await?,
            ),
        };
        Ok(replayed)
    }
}

#[async_trait]
impl<R: RemoteActions> ReplayHandler for RemoteReplayer<R> {
    async fn replay(&self, record: &MutationRecord) -> Result<(), RemoteError> {
        self.dispatch(record).await.map(|_| ())
    }
}
