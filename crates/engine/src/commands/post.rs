use clipsync_core::{Entity, Mutation, Post};
use clipsync_storage::KeyValueStorage;
use serde_json::json;

use crate::client::ClipSync;
use crate::error::CommandError;
use crate::executor::{Command, Outcome};
use crate::remote::{ReclipOutcome, RemoteActions};

impl<S: KeyValueStorage, R: RemoteActions> ClipSync<S, R> {
    /// Like or unlike a post. Event `likeToggled-{postId}`.
    pub async fn toggle_like(&self, post_id: &str) -> Result<Outcome, CommandError> {
        let user = self.actor.user_id.clone();
        let command = Command::new(post_id, Mutation::like(post_id, &user), Post::with_like_toggled)
            .with_detail(|p: &Post| json!({ "liked": p.user_liked, "likes": p.stats.likes }));
        self.executor
            .execute(
                self.posts.as_ref(),
                command,
                || self.remote.toggle_like(&user, post_id),
                Post::reconcile,
            )
            .await
    }

    /// Event `bookmarkToggled-{postId}`.
    pub async fn toggle_bookmark(&self, post_id: &str) -> Result<Outcome, CommandError> {
        let user = self.actor.user_id.clone();
        let command = Command::new(
            post_id,
            Mutation::bookmark(post_id, &user),
            Post::with_bookmark_toggled,
        )
        .with_detail(|p: &Post| json!({ "bookmarked": p.is_bookmarked }));
        self.executor
            .execute(
                self.posts.as_ref(),
                command,
                || self.remote.toggle_bookmark(&user, post_id),
                Post::reconcile,
            )
            .await
    }

    /// Follow or unfollow the author of a post.
    ///
    /// The `followToggled-{postId}` detail carries the author handle, the
    /// acting user and a signed `delta`. On a confirmed event, profile views
    /// move the author's follower count and the actor's following count by
    /// that delta; a rolled-back event changes no counts.
    pub async fn toggle_follow(&self, post_id: &str) -> Result<Outcome, CommandError> {
        let post = self.post(post_id)?;
        if post.user_handle == self.actor.user_handle {
            return Ok(Outcome::Ignored {
                reason: "cannot follow yourself".to_string(),
            });
        }
        let user = self.actor.user_id.clone();
        let author = post.user_handle.clone();
        let actor_id = user.clone();
        let command = Command::new(
            post_id,
            Mutation::follow(post_id, &user, &author),
            Post::with_follow_toggled,
        )
        .with_detail(move |p: &Post| {
            let delta: i64 = if p.is_following { 1 } else { -1 };
            json!({
                "following": p.is_following,
                "userHandle": p.user_handle,
                "actorId": actor_id,
                "delta": delta,
            })
        });
        self.executor
            .execute(
                self.posts.as_ref(),
                command,
                || self.remote.toggle_follow(&user, post_id, &author),
                Post::reconcile,
            )
            .await
    }

    /// Reclip a post onto the actor's profile. Event `reclipAdded-{postId}`.
    ///
    /// One-way: a post already reclipped, or one of the actor's own, is
    /// left untouched and reported as [`Outcome::Ignored`].
    pub async fn reclip(&self, post_id: &str) -> Result<Outcome, CommandError> {
        let post = self.post(post_id)?;
        if post.user_handle == self.actor.user_handle {
            return Ok(Outcome::Ignored {
                reason: "cannot reclip your own post".to_string(),
            });
        }
        if post.user_reclipped {
            return Ok(Outcome::Ignored {
                reason: "already reclipped".to_string(),
            });
        }

        let user = self.actor.user_id.clone();
        let handle = self.actor.user_handle.clone();
        let command = Command::new(
            post_id,
            Mutation::reclip(post_id, &user, &handle),
            Post::with_reclip,
        )
        .with_detail(|p: &Post| json!({ "reclipped": p.user_reclipped, "reclips": p.stats.reclips }));
        let posts = self.posts.clone();
        self.executor
            .execute(
                self.posts.as_ref(),
                command,
                || self.remote.reclip(&user, post_id, &handle),
                move |local: &Post, outcome: ReclipOutcome| {
                    if let Some(created) = outcome.reclipped_post {
                        posts.insert(created);
                    }
                    Post::reconcile(local, outcome.original_post)
                },
            )
            .await
    }

    /// Count a view. Best-effort: a failure leaves the counter unchanged
    /// and is not reported. Event `viewAdded-{postId}`.
    pub async fn track_view(&self, post_id: &str) -> Result<Outcome, CommandError> {
        let user = self.actor.user_id.clone();
        let command = Command::new(post_id, Mutation::view(post_id, &user), Post::with_view)
            .best_effort()
            .with_detail(|p: &Post| json!({ "views": p.stats.views }));
        self.executor
            .execute(
                self.posts.as_ref(),
                command,
                || self.remote.track_view(&user, post_id),
                Post::reconcile,
            )
            .await
    }

    /// Count a share. Best-effort, like [`ClipSync::track_view`].
    pub async fn track_share(&self, post_id: &str) -> Result<Outcome, CommandError> {
        let user = self.actor.user_id.clone();
        let command = Command::new(post_id, Mutation::share(post_id, &user), Post::with_share)
            .best_effort()
            .with_detail(|p: &Post| json!({ "shares": p.stats.shares }));
        self.executor
            .execute(
                self.posts.as_ref(),
                command,
                || self.remote.track_share(&user, post_id),
                Post::reconcile,
            )
            .await
    }

    fn post(&self, post_id: &str) -> Result<Post, CommandError> {
        self.posts.get(post_id).ok_or_else(|| CommandError::UnknownEntity {
            entity_id: post_id.to_string(),
        })
    }
}
