//! Shared fixtures for engine integration tests: an in-memory server that
//! implements the remote actions, and a wired-up `ClipSync` around it.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use clipsync_core::{Comment, CommentThread, ManualClock, MutationKind, Post};
use clipsync_engine::{
    Actor, ClipSync, LikeState, ManualConnectivity, MutationQueue, ReclipOutcome, RemoteActions,
    RemoteError,
};
use clipsync_storage::MemoryStorage;

pub const ME_ID: &str = "u-me";
pub const ME: &str = "me";

#[derive(Default)]
struct ServerState {
    posts: HashMap<String, Post>,
    comments: HashMap<String, Comment>,
    liked_comments: HashSet<String>,
    calls: Vec<String>,
    failing: HashSet<MutationKind>,
    delays: HashMap<MutationKind, Duration>,
    next_id: u64,
}

/// Server double: keeps canonical posts and comments, logs every call as
/// `"{kind}:{target}"`, and can be told to fail or stall per kind.
#[derive(Default)]
pub struct FakeServer {
    state: Mutex<ServerState>,
}

impl FakeServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_post(self, post: Post) -> Self {
        self.state.lock().unwrap().posts.insert(post.id.clone(), post);
        self
    }

    pub fn with_comment(self, comment: Comment) -> Self {
        self.state
            .lock()
            .unwrap()
            .comments
            .insert(comment.id.clone(), comment);
        self
    }

    pub fn fail(&self, kind: MutationKind) {
        self.state.lock().unwrap().failing.insert(kind);
    }

    pub fn fail_all(&self) {
        self.state.lock().unwrap().failing.extend(MutationKind::ALL);
    }

    pub fn heal(&self) {
        self.state.lock().unwrap().failing.clear();
    }

    pub fn delay(&self, kind: MutationKind, by: Duration) {
        self.state.lock().unwrap().delays.insert(kind, by);
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn post(&self, id: &str) -> Post {
        self.state.lock().unwrap().posts[id].clone()
    }

    async fn enter(&self, kind: MutationKind, target: &str) -> Result<(), RemoteError> {
        let delay = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(format!("{kind}:{target}"));
            if state.failing.contains(&kind) {
                return Err(RemoteError::Network {
                    reason: "connection reset".into(),
                });
            }
            state.delays.get(&kind).copied()
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    fn update_post(&self, id: &str, f: impl FnOnce(&mut Post)) -> Result<Post, RemoteError> {
        let mut state = self.state.lock().unwrap();
        let post = state.posts.get_mut(id).ok_or_else(|| RemoteError::Rejected {
            status: 404,
            message: format!("post {id} not found"),
        })?;
        f(post);
        Ok(post.clone())
    }

    fn create_comment(&self, post_id: &str, parent_id: Option<&str>, text: &str) -> Comment {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let comment = Comment {
            id: format!("c-{}", state.next_id),
            post_id: post_id.to_string(),
            user_handle: ME.to_string(),
            text: text.to_string(),
            created_at: 1_700_000_000_000,
            likes: 0,
            user_liked: false,
            replies: Vec::new(),
            parent_id: parent_id.map(str::to_string),
            reply_count: 0,
        };
        state.comments.insert(comment.id.clone(), comment.clone());
        comment
    }

    fn toggle_comment(&self, comment_id: &str) -> Result<LikeState, RemoteError> {
        let mut state = self.state.lock().unwrap();
        let liked = !state.liked_comments.remove(comment_id);
        if liked {
            state.liked_comments.insert(comment_id.to_string());
        }
        let comment = state
            .comments
            .get_mut(comment_id)
            .ok_or_else(|| RemoteError::Rejected {
                status: 404,
                message: format!("comment {comment_id} not found"),
            })?;
        comment.likes = if liked {
            comment.likes + 1
        } else {
            comment.likes.saturating_sub(1)
        };
        Ok(LikeState {
            liked,
            likes: Some(comment.likes),
        })
    }
}

#[async_trait]
impl RemoteActions for FakeServer {
    async fn toggle_like(&self, _user_id: &str, post_id: &str) -> Result<Post, RemoteError> {
        self.enter(MutationKind::Like, post_id).await?;
        self.update_post(post_id, |p| *p = p.with_like_toggled())
    }

    async fn toggle_bookmark(&self, _user_id: &str, post_id: &str) -> Result<Post, RemoteError> {
        self.enter(MutationKind::Bookmark, post_id).await?;
        self.update_post(post_id, |p| p.is_bookmarked = !p.is_bookmarked)
    }

    async fn toggle_follow(
        &self,
        _user_id: &str,
        post_id: &str,
        author_handle: &str,
    ) -> Result<Post, RemoteError> {
        self.enter(MutationKind::Follow, author_handle).await?;
        self.update_post(post_id, |p| p.is_following = !p.is_following)
    }

    async fn reclip(
        &self,
        _user_id: &str,
        post_id: &str,
        user_handle: &str,
    ) -> Result<ReclipOutcome, RemoteError> {
        self.enter(MutationKind::Reclip, post_id).await?;
        let original_post = self.update_post(post_id, |p| {
            p.stats.reclips += 1;
            p.user_reclipped = true;
        })?;
        let mut created = Post::new(&format!("{post_id}-by-{user_handle}"), user_handle);
        created.extra.insert(
            "originalPostId".to_string(),
            serde_json::Value::String(post_id.to_string()),
        );
        Ok(ReclipOutcome {
            original_post,
            reclipped_post: Some(created),
        })
    }

    async fn add_comment(
        &self,
        _user_id: &str,
        post_id: &str,
        text: &str,
    ) -> Result<Comment, RemoteError> {
        self.enter(MutationKind::Comment, post_id).await?;
        Ok(self.create_comment(post_id, None, text))
    }

    async fn add_reply(
        &self,
        _user_id: &str,
        post_id: &str,
        parent_id: &str,
        text: &str,
    ) -> Result<Comment, RemoteError> {
        self.enter(MutationKind::Reply, parent_id).await?;
        Ok(self.create_comment(post_id, Some(parent_id), text))
    }

    async fn toggle_comment_like(
        &self,
        _user_id: &str,
        comment_id: &str,
    ) -> Result<LikeState, RemoteError> {
        self.enter(MutationKind::CommentLike, comment_id).await?;
        self.toggle_comment(comment_id)
    }

    async fn toggle_reply_like(
        &self,
        _user_id: &str,
        _parent_id: &str,
        reply_id: &str,
    ) -> Result<LikeState, RemoteError> {
        self.enter(MutationKind::ReplyLike, reply_id).await?;
        self.toggle_comment(reply_id)
    }

    async fn track_view(&self, _user_id: &str, post_id: &str) -> Result<Post, RemoteError> {
        self.enter(MutationKind::View, post_id).await?;
        self.update_post(post_id, |p| p.stats.views += 1)
    }

    async fn track_share(&self, _user_id: &str, post_id: &str) -> Result<Post, RemoteError> {
        self.enter(MutationKind::Share, post_id).await?;
        self.update_post(post_id, |p| p.stats.shares += 1)
    }
}

pub type TestSync = ClipSync<MemoryStorage, Arc<FakeServer>>;

pub struct Rig {
    pub sync: TestSync,
    pub net: Arc<ManualConnectivity>,
    pub server: Arc<FakeServer>,
}

/// Post `P1` by `U1` with 10 likes, known to both the server and the
/// local view store; the acting user is `me`.
pub fn post_p1() -> Post {
    let mut post = Post::new("P1", "U1");
    post.stats.likes = 10;
    post.stats.views = 100;
    post
}

pub fn comment(id: &str, post_id: &str, likes: u64) -> Comment {
    Comment {
        id: id.to_string(),
        post_id: post_id.to_string(),
        user_handle: "U1".to_string(),
        text: format!("comment {id}"),
        created_at: 1_600_000_000_000,
        likes,
        user_liked: false,
        replies: Vec::new(),
        parent_id: None,
        reply_count: 0,
    }
}

pub fn rig(online: bool) -> Rig {
    rig_with(online, false)
}

pub fn rig_with(online: bool, coalesce: bool) -> Rig {
    let mut reply = comment("r1", "P1", 0);
    reply.parent_id = Some("c1".to_string());
    let mut parent = comment("c1", "P1", 2);
    parent.replies.push(reply.clone());
    parent.reply_count = 1;

    let server = Arc::new(
        FakeServer::new()
            .with_post(post_p1())
            .with_post(Post::new("P2", "U2"))
            .with_post(Post::new("MINE", ME))
            .with_comment(parent.clone())
            .with_comment(reply),
    );
    let net = Arc::new(ManualConnectivity::new(online));
    let queue = Arc::new(
        MutationQueue::new(MemoryStorage::new(), "clipsync:mutations")
            .with_clock(Arc::new(ManualClock::new(1_700_000_000_000)))
            .with_coalescing(coalesce),
    );
    let sync = ClipSync::new(Actor::new(ME_ID, ME), queue, net.clone(), server.clone());
    sync.posts().insert(post_p1());
    sync.posts().insert(Post::new("P2", "U2"));
    sync.posts().insert(Post::new("MINE", ME));
    sync.threads().insert(CommentThread::new("P1", vec![parent]));

    Rig { sync, net, server }
}
