use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::CoreError;
use crate::ids::new_record_id;
use crate::kind::MutationKind;

/// A user action that has not been assigned an id or timestamp yet.
///
/// Field names follow the persisted JSON shape: `type`, `postId`,
/// `commentId`, `parentId`, `userId`, plus the kind-specific extras
/// `text`, `userHandle`, `authorHandle` and `placeholderId`. Absent extras
/// are omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mutation {
    #[serde(rename = "type")]
    pub kind: MutationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Handle of the acting user, used for attribution (reclips, comments).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_handle: Option<String>,
    /// Handle of the followed author (follow only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_handle: Option<String>,
    /// Local id of the comment shown while a comment or reply waits in the
    /// queue, so a drain can put the server's comment in its place.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder_id: Option<String>,
}

impl Mutation {
    fn bare(kind: MutationKind, user_id: &str) -> Self {
        Mutation {
            kind,
            post_id: None,
            comment_id: None,
            parent_id: None,
            user_id: user_id.to_string(),
            text: None,
            user_handle: None,
            author_handle: None,
            placeholder_id: None,
        }
    }

    fn on_post(kind: MutationKind, post_id: &str, user_id: &str) -> Self {
        Mutation {
            post_id: Some(post_id.to_string()),
            ..Mutation::bare(kind, user_id)
        }
    }

    pub fn like(post_id: &str, user_id: &str) -> Self {
        Mutation::on_post(MutationKind::Like, post_id, user_id)
    }

    pub fn bookmark(post_id: &str, user_id: &str) -> Self {
        Mutation::on_post(MutationKind::Bookmark, post_id, user_id)
    }

    pub fn follow(post_id: &str, user_id: &str, author_handle: &str) -> Self {
        Mutation {
            author_handle: Some(author_handle.to_string()),
            ..Mutation::on_post(MutationKind::Follow, post_id, user_id)
        }
    }

    pub fn reclip(post_id: &str, user_id: &str, user_handle: &str) -> Self {
        Mutation {
            user_handle: Some(user_handle.to_string()),
            ..Mutation::on_post(MutationKind::Reclip, post_id, user_id)
        }
    }

    pub fn comment(post_id: &str, user_id: &str, text: &str) -> Self {
        Mutation {
            text: Some(text.to_string()),
            ..Mutation::on_post(MutationKind::Comment, post_id, user_id)
        }
    }

    pub fn reply(post_id: &str, parent_id: &str, user_id: &str, text: &str) -> Self {
        Mutation {
            parent_id: Some(parent_id.to_string()),
            text: Some(text.to_string()),
            ..Mutation::on_post(MutationKind::Reply, post_id, user_id)
        }
    }

    pub fn comment_like(comment_id: &str, user_id: &str) -> Self {
        Mutation {
            comment_id: Some(comment_id.to_string()),
            ..Mutation::bare(MutationKind::CommentLike, user_id)
        }
    }

    /// A like on `reply_id`, nested one level under `parent_id`.
    pub fn reply_like(parent_id: &str, reply_id: &str, user_id: &str) -> Self {
        Mutation {
            comment_id: Some(reply_id.to_string()),
            parent_id: Some(parent_id.to_string()),
            ..Mutation::bare(MutationKind::ReplyLike, user_id)
        }
    }

    pub fn view(post_id: &str, user_id: &str) -> Self {
        Mutation::on_post(MutationKind::View, post_id, user_id)
    }

    pub fn share(post_id: &str, user_id: &str) -> Self {
        Mutation::on_post(MutationKind::Share, post_id, user_id)
    }

    /// Attach the acting user's handle for attribution.
    pub fn with_user_handle(mut self, handle: &str) -> Self {
        self.user_handle = Some(handle.to_string());
        self
    }

    /// Remember the local placeholder a queued comment or reply stands for.
    pub fn with_placeholder(mut self, placeholder_id: &str) -> Self {
        self.placeholder_id = Some(placeholder_id.to_string());
        self
    }

    /// The entity this action addresses: the comment for comment/reply
    /// likes, the post for everything else.
    pub fn target_id(&self) -> &str {
        let target = match self.kind {
            MutationKind::CommentLike | MutationKind::ReplyLike => &self.comment_id,
            _ => &self.post_id,
        };
        target.as_deref().unwrap_or_default()
    }

    /// Check that every field this kind requires is present and non-empty.
    pub fn validate(&self) -> Result<(), CoreError> {
        let missing = |field: &str| CoreError::InvalidMutation {
            kind: self.kind,
            reason: format!("missing {field}"),
        };
        let present = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.trim().is_empty());

        if self.user_id.trim().is_empty() {
            return Err(missing("userId"));
        }

        match self.kind {
            MutationKind::CommentLike => {
                if !present(&self.comment_id) {
                    return Err(missing("commentId"));
                }
            }
            MutationKind::ReplyLike => {
                if !present(&self.comment_id) {
                    return Err(missing("commentId"));
                }
                if !present(&self.parent_id) {
                    return Err(missing("parentId"));
                }
            }
            _ => {
                if !present(&self.post_id) {
                    return Err(missing("postId"));
                }
            }
        }

        match self.kind {
            MutationKind::Comment | MutationKind::Reply if !present(&self.text) => {
                Err(missing("text"))
            }
            MutationKind::Reply if !present(&self.parent_id) => Err(missing("parentId")),
            MutationKind::Reclip if !present(&self.user_handle) => Err(missing("userHandle")),
            MutationKind::Follow if !present(&self.author_handle) => {
                Err(missing("authorHandle"))
            }
            _ => Ok(()),
        }
    }
}

/// A durable description of one deferred user action.
///
/// Records are never edited after creation; the queue only appends them
/// and removes them by id once a replay succeeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationRecord {
    pub id: String,
    /// Enqueue time, epoch milliseconds.
    pub at: i64,
    #[serde(flatten)]
    pub mutation: Mutation,
}

impl MutationRecord {
    /// Stamp a mutation with a fresh id and the clock's current time.
    pub fn stamp(mutation: Mutation, clock: &dyn Clock) -> Self {
        MutationRecord {
            id: new_record_id(),
            at: clock.now_ms(),
            mutation,
        }
    }

    pub fn kind(&self) -> MutationKind {
        self.mutation.kind
    }

    pub fn target_id(&self) -> &str {
        self.mutation.target_id()
    }

    pub fn user_id(&self) -> &str {
        &self.mutation.user_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use serde_json::json;

    #[test]
    fn like_record_matches_persisted_shape() {
        let record = MutationRecord {
            id: "r-1".to_string(),
            at: 1_700_000_000_000,
            mutation: Mutation::like("P1", "u-1"),
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "r-1",
                "at": 1_700_000_000_000i64,
                "type": "like",
                "postId": "P1",
                "userId": "u-1"
            })
        );
    }

    #[test]
    fn reply_like_uses_comment_and_parent_ids() {
        let m = Mutation::reply_like("c-parent", "c-reply", "u-1");
        let value = serde_json::to_value(&m).unwrap();
        assert_eq!(value["type"], "replyLike");
        assert_eq!(value["commentId"], "c-reply");
        assert_eq!(value["parentId"], "c-parent");
        assert!(value.get("postId").is_none());
        assert_eq!(m.target_id(), "c-reply");
    }

    #[test]
    fn record_parses_from_stored_json() {
        let raw = r#"{"id":"x","at":5,"type":"comment","postId":"P1","userId":"u","text":"hi"}"#;
        let record: MutationRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(record.kind(), MutationKind::Comment);
        assert_eq!(record.mutation.text.as_deref(), Some("hi"));
        assert_eq!(record.target_id(), "P1");
    }

    #[test]
    fn placeholder_id_round_trips_through_storage() {
        let m = Mutation::comment("P1", "u", "hi").with_placeholder("pending-1");
        let value = serde_json::to_value(&m).unwrap();
        assert_eq!(value["placeholderId"], "pending-1");

        let back: Mutation = serde_json::from_value(value).unwrap();
        assert_eq!(back.placeholder_id.as_deref(), Some("pending-1"));
        assert!(Mutation::like("P1", "u").placeholder_id.is_none());
    }

    #[test]
    fn stamp_uses_clock_and_fresh_ids() {
        let clock = ManualClock::new(42);
        let a = MutationRecord::stamp(Mutation::view("P1", "u"), &clock);
        let b = MutationRecord::stamp(Mutation::view("P1", "u"), &clock);
        assert_eq!(a.at, 42);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn validate_accepts_every_constructor() {
        let all = [
            Mutation::like("P1", "u"),
            Mutation::bookmark("P1", "u"),
            Mutation::follow("P1", "u", "author"),
            Mutation::reclip("P1", "u", "me"),
            Mutation::comment("P1", "u", "hi"),
            Mutation::reply("P1", "c1", "u", "hey"),
            Mutation::comment_like("c1", "u"),
            Mutation::reply_like("c1", "r1", "u"),
            Mutation::view("P1", "u"),
            Mutation::share("P1", "u"),
        ];
        for m in all {
            assert!(m.validate().is_ok(), "{:?} should validate", m.kind);
        }
    }

    #[test]
    fn validate_rejects_blank_comment_text() {
        let err = Mutation::comment("P1", "u", "   ").validate().unwrap_err();
        assert_eq!(
            err,
            CoreError::InvalidMutation {
                kind: MutationKind::Comment,
                reason: "missing text".to_string()
            }
        );
    }

    #[test]
    fn validate_rejects_reply_without_parent() {
        let mut m = Mutation::reply("P1", "c1", "u", "hey");
        m.parent_id = None;
        assert!(matches!(
            m.validate(),
            Err(CoreError::InvalidMutation { kind: MutationKind::Reply, .. })
        ));
    }

    #[test]
    fn validate_rejects_missing_user() {
        assert!(Mutation::like("P1", "").validate().is_err());
    }
}
