use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// The interactive verbs that can be deferred while offline.
///
/// Serialized as the `type` field of a persisted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MutationKind {
    Like,
    Bookmark,
    Follow,
    Reclip,
    Comment,
    Reply,
    CommentLike,
    ReplyLike,
    View,
    Share,
}

impl MutationKind {
    pub const ALL: [MutationKind; 10] = [
        MutationKind::Like,
        MutationKind::Bookmark,
        MutationKind::Follow,
        MutationKind::Reclip,
        MutationKind::Comment,
        MutationKind::Reply,
        MutationKind::CommentLike,
        MutationKind::ReplyLike,
        MutationKind::View,
        MutationKind::Share,
    ];

    /// Wire name, identical to the serde representation.
    pub fn as_str(self) -> &'static str {
        match self {
            MutationKind::Like => "like",
            MutationKind::Bookmark => "bookmark",
            MutationKind::Follow => "follow",
            MutationKind::Reclip => "reclip",
            MutationKind::Comment => "comment",
            MutationKind::Reply => "reply",
            MutationKind::CommentLike => "commentLike",
            MutationKind::ReplyLike => "replyLike",
            MutationKind::View => "view",
            MutationKind::Share => "share",
        }
    }

    /// Kinds whose remote endpoint flips a boolean rather than appending.
    pub fn is_toggle(self) -> bool {
        matches!(
            self,
            MutationKind::Like
                | MutationKind::Bookmark
                | MutationKind::Follow
                | MutationKind::CommentLike
                | MutationKind::ReplyLike
        )
    }

    /// Telemetry-like kinds: failures are swallowed and never surfaced to the user.
    pub fn is_best_effort(self) -> bool {
        matches!(self, MutationKind::View | MutationKind::Share)
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MutationKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MutationKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| CoreError::UnknownKind {
                name: s.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_match_serde() {
        for kind in MutationKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn parse_nested_kinds() {
        assert_eq!(
            "commentLike".parse::<MutationKind>().unwrap(),
            MutationKind::CommentLike
        );
        assert_eq!(
            "replyLike".parse::<MutationKind>().unwrap(),
            MutationKind::ReplyLike
        );
    }

    #[test]
    fn parse_unknown_kind_fails() {
        let err = "post".parse::<MutationKind>().unwrap_err();
        assert_eq!(
            err,
            CoreError::UnknownKind {
                name: "post".to_string()
            }
        );
    }

    #[test]
    fn view_and_share_are_best_effort() {
        let best_effort: Vec<_> = MutationKind::ALL
            .into_iter()
            .filter(|k| k.is_best_effort())
            .collect();
        assert_eq!(best_effort, vec![MutationKind::View, MutationKind::Share]);
    }

    #[test]
    fn reclip_is_not_a_toggle() {
        assert!(!MutationKind::Reclip.is_toggle());
        assert!(MutationKind::ReplyLike.is_toggle());
    }
}
