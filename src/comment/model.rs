use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// `parent_id` value marking a root comment
pub const ROOT_PARENT_ID: i64 = 0;

/// Deepest level a reply may sit at (root = 0, reply = 1, reply-to-reply = 2)
pub const MAX_DEPTH: usize = 2;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub parent_id: i64,
    pub name: String,
    pub email: String,
    pub text: String,
    pub approved: bool,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn is_root(&self) -> bool {
        self.parent_id == ROOT_PARENT_ID
    }

    /// Sibling order: oldest first, id breaks ties.
    pub fn sibling_order(a: &Comment, b: &Comment) -> Ordering {
        a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id))
    }
}

/// A comment together with its ordered replies. Rebuilt on every read.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct CommentNode {
    #[serde(flatten)]
    pub comment: Comment,
    pub replies: Vec<CommentNode>,
}

impl CommentNode {
    pub fn leaf(comment: Comment) -> Self {
        CommentNode {
            comment,
            replies: Vec::new(),
        }
    }
}

/// Validated input handed to the store. `id`, `approved` and `created_at` are
/// always decided by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewComment {
    pub post_id: i64,
    pub parent_id: i64,
    pub name: String,
    pub email: String,
    pub text: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateCommentRequest {
    pub parent_id: Option<i64>,
    pub name: Option<String>,
    pub email: Option<String>,
    #[serde(alias = "comment")]
    pub text: Option<String>,
}

/// Filters for top-level comments. Each field is independent; supplied ones
/// are combined with AND.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
pub struct CommentFilter {
    pub post_id: Option<i64>,
    pub email: Option<String>,
    pub approved: Option<bool>,
}

impl CommentFilter {
    pub fn matches(&self, comment: &Comment) -> bool {
        self.post_id.is_none_or(|p| comment.post_id == p)
            && self.email.as_deref().is_none_or(|e| comment.email == e)
            && self.approved.is_none_or(|a| comment.approved == a)
    }
}
