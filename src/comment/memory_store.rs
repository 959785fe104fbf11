use crate::comment::model::{Comment, CommentFilter, NewComment};
use crate::comment::store::CommentStore;
use crate::utils::error::CustomError;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

#[derive(Default)]
struct MemoryState {
    rows: Vec<Comment>,
    last_id: i64,
}

/// Process-local comment store. Readers share the lock; inserts take it
/// exclusively.
#[derive(Default)]
pub struct MemoryCommentStore {
    state: RwLock<MemoryState>,
}

impl MemoryCommentStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn select<F>(&self, predicate: F) -> Vec<Comment>
    where
        F: Fn(&Comment) -> bool,
    {
        let state = self.state.read().await;
        let mut rows: Vec<Comment> = state
            .rows
            .iter()
            .filter(|c| predicate(*c))
            .cloned()
            .collect();
        rows.sort_by(Comment::sibling_order);
        rows
    }
}

#[async_trait]
impl CommentStore for MemoryCommentStore {
    async fn fetch_top_level(&self, filter: &CommentFilter) -> Result<Vec<Comment>, CustomError> {
        Ok(self.select(|c| c.is_root() && filter.matches(c)).await)
    }

    async fn fetch_children(&self, parent_id: i64) -> Result<Vec<Comment>, CustomError> {
        Ok(self.select(|c| c.parent_id == parent_id).await)
    }

    async fn fetch_descendants(&self, post_id: i64) -> Result<Vec<Comment>, CustomError> {
        Ok(self.select(|c| c.post_id == post_id).await)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Comment>, CustomError> {
        let state = self.state.read().await;
        Ok(state.rows.iter().find(|c| c.id == id).cloned())
    }

    async fn insert(&self, comment: NewComment) -> Result<Comment, CustomError> {
        let mut state = self.state.write().await;
        state.last_id += 1;

        let row = Comment {
            id: state.last_id,
            post_id: comment.post_id,
            parent_id: comment.parent_id,
            name: comment.name,
            email: comment.email,
            text: comment.text,
            approved: false,
            created_at: Utc::now(),
        };
        state.rows.push(row.clone());

        Ok(row)
    }
}

#[cfg(test)]
impl MemoryCommentStore {
    /// Stores `row` verbatim, bypassing id and timestamp assignment.
    pub async fn insert_raw(&self, row: Comment) {
        let mut state = self.state.write().await;
        state.last_id = state.last_id.max(row.id);
        state.rows.push(row);
    }

    /// Stands in for the external moderation step.
    pub async fn set_approved(&self, id: i64, approved: bool) {
        let mut state = self.state.write().await;
        if let Some(row) = state.rows.iter_mut().find(|c| c.id == id) {
            row.approved = approved;
        }
    }

    pub async fn row_count(&self) -> usize {
        self.state.read().await.rows.len()
    }
}
