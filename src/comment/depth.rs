use crate::comment::model::{MAX_DEPTH, ROOT_PARENT_ID};
use crate::comment::store::CommentStore;
use crate::utils::error::CustomError;
use log::{error, info, warn};
use std::sync::Arc;

/// Upper bound on links followed while looking for a root. Legal data never
/// needs more than `MAX_DEPTH`.
pub const MAX_PARENT_HOPS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The new comment may be stored at `depth`. `parent_post` is the post of
    /// the parent row, absent for roots.
    Accepted {
        depth: usize,
        parent_post: Option<i64>,
    },
    Rejected(Rejection),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    DepthExceeded,
    NotFound,
}

impl Rejection {
    pub fn into_error(self, parent_id: i64) -> CustomError {
        match self {
            Rejection::NotFound => CustomError::NotFoundError(format!(
                "The comment with id {} was not found",
                parent_id
            )),
            Rejection::DepthExceeded => CustomError::DepthExceededError(format!(
                "Replies can be nested at most {} levels deep",
                MAX_DEPTH
            )),
        }
    }
}

pub struct DepthValidator {
    store: Arc<dyn CommentStore>,
}

impl DepthValidator {
    pub fn new(store: Arc<dyn CommentStore>) -> Self {
        DepthValidator { store }
    }

    /// Decides whether `parent_id` can receive another reply. The parent row
    /// is read once; only its ancestors are walked after that.
    pub async fn validate(&self, parent_id: i64) -> Result<Verdict, CustomError> {
        if parent_id == ROOT_PARENT_ID {
            return Ok(Verdict::Accepted {
                depth: 0,
                parent_post: None,
            });
        }

        let Some(parent) = self.store.find_by_id(parent_id).await? else {
            warn!("Reply rejected: parent comment {} does not exist", parent_id);
            return Ok(Verdict::Rejected(Rejection::NotFound));
        };

        let parent_depth = if parent.is_root() {
            0
        } else {
            self.ancestors(parent_id, parent.parent_id).await?
        };

        if parent_depth < MAX_DEPTH {
            Ok(Verdict::Accepted {
                depth: parent_depth + 1,
                parent_post: Some(parent.post_id),
            })
        } else {
            info!(
                "Reply rejected: comment {} is already at depth {}",
                parent_id, parent_depth
            );
            Ok(Verdict::Rejected(Rejection::DepthExceeded))
        }
    }

    /// Number of comments from `grandparent_id` up to its root.
    async fn ancestors(&self, parent_id: i64, grandparent_id: i64) -> Result<usize, CustomError> {
        let chain = self
            .store
            .fetch_parent_chain(grandparent_id, MAX_PARENT_HOPS - 1)
            .await
            .map_err(|e| match e {
                CustomError::NotFoundError(_) => {
                    error!(
                        "Comment {} references missing parent {}",
                        parent_id, grandparent_id
                    );
                    CustomError::DataIntegrityError("Comment references a missing parent".into())
                }
                other => other,
            })?;

        Ok(chain.len())
    }
}
