use crate::comment::model::{Comment, CommentFilter, NewComment, ROOT_PARENT_ID};
use crate::utils::error::CustomError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use log::{error, info};
use mongodb::bson::{self, Document, doc};
use mongodb::options::ReturnDocument;
use mongodb::{Client, Collection, IndexModel};
use serde::{Deserialize, Serialize};

/// Persistence boundary for comments. Implementations return rows in sibling
/// order (`created_at` asc, `id` asc) and never apply business rules.
#[async_trait]
pub trait CommentStore: Send + Sync {
    /// Root comments matching every supplied filter
    async fn fetch_top_level(&self, filter: &CommentFilter) -> Result<Vec<Comment>, CustomError>;

    /// Direct children of `parent_id`
    async fn fetch_children(&self, parent_id: i64) -> Result<Vec<Comment>, CustomError>;

    /// Every comment of a post, roots and replies alike
    async fn fetch_descendants(&self, post_id: i64) -> Result<Vec<Comment>, CustomError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Comment>, CustomError>;

    /// Persists the comment, assigning `id` and `created_at`. New comments are
    /// never approved.
    async fn insert(&self, comment: NewComment) -> Result<Comment, CustomError>;

    async fn exists(&self, id: i64) -> Result<bool, CustomError> {
        Ok(self.find_by_id(id).await?.is_some())
    }

    /// Ids from `comment_id` up to and including its root. Walking more than
    /// `max_hops` links, or hitting a dangling link, means the stored data is
    /// corrupt.
    async fn fetch_parent_chain(
        &self,
        comment_id: i64,
        max_hops: usize,
    ) -> Result<Vec<i64>, CustomError> {
        let mut chain = vec![comment_id];
        let mut current = comment_id;

        loop {
            let parent_id = match self.find_by_id(current).await? {
                Some(comment) => comment.parent_id,
                None if current == comment_id => {
                    return Err(CustomError::NotFoundError(format!(
                        "The comment with id {} was not found",
                        comment_id
                    )));
                }
                None => {
                    error!(
                        "Comment chain from {} references missing comment {}",
                        comment_id, current
                    );
                    return Err(CustomError::DataIntegrityError(
                        "Comment references a missing parent".into(),
                    ));
                }
            };

            if parent_id == ROOT_PARENT_ID {
                return Ok(chain);
            }

            if chain.len() > max_hops {
                error!(
                    "Parent chain from comment {} exceeded {} hops: {:?}",
                    comment_id, max_hops, chain
                );
                return Err(CustomError::DataIntegrityError(
                    "Comment ancestry is malformed".into(),
                ));
            }

            chain.push(parent_id);
            current = parent_id;
        }
    }
}

const COMMENTS_COLLECTION: &str = "comments";
const COUNTERS_COLLECTION: &str = "counters";

/// Sibling order shared by every read: `create_date` asc, then `_id` asc
fn sibling_sort() -> Document {
    doc! { "create_date": 1, "_id": 1 }
}

/// Roots matching every filter that is present
fn top_level_query(filter: &CommentFilter) -> Document {
    let mut query = doc! { "parent_id": ROOT_PARENT_ID };
    if let Some(post_id) = filter.post_id {
        query.insert("post_id", post_id);
    }
    if let Some(email) = &filter.email {
        query.insert("email", email.as_str());
    }
    if let Some(approved) = filter.approved {
        query.insert("is_approved", approved);
    }
    query
}

fn children_query(parent_id: i64) -> Document {
    doc! { "parent_id": parent_id }
}

fn descendants_query(post_id: i64) -> Document {
    doc! { "post_id": post_id }
}

fn counter_key() -> Document {
    doc! { "_id": COMMENTS_COLLECTION }
}

fn counter_increment() -> Document {
    doc! { "$inc": { "seq": 1_i64 } }
}

/// Raises the counter to at least `max_id`; never lowers it.
fn counter_seed(max_id: i64) -> Document {
    doc! { "$max": { "seq": max_id } }
}

/// Storage layout of one row in the `comments` collection
#[derive(Debug, Serialize, Deserialize)]
struct CommentDocument {
    #[serde(rename = "_id")]
    id: i64,
    post_id: i64,
    #[serde(default)]
    parent_id: i64,
    name: String,
    email: String,
    comment: String,
    #[serde(default)]
    is_approved: bool,
    create_date: bson::DateTime,
}

impl TryFrom<CommentDocument> for Comment {
    type Error = CustomError;

    fn try_from(doc: CommentDocument) -> Result<Self, Self::Error> {
        let created_at = DateTime::<Utc>::from_timestamp_millis(doc.create_date.timestamp_millis())
            .ok_or_else(|| {
                error!("Comment {} has an out-of-range create_date", doc.id);
                CustomError::DataIntegrityError("Comment has an invalid timestamp".into())
            })?;

        Ok(Comment {
            id: doc.id,
            post_id: doc.post_id,
            parent_id: doc.parent_id,
            name: doc.name,
            email: doc.email,
            text: doc.comment,
            approved: doc.is_approved,
            created_at,
        })
    }
}

pub struct MongoCommentStore {
    collection: Collection<CommentDocument>,
    counters: Collection<Document>,
}

impl MongoCommentStore {
    pub async fn new(client: &Client, database: &str) -> Result<Self, CustomError> {
        let db = client.database(database);
        let store = MongoCommentStore {
            collection: db.collection::<CommentDocument>(COMMENTS_COLLECTION),
            counters: db.collection::<Document>(COUNTERS_COLLECTION),
        };

        store.ensure_indexes().await?;
        store.seed_counter().await?;
        info!("Comment store ready on database '{}'", database);

        Ok(store)
    }

    async fn ensure_indexes(&self) -> Result<(), CustomError> {
        let indexes = vec![
            IndexModel::builder()
                .keys(doc! { "post_id": 1, "parent_id": 1, "create_date": 1, "_id": 1 })
                .build(),
            IndexModel::builder()
                .keys(doc! { "parent_id": 1, "create_date": 1, "_id": 1 })
                .build(),
        ];

        self.collection
            .create_indexes(indexes)
            .await
            .map_err(|e| CustomError::store("Failed to create comment indexes", e))?;

        Ok(())
    }

    /// Keeps id allocation ahead of rows that were written without the
    /// counter, e.g. after a restore.
    async fn seed_counter(&self) -> Result<(), CustomError> {
        let highest = self
            .collection
            .clone_with_type::<Document>()
            .find_one(doc! {})
            .sort(doc! { "_id": -1 })
            .projection(doc! { "_id": 1 })
            .await
            .map_err(|e| CustomError::store("Failed to read the highest comment id", e))?;

        let max_id = match highest {
            Some(row) => row
                .get_i64("_id")
                .map_err(|e| CustomError::store("Failed to read the highest comment id", e))?,
            None => return Ok(()),
        };

        self.counters
            .update_one(counter_key(), counter_seed(max_id))
            .upsert(true)
            .await
            .map_err(|e| CustomError::store("Failed to seed the comment id counter", e))?;

        info!("Comment id counter seeded from existing id {}", max_id);
        Ok(())
    }

    async fn find_sorted(&self, filter: Document) -> Result<Vec<Comment>, CustomError> {
        let cursor = self
            .collection
            .find(filter)
            .sort(sibling_sort())
            .await
            .map_err(|e| CustomError::store("Failed to fetch comments", e))?;

        let docs: Vec<CommentDocument> = cursor
            .try_collect()
            .await
            .map_err(|e| CustomError::store("Failed to collect comments", e))?;

        docs.into_iter().map(Comment::try_from).collect()
    }

    async fn next_id(&self) -> Result<i64, CustomError> {
        let counter = self
            .counters
            .find_one_and_update(counter_key(), counter_increment())
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|e| CustomError::store("Failed to allocate comment id", e))?
            .ok_or_else(|| {
                CustomError::store("Failed to allocate comment id", "counter upsert returned nothing")
            })?;

        counter
            .get_i64("seq")
            .map_err(|e| CustomError::store("Failed to allocate comment id", e))
    }
}

#[async_trait]
impl CommentStore for MongoCommentStore {
    async fn fetch_top_level(&self, filter: &CommentFilter) -> Result<Vec<Comment>, CustomError> {
        self.find_sorted(top_level_query(filter)).await
    }

    async fn fetch_children(&self, parent_id: i64) -> Result<Vec<Comment>, CustomError> {
        self.find_sorted(children_query(parent_id)).await
    }

    async fn fetch_descendants(&self, post_id: i64) -> Result<Vec<Comment>, CustomError> {
        self.find_sorted(descendants_query(post_id)).await
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Comment>, CustomError> {
        self.collection
            .find_one(doc! { "_id": id })
            .await
            .map_err(|e| CustomError::store("Failed to fetch comment", e))?
            .map(Comment::try_from)
            .transpose()
    }

    async fn insert(&self, comment: NewComment) -> Result<Comment, CustomError> {
        let document = CommentDocument {
            id: self.next_id().await?,
            post_id: comment.post_id,
            parent_id: comment.parent_id,
            name: comment.name,
            email: comment.email,
            comment: comment.text,
            is_approved: false,
            create_date: bson::DateTime::now(),
        };

        self.collection
            .insert_one(&document)
            .await
            .map_err(|e| CustomError::store("Failed to add comment", e))?;

        Comment::try_from(document)
    }
}
