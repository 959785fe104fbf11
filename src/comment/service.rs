use crate::comment::depth::{DepthValidator, Verdict};
use crate::comment::model::{
    Comment, CommentFilter, CommentNode, CreateCommentRequest, NewComment,
};
use crate::comment::store::CommentStore;
use crate::comment::tree::TreeAssembler;
use crate::utils::error::CustomError;
use crate::utils::validation::{required_text, validate_email, validate_post_id};
use actix_web::rt::time::timeout;
use futures_util::future::try_join_all;
use log::{error, info, warn};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Which comments the `approved` filter of a listing applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApprovalScope {
    /// Only roots are filtered; each kept root brings its whole reply tree.
    #[default]
    Roots,
    /// Replies must match as well; a dropped reply takes its subtree with it.
    Tree,
}

impl ApprovalScope {
    fn prune_replies(self, rows: &mut Vec<Comment>, approved: Option<bool>) {
        if let (ApprovalScope::Tree, Some(flag)) = (self, approved) {
            rows.retain(|c| c.is_root() || c.approved == flag);
        }
    }
}

impl FromStr for ApprovalScope {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "roots" => Ok(ApprovalScope::Roots),
            "tree" => Ok(ApprovalScope::Tree),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommentSettings {
    pub approval_scope: ApprovalScope,
    /// Deadline covering the parent lookup and ancestry walk of one new
    /// comment. A write that has been dispatched is always awaited.
    pub write_timeout: Duration,
}

impl Default for CommentSettings {
    fn default() -> Self {
        CommentSettings {
            approval_scope: ApprovalScope::default(),
            write_timeout: Duration::from_secs(5),
        }
    }
}

pub struct CommentService {
    store: Arc<dyn CommentStore>,
    validator: DepthValidator,
    settings: CommentSettings,
}

impl CommentService {
    pub fn new(store: Arc<dyn CommentStore>, settings: CommentSettings) -> Self {
        CommentService {
            validator: DepthValidator::new(store.clone()),
            store,
            settings,
        }
    }

    /// Root comments matching `filter`, each with its nested replies
    pub async fn list_comments(
        &self,
        filter: CommentFilter,
    ) -> Result<Vec<CommentNode>, CustomError> {
        let filter = normalize_filter(filter)
            .inspect_err(|e| warn!("Comment listing rejected: {}", e))?;

        let roots = self.store.fetch_top_level(&filter).await?;
        if roots.is_empty() {
            return Ok(Vec::new());
        }

        let mut post_ids: Vec<i64> = roots.iter().map(|c| c.post_id).collect();
        post_ids.sort_unstable();
        post_ids.dedup();

        let batches = try_join_all(
            post_ids
                .iter()
                .map(|&post_id| self.store.fetch_descendants(post_id)),
        )
        .await?;

        let mut rows: Vec<Comment> = batches.into_iter().flatten().collect();
        self.settings
            .approval_scope
            .prune_replies(&mut rows, filter.approved);

        TreeAssembler::from_rows(rows).attach(roots)
    }

    /// Add a comment or reply to a post
    pub async fn add_comment(
        &self,
        post_id: i64,
        request: CreateCommentRequest,
    ) -> Result<CommentNode, CustomError> {
        let comment = validate_request(post_id, request)
            .inspect_err(|e| warn!("Comment rejected for post {}: {}", post_id, e))?;

        let deadline = self.settings.write_timeout;
        let depth = match timeout(deadline, self.check_parent(&comment)).await {
            Ok(result) => result?,
            Err(_) => {
                error!(
                    "Checking the parent of a comment on post {} did not finish within {:?}",
                    post_id, deadline
                );
                return Err(CustomError::StoreError(
                    "Timed out while checking the parent comment".into(),
                ));
            }
        };

        let saved = self.store.insert(comment).await?;
        info!(
            "Comment {} added to post {} at depth {}",
            saved.id, saved.post_id, depth
        );

        Ok(CommentNode::leaf(saved))
    }

    /// Depth the new comment will be stored at, once its parent is known to
    /// accept it
    async fn check_parent(&self, comment: &NewComment) -> Result<usize, CustomError> {
        let parent_id = comment.parent_id;

        let (depth, parent_post) = match self.validator.validate(parent_id).await? {
            Verdict::Accepted { depth, parent_post } => (depth, parent_post),
            Verdict::Rejected(rejection) => return Err(rejection.into_error(parent_id)),
        };

        if let Some(parent_post) = parent_post.filter(|&post| post != comment.post_id) {
            warn!(
                "Reply to comment {} (post {}) was sent to post {}",
                parent_id, parent_post, comment.post_id
            );
            return Err(CustomError::ValidationError(
                "A reply must belong to the same post as its parent".into(),
            ));
        }

        Ok(depth)
    }
}

fn validate_request(post_id: i64, request: CreateCommentRequest) -> Result<NewComment, CustomError> {
    validate_post_id(post_id)?;

    let parent_id = match request.parent_id {
        Some(id) if id >= 0 => id,
        Some(_) => {
            return Err(CustomError::ValidationError(
                "The parent_id cannot be negative".into(),
            ));
        }
        None => {
            return Err(CustomError::ValidationError(
                "The parent_id must be provided".into(),
            ));
        }
    };

    let name = required_text("name", request.name.as_deref())?;
    let email = required_text("email", request.email.as_deref())?;
    let text = required_text("text", request.text.as_deref())?;
    validate_email(&email)?;

    Ok(NewComment {
        post_id,
        parent_id,
        name,
        email,
        text,
    })
}

fn normalize_filter(filter: CommentFilter) -> Result<CommentFilter, CustomError> {
    if let Some(post_id) = filter.post_id {
        validate_post_id(post_id)?;
    }

    let email = filter
        .email
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty());

    Ok(CommentFilter { email, ..filter })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comment::memory_store::MemoryCommentStore;
    use crate::comment::memory_store::fixtures::{root, row};
    use actix_web::rt::time::sleep;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn request(parent_id: i64, text: &str) -> CreateCommentRequest {
        CreateCommentRequest {
            parent_id: Some(parent_id),
            name: Some("Ada".into()),
            email: Some("ada@example.com".into()),
            text: Some(text.into()),
        }
    }

    fn service_with(settings: CommentSettings) -> (Arc<MemoryCommentStore>, CommentService) {
        let store = Arc::new(MemoryCommentStore::new());
        let service = CommentService::new(store.clone(), settings);
        (store, service)
    }

    fn service() -> (Arc<MemoryCommentStore>, CommentService) {
        service_with(CommentSettings::default())
    }

    fn for_post(post_id: i64) -> CommentFilter {
        CommentFilter {
            post_id: Some(post_id),
            ..Default::default()
        }
    }

    #[actix_web::test]
    async fn nesting_stops_at_two_reply_levels() {
        let (store, service) = service();

        let c1 = service.add_comment(5, request(0, "root")).await.unwrap();
        assert_eq!(c1.comment.parent_id, 0);
        assert!(c1.replies.is_empty());
        assert!(!c1.comment.approved);

        let r1 = service.add_comment(5, request(c1.comment.id, "reply")).await.unwrap();
        assert_eq!(r1.comment.parent_id, c1.comment.id);

        let r2 = service.add_comment(5, request(r1.comment.id, "reply to reply")).await.unwrap();
        assert_eq!(r2.comment.parent_id, r1.comment.id);

        let rows_before = store.row_count().await;
        let err = service
            .add_comment(5, request(r2.comment.id, "too deep"))
            .await
            .unwrap_err();

        assert!(matches!(err, CustomError::DepthExceededError(_)));
        assert_eq!(store.row_count().await, rows_before);

        let tree = service.list_comments(for_post(5)).await.unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].replies[0].replies[0].comment.id, r2.comment.id);
        assert!(tree[0].replies[0].replies[0].replies.is_empty());
    }

    #[actix_web::test]
    async fn unknown_parent_writes_nothing() {
        let (store, service) = service();

        let err = service.add_comment(5, request(404, "orphan")).await.unwrap_err();

        assert!(matches!(err, CustomError::NotFoundError(_)));
        assert_eq!(store.row_count().await, 0);
    }

    #[actix_web::test]
    async fn invalid_input_is_rejected_before_the_store() {
        let (store, service) = service();

        let cases = vec![
            (0, request(0, "hi")),
            (-2, request(0, "hi")),
            (5, request(-1, "hi")),
            (5, request(0, "   ")),
            (
                5,
                CreateCommentRequest {
                    name: None,
                    ..request(0, "hi")
                },
            ),
            (
                5,
                CreateCommentRequest {
                    parent_id: None,
                    ..request(0, "hi")
                },
            ),
            (
                5,
                CreateCommentRequest {
                    email: Some("not-an-email".into()),
                    ..request(0, "hi")
                },
            ),
        ];

        for (post_id, req) in cases {
            let err = service.add_comment(post_id, req).await.unwrap_err();
            assert!(matches!(err, CustomError::ValidationError(_)), "{}", err);
        }
        assert_eq!(store.row_count().await, 0);
    }

    #[actix_web::test]
    async fn stores_trimmed_fields() {
        let (_, service) = service();

        let node = service
            .add_comment(
                5,
                CreateCommentRequest {
                    parent_id: Some(0),
                    name: Some("  Ada  ".into()),
                    email: Some(" ada@example.com ".into()),
                    text: Some("\thello\n".into()),
                },
            )
            .await
            .unwrap();

        assert_eq!(node.comment.name, "Ada");
        assert_eq!(node.comment.email, "ada@example.com");
        assert_eq!(node.comment.text, "hello");
    }

    #[actix_web::test]
    async fn reply_must_stay_on_the_parent_post() {
        let (store, service) = service();
        let root = service.add_comment(5, request(0, "root")).await.unwrap();

        let err = service
            .add_comment(6, request(root.comment.id, "wrong post"))
            .await
            .unwrap_err();

        assert!(matches!(err, CustomError::ValidationError(_)));
        assert_eq!(store.row_count().await, 1);
    }

    #[actix_web::test]
    async fn listing_is_ordered_and_repeatable() {
        let (_, service) = service();
        let a = service.add_comment(5, request(0, "a")).await.unwrap().comment;
        let b = service.add_comment(5, request(0, "b")).await.unwrap().comment;
        let a1 = service.add_comment(5, request(a.id, "a1")).await.unwrap().comment;
        let a2 = service.add_comment(5, request(a.id, "a2")).await.unwrap().comment;
        service.add_comment(6, request(0, "elsewhere")).await.unwrap();

        let first = service.list_comments(for_post(5)).await.unwrap();
        let second = service.list_comments(for_post(5)).await.unwrap();

        let root_ids: Vec<i64> = first.iter().map(|n| n.comment.id).collect();
        let reply_ids: Vec<i64> = first[0].replies.iter().map(|n| n.comment.id).collect();
        assert_eq!(root_ids, vec![a.id, b.id]);
        assert_eq!(reply_ids, vec![a1.id, a2.id]);
        assert_eq!(first, second);

        let everything = service.list_comments(CommentFilter::default()).await.unwrap();
        assert_eq!(everything.len(), 3);
    }

    #[actix_web::test]
    async fn replies_serialize_as_arrays() {
        let (_, service) = service();
        let root = service.add_comment(5, request(0, "root")).await.unwrap();
        service.add_comment(5, request(root.comment.id, "reply")).await.unwrap();

        let json = serde_json::to_value(service.list_comments(for_post(5)).await.unwrap()).unwrap();

        assert!(json[0]["replies"].is_array());
        assert_eq!(json[0]["replies"][0]["replies"], serde_json::json!([]));
    }

    #[actix_web::test]
    async fn approved_filter_applies_to_roots_only_by_default() {
        let (store, service) = service();
        let approved = service.add_comment(5, request(0, "approved")).await.unwrap().comment;
        service.add_comment(5, request(0, "pending")).await.unwrap();
        let reply = service.add_comment(5, request(approved.id, "pending reply")).await.unwrap();
        service.add_comment(6, request(0, "other post")).await.unwrap();
        store.set_approved(approved.id, true).await;

        let tree = service
            .list_comments(CommentFilter {
                post_id: Some(5),
                approved: Some(true),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].comment.id, approved.id);
        assert!(tree[0].comment.approved);
        assert_eq!(tree[0].replies[0].comment.id, reply.comment.id);
    }

    #[actix_web::test]
    async fn tree_scope_prunes_unapproved_replies() {
        let (store, service) = service_with(CommentSettings {
            approval_scope: ApprovalScope::Tree,
            ..Default::default()
        });
        let root = service.add_comment(5, request(0, "root")).await.unwrap().comment;
        let kept = service.add_comment(5, request(root.id, "kept")).await.unwrap().comment;
        let dropped = service.add_comment(5, request(root.id, "dropped")).await.unwrap().comment;
        let under_dropped = service.add_comment(5, request(dropped.id, "x")).await.unwrap().comment;
        store.set_approved(root.id, true).await;
        store.set_approved(kept.id, true).await;
        store.set_approved(under_dropped.id, true).await;

        let tree = service
            .list_comments(CommentFilter {
                post_id: Some(5),
                approved: Some(true),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(tree[0].replies.len(), 1);
        assert_eq!(tree[0].replies[0].comment.id, kept.id);
    }

    #[actix_web::test]
    async fn listing_filters_are_normalized() {
        let (_, service) = service();
        service.add_comment(5, request(0, "root")).await.unwrap();

        let err = service.list_comments(for_post(0)).await.unwrap_err();
        assert!(matches!(err, CustomError::ValidationError(_)));

        let blank_email = service
            .list_comments(CommentFilter {
                email: Some("  ".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(blank_email.len(), 1);

        let other_email = service
            .list_comments(CommentFilter {
                email: Some("bob@example.com".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(other_email.is_empty());
    }

    struct FailingStore;

    #[async_trait]
    impl CommentStore for FailingStore {
        async fn fetch_top_level(&self, _filter: &CommentFilter) -> Result<Vec<Comment>, CustomError> {
            Err(CustomError::store("Failed to fetch comments", "socket closed by 10.1.2.3"))
        }

        async fn fetch_children(&self, _parent_id: i64) -> Result<Vec<Comment>, CustomError> {
            Err(CustomError::store("Failed to fetch comments", "socket closed by 10.1.2.3"))
        }

        async fn fetch_descendants(&self, _post_id: i64) -> Result<Vec<Comment>, CustomError> {
            Err(CustomError::store("Failed to fetch comments", "socket closed by 10.1.2.3"))
        }

        async fn find_by_id(&self, _id: i64) -> Result<Option<Comment>, CustomError> {
            Err(CustomError::store("Failed to fetch comment", "socket closed by 10.1.2.3"))
        }

        async fn insert(&self, _comment: NewComment) -> Result<Comment, CustomError> {
            Err(CustomError::store("Failed to add comment", "E11000 duplicate key"))
        }
    }

    #[actix_web::test]
    async fn store_failures_surface_as_store_errors() {
        let service = CommentService::new(Arc::new(FailingStore), CommentSettings::default());

        let err = service.list_comments(for_post(5)).await.unwrap_err();
        assert!(matches!(err, CustomError::StoreError(_)));
        assert!(!err.to_string().contains("10.1.2.3"));

        let err = service.add_comment(5, request(0, "hi")).await.unwrap_err();
        assert!(matches!(err, CustomError::StoreError(_)));
        assert!(!err.to_string().contains("E11000"));
    }

    /// Memory store with adjustable latency that counts parent lookups
    #[derive(Default)]
    struct LaggingStore {
        inner: MemoryCommentStore,
        lookup_delay: Duration,
        ack_delay: Duration,
        lookups: AtomicUsize,
    }

    #[async_trait]
    impl CommentStore for LaggingStore {
        async fn fetch_top_level(&self, f: &CommentFilter) -> Result<Vec<Comment>, CustomError> {
            self.inner.fetch_top_level(f).await
        }

        async fn fetch_children(&self, id: i64) -> Result<Vec<Comment>, CustomError> {
            self.inner.fetch_children(id).await
        }

        async fn fetch_descendants(&self, id: i64) -> Result<Vec<Comment>, CustomError> {
            self.inner.fetch_descendants(id).await
        }

        async fn find_by_id(&self, id: i64) -> Result<Option<Comment>, CustomError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            sleep(self.lookup_delay).await;
            self.inner.find_by_id(id).await
        }

        /// The row is written before the acknowledgement is delayed.
        async fn insert(&self, comment: NewComment) -> Result<Comment, CustomError> {
            let saved = self.inner.insert(comment).await?;
            sleep(self.ack_delay).await;
            Ok(saved)
        }
    }

    fn short_deadline() -> CommentSettings {
        CommentSettings {
            write_timeout: Duration::from_millis(20),
            ..Default::default()
        }
    }

    #[actix_web::test]
    async fn slow_parent_lookup_times_out_without_a_row() {
        let store = Arc::new(LaggingStore {
            lookup_delay: Duration::from_millis(500),
            ..Default::default()
        });
        store.inner.insert_raw(root(1, 5, 0)).await;
        let service = CommentService::new(store.clone(), short_deadline());

        let err = service.add_comment(5, request(1, "reply")).await.unwrap_err();

        assert!(matches!(err, CustomError::StoreError(_)));
        assert_eq!(store.inner.row_count().await, 1);
    }

    #[actix_web::test]
    async fn slow_write_acknowledgement_still_reports_the_saved_row() {
        let store = Arc::new(LaggingStore {
            ack_delay: Duration::from_millis(200),
            ..Default::default()
        });
        let service = CommentService::new(store.clone(), short_deadline());

        let node = service.add_comment(5, request(0, "hi")).await.unwrap();

        assert_eq!(store.inner.row_count().await, 1);
        assert_eq!(
            store.inner.find_by_id(node.comment.id).await.unwrap(),
            Some(node.comment)
        );
    }

    #[actix_web::test]
    async fn reply_reads_the_parent_once() {
        let store = Arc::new(LaggingStore::default());
        store.inner.insert_raw(root(1, 5, 0)).await;
        store.inner.insert_raw(row(2, 5, 1, 1)).await;
        let service = CommentService::new(store.clone(), CommentSettings::default());

        service.add_comment(5, request(1, "to root")).await.unwrap();
        assert_eq!(store.lookups.load(Ordering::SeqCst), 1);

        service.add_comment(5, request(2, "to reply")).await.unwrap();
        assert_eq!(store.lookups.load(Ordering::SeqCst), 3);
    }
}
