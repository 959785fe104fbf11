use crate::comment::model::{CommentFilter, CreateCommentRequest};
use crate::comment::service::CommentService;
use crate::utils::error::CustomError;
use crate::utils::helpers::service_name;
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;

#[derive(Deserialize)]
pub struct PostCommentsQuery {
    pub email: Option<String>,
    pub approved: Option<bool>,
}

/// List comments with their replies
/// GET /comments?post_id=&email=&approved=
pub async fn list_comments(
    comment_service: web::Data<CommentService>,
    query: web::Query<CommentFilter>,
) -> Result<HttpResponse, CustomError> {
    let comments = comment_service.list_comments(query.into_inner()).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Comments retrieved successfully",
        "httpStatusCode": 200,
        "count": comments.len(),
        "data": comments
    })))
}

/// List the comments of one post
/// GET /posts/{post_id}/comments?email=&approved=
pub async fn list_post_comments(
    comment_service: web::Data<CommentService>,
    path: web::Path<i64>,
    query: web::Query<PostCommentsQuery>,
) -> Result<HttpResponse, CustomError> {
    let query = query.into_inner();
    let filter = CommentFilter {
        post_id: Some(path.into_inner()),
        email: query.email,
        approved: query.approved,
    };

    let comments = comment_service.list_comments(filter).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Comments retrieved successfully",
        "httpStatusCode": 200,
        "count": comments.len(),
        "data": comments
    })))
}

/// Add a comment or a reply to a post
/// POST /posts/{post_id}/comments
pub async fn add_comment(
    comment_service: web::Data<CommentService>,
    path: web::Path<i64>,
    body: web::Json<CreateCommentRequest>,
) -> Result<HttpResponse, CustomError> {
    let comment = comment_service
        .add_comment(path.into_inner(), body.into_inner())
        .await?;

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "Comment created successfully",
        "httpStatusCode": 201,
        "service": service_name(),
        "data": comment
    })))
}
