use super::controller::{add_comment, list_comments, list_post_comments};
use actix_web::web;

pub fn comment_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/comments").route("", web::get().to(list_comments)));
    cfg.service(
        web::scope("/posts/{post_id}/comments")
            .route("", web::get().to(list_post_comments))
            .route("", web::post().to(add_comment)),
    );
}
