use crate::comment::index::comment_routes;
use crate::utils::error::CustomError;
use actix_web::web;

pub fn routes(cfg: &mut web::ServiceConfig) {
    // Malformed bodies, queries and paths become validation errors so they
    // share the error envelope.
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        CustomError::ValidationError(err.to_string()).into()
    }))
    .app_data(web::QueryConfig::default().error_handler(|err, _req| {
        CustomError::ValidationError(err.to_string()).into()
    }))
    .app_data(web::PathConfig::default().error_handler(|err, _req| {
        CustomError::ValidationError(err.to_string()).into()
    }));

    cfg.configure(comment_routes);
}
