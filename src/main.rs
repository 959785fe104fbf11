use actix_web::http::StatusCode;
use actix_web::middleware::{ErrorHandlers, Logger};
use actix_web::{App, HttpResponse, HttpServer, Responder, get, web};
use dotenv::dotenv;
use env_logger::Env;
use log::info;
use serde_json::json;
use std::io;
use std::sync::Arc;

use threaded_comments::comment::memory_store::MemoryCommentStore;
use threaded_comments::comment::service::CommentService;
use threaded_comments::comment::store::{CommentStore, MongoCommentStore};
use threaded_comments::database;
use threaded_comments::middleware::error_handler::handle_error;
use threaded_comments::middleware::not_found::not_found;
use threaded_comments::router::index::routes;
use threaded_comments::utils::config::{AppConfig, StoreBackend};
use threaded_comments::utils::helpers::service_name;

#[get("/")]
async fn default() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Threaded comments service",
        "httpStatusCode": StatusCode::OK.as_u16(),
        "service": service_name(),
    }))
}

async fn open_store(config: &AppConfig) -> io::Result<Arc<dyn CommentStore>> {
    match (config.store, &config.mongo) {
        (StoreBackend::Mongo, Some(mongo)) => {
            let client = database::connect_to_mongo(mongo)
                .await
                .map_err(|e| io::Error::other(e.to_string()))?;
            let store = MongoCommentStore::new(&client, &mongo.database)
                .await
                .map_err(|e| io::Error::other(e.to_string()))?;
            Ok(Arc::new(store))
        }
        (StoreBackend::Mongo, None) => Err(io::Error::other("MongoDB settings are missing")),
        (StoreBackend::Memory, _) => {
            info!("Using the in-memory comment store; comments will not survive a restart");
            Ok(Arc::new(MemoryCommentStore::new()))
        }
    }
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env().map_err(|e| io::Error::other(e.to_string()))?;
    let store = open_store(&config).await?;
    let comment_service = web::Data::new(CommentService::new(store, config.comments.clone()));

    info!("Starting server on http://{}:{}", config.host, config.port);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(comment_service.clone())
            .configure(routes)
            .wrap(
                ErrorHandlers::new()
                    .handler(StatusCode::NOT_FOUND, not_found)
                    .default_handler(handle_error),
            )
            .service(default)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;

    // Log after server has started (this line will only be reached when the server shuts down)
    info!("Server has stopped");

    Ok(())
}
