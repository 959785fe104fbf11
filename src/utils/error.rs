use crate::utils::helpers::service_name;
use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use log::error;
use serde_json::json;
use std::fmt::Display;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CustomError {
    #[error("Validation Error: {0}")]
    ValidationError(String),

    #[error("Not Found: {0}")]
    NotFoundError(String),

    #[error("Depth Exceeded: {0}")]
    DepthExceededError(String),

    #[error("Data Integrity Error: {0}")]
    DataIntegrityError(String),

    #[error("Store Error: {0}")]
    StoreError(String),
}

impl CustomError {
    /// Logs the underlying driver error and returns a `StoreError` that only
    /// carries `context`. Driver messages never reach the caller.
    pub fn store(context: &str, cause: impl Display) -> Self {
        error!("{}: {}", context, cause);
        CustomError::StoreError(context.to_string())
    }

    pub fn kind(&self) -> &'static str {
        match *self {
            CustomError::ValidationError(..) => "VALIDATION_ERROR",
            CustomError::NotFoundError(..) => "NOT_FOUND_ERROR",
            CustomError::DepthExceededError(..) => "DEPTH_EXCEEDED_ERROR",
            CustomError::DataIntegrityError(..) => "DATA_INTEGRITY_ERROR",
            CustomError::StoreError(..) => "STORE_ERROR",
        }
    }
}

impl ResponseError for CustomError {
    fn status_code(&self) -> StatusCode {
        match *self {
            CustomError::ValidationError(..) => StatusCode::BAD_REQUEST,
            CustomError::NotFoundError(..) => StatusCode::NOT_FOUND,
            CustomError::DepthExceededError(..) => StatusCode::UNPROCESSABLE_ENTITY,
            CustomError::DataIntegrityError(..) => StatusCode::INTERNAL_SERVER_ERROR,
            CustomError::StoreError(..) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let error_message = json!({
            "success": false,
            "message": self.to_string(),
            "httpStatusCode": self.status_code().as_u16(),
            "error": self.kind(),
            "service": service_name(),
        });

        HttpResponse::build(self.status_code()).json(error_message)
    }
}
