use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::db::services::LinkStoreError;
use crate::gateway::GatewayError;
use crate::render::RenderError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Not Found: {0}")]
    NotFound(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Upstream error: {0}")]
    UpstreamError(String),
    #[error("Internal server error: {0}")]
    InternalServerError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::DatabaseError(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Database error: {msg}"),
            ),
            AppError::UpstreamError(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::InternalServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({ "error": error_message }))).into_response()
    }
}

impl From<sea_orm::DbErr> for AppError {
    fn from(err: sea_orm::DbErr) -> Self {
        AppError::DatabaseError(err.to_string())
    }
}

impl From<LinkStoreError> for AppError {
    fn from(err: LinkStoreError) -> Self {
        match err {
            LinkStoreError::DbErr(e) => AppError::DatabaseError(e.to_string()),
            LinkStoreError::LinkNotFound(id) => AppError::NotFound(format!("Link {id} not found")),
            LinkStoreError::TagRequired => {
                AppError::InvalidInput("tag_name is required".to_string())
            }
        }
    }
}

impl From<RenderError> for AppError {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::InvalidChatId(id) => {
                AppError::InvalidInput(format!("Invalid chat id: {id}"))
            }
            other => AppError::InternalServerError(other.to_string()),
        }
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Store(e) => e.into(),
            GatewayError::Render(e) => e.into(),
            GatewayError::Bot(e) => AppError::UpstreamError(e.to_string()),
        }
    }
}
