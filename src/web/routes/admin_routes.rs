use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use std::sync::Arc;

use crate::db::services;
use crate::web::{AppError, AppState};

/// Creates the tables. Idempotent, so calling it on an initialized database is harmless.
async fn init_db_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, AppError> {
    services::init_schema(&app_state.db_pool).await?;
    Ok(Json(serde_json::json!({ "status": "initialized" })))
}

async fn health_check_handler() -> &'static str {
    "OK"
}

pub fn create_admin_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/init_db", post(init_db_handler))
        .route("/api/health", get(health_check_handler))
}
