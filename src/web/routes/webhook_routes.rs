use axum::{
    Json, Router,
    extract::{Query, State},
    routing::{get, post},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::telegram::models::Update;
use crate::web::{AppError, AppState};

#[derive(Deserialize)]
pub struct SetWebhookParams {
    url: Option<String>,
}

/// Telegram posts every update here. The response is always `{"status": "ok"}` so
/// Telegram does not redeliver updates the bot could not handle.
async fn webhook_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<serde_json::Value>,
) -> Json<serde_json::Value> {
    match serde_json::from_value::<Update>(payload) {
        Ok(update) => app_state.gateway.handle_update(&update).await,
        Err(e) => warn!(error = %e, "Ignoring webhook payload that is not a Telegram update."),
    }
    Json(serde_json::json!({ "status": "ok" }))
}

async fn set_webhook_handler(
    State(app_state): State<Arc<AppState>>,
    Query(params): Query<SetWebhookParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    let url = params
        .url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| AppError::InvalidInput("Please provide a webhook URL.".to_string()))?;

    let body = app_state
        .bot
        .set_webhook(&url)
        .await
        .map_err(|e| AppError::UpstreamError(e.to_string()))?;
    info!(url = %url, "Webhook registered.");
    Ok(Json(body))
}

pub fn create_webhook_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/webhook", post(webhook_handler))
        .route("/set_webhook", get(set_webhook_handler))
}
