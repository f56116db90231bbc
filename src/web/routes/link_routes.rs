use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use serde::Deserialize;
use std::sync::Arc;

use crate::db::services::{self, LinkWithTags};
use crate::render::validate_chat_id;
use crate::web::{AppError, AppState};

// --- Request/Response Structs ---

#[derive(Deserialize)]
pub struct TagFilterParams {
    /// Comma-separated tag names; links carrying any of them are returned.
    tags: Option<String>,
}

#[derive(Deserialize)]
pub struct AddTagRequest {
    tag_name: Option<String>,
}

// --- Route Handlers ---

async fn list_chat_links_handler(
    State(app_state): State<Arc<AppState>>,
    Path(chat_id): Path<String>,
    Query(params): Query<TagFilterParams>,
) -> Result<Json<Vec<LinkWithTags>>, AppError> {
    let filter: Vec<String> = params
        .tags
        .as_deref()
        .map(|raw| raw.split(',').map(str::to_string).collect())
        .unwrap_or_default();
    let links = services::list_links(&app_state.db_pool, &chat_id, &filter).await?;
    Ok(Json(links))
}

async fn delete_chat_links_handler(
    State(app_state): State<Arc<AppState>>,
    Path(chat_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    validate_chat_id(&chat_id)?;
    let deleted = services::delete_all_links(&app_state.db_pool, &chat_id).await?;
    app_state.gateway.refresh_snapshot(&chat_id, None).await?;
    Ok(Json(serde_json::json!({ "deleted": deleted })))
}

async fn add_tag_handler(
    State(app_state): State<Arc<AppState>>,
    Path(link_id): Path<i32>,
    Json(payload): Json<AddTagRequest>,
) -> Result<Json<LinkWithTags>, AppError> {
    let tag_name = payload.tag_name.unwrap_or_default();
    services::add_tag(&app_state.db_pool, link_id, &tag_name).await?;

    let link = services::get_link(&app_state.db_pool, link_id).await?;
    app_state.gateway.refresh_snapshot(&link.chat_id, None).await?;
    Ok(Json(link))
}

async fn delete_link_handler(
    State(app_state): State<Arc<AppState>>,
    Path(link_id): Path<i32>,
) -> Result<StatusCode, AppError> {
    let deleted = services::delete_link(&app_state.db_pool, link_id).await?;
    app_state.gateway.refresh_snapshot(&deleted.chat_id, None).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_tags_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<Vec<String>>, AppError> {
    Ok(Json(services::all_tag_names(&app_state.db_pool).await?))
}

// --- Router ---

pub fn create_links_router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/chats/{chat_id}/links",
            get(list_chat_links_handler).delete(delete_chat_links_handler),
        )
        .route("/api/links/{link_id}/tags", post(add_tag_handler))
        .route("/api/links/{link_id}", delete(delete_link_handler))
        .route("/api/tags", get(list_tags_handler))
}
