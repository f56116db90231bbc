use axum::{
    Router,
    http::{HeaderValue, Method, header},
};
use sea_orm::DatabaseConnection;
use std::path::Path;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use crate::gateway::BotGateway;
use crate::render::SNAPSHOT_ROUTE;
use crate::telegram::BotApi;

pub use error::AppError;

pub mod error;
pub mod routes;

use routes::*;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: DatabaseConnection,
    pub gateway: Arc<BotGateway>,
    pub bot: Arc<dyn BotApi>,
}

/// Serves rendered snapshots with caching disabled so users always see the latest page.
fn snapshot_service(storage_dir: &Path) -> Router {
    let service = ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-cache, no-store, must-revalidate"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::PRAGMA,
            HeaderValue::from_static("no-cache"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::EXPIRES,
            HeaderValue::from_static("0"),
        ))
        .service(ServeDir::new(storage_dir));
    Router::new().nest_service(SNAPSHOT_ROUTE, service)
}

pub fn create_axum_router(app_state: Arc<AppState>, storage_dir: &Path) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(vec![Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .merge(webhook_routes::create_webhook_router())
        .merge(link_routes::create_links_router())
        .merge(admin_routes::create_admin_router())
        .with_state(app_state)
        .merge(snapshot_service(storage_dir))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
