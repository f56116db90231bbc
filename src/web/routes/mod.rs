pub mod admin_routes;
pub mod link_routes;
pub mod webhook_routes;
