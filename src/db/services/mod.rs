//! Data access for the link store.
//!
//! Handlers and the bot gateway call these functions instead of building queries
//! themselves. Everything is re-exported under `crate::db::services::`.

pub mod link_service;
pub mod schema_service;
pub mod tag_service;

pub use link_service::*;
pub use schema_service::*;
pub use tag_service::*;
