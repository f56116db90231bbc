pub mod db;
pub mod gateway;
pub mod metadata;
pub mod render;
pub mod server;
pub mod telegram;
pub mod version;
pub mod web;
