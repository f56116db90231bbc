//! Telegram Bot API plumbing: inbound update types and the outbound client.

pub mod client;
pub mod models;

pub use client::{BotApi, BotApiError, TelegramClient};
