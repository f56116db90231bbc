use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use super::models::ReplyMarkup;

#[derive(Error, Debug)]
pub enum BotApiError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Telegram API error: {0}")]
    Api(String),
}

/// Outbound calls the bot makes. Implemented by `TelegramClient`; tests substitute
/// a recording implementation.
#[async_trait]
pub trait BotApi: Send + Sync {
    async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        markup: Option<ReplyMarkup>,
    ) -> Result<(), BotApiError>;

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), BotApiError>;

    /// Registers `url` as the bot's webhook and returns Telegram's response body.
    async fn set_webhook(&self, url: &str) -> Result<serde_json::Value, BotApiError>;
}

/// Client for the Telegram Bot API.
pub struct TelegramClient {
    client: Client,
    api_url: String,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<ReplyMarkup>,
}

#[derive(Serialize)]
struct AnswerCallbackQuery<'a> {
    callback_query_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
}

#[derive(Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

impl TelegramClient {
    pub fn new(api_base: &str, bot_token: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            api_url: format!("{}/bot{}", api_base.trim_end_matches('/'), bot_token),
        })
    }

    async fn call<T: Serialize + ?Sized>(
        &self,
        method: &str,
        payload: &T,
    ) -> Result<serde_json::Value, BotApiError> {
        let response = self
            .client
            .post(format!("{}/{method}", self.api_url))
            .json(payload)
            .send()
            .await?;
        let status = response.status();
        let body: serde_json::Value = response.json().await?;

        let parsed: Option<ApiResponse> = serde_json::from_value(body.clone()).ok();
        match parsed {
            Some(ApiResponse { ok: true, .. }) if status.is_success() => Ok(body),
            Some(ApiResponse { description, .. }) => Err(BotApiError::Api(format!(
                "{method} failed with status {status}: {}",
                description.unwrap_or_else(|| "no description".to_string())
            ))),
            None => Err(BotApiError::Api(format!(
                "{method} returned an unexpected body with status {status}"
            ))),
        }
    }
}

#[async_trait]
impl BotApi for TelegramClient {
    async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        markup: Option<ReplyMarkup>,
    ) -> Result<(), BotApiError> {
        let payload = SendMessage {
            chat_id,
            text,
            disable_web_page_preview: false,
            reply_markup: markup,
        };
        self.call("sendMessage", &payload).await.map(|_| ())
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), BotApiError> {
        let payload = AnswerCallbackQuery {
            callback_query_id: callback_id,
            text,
        };
        self.call("answerCallbackQuery", &payload).await.map(|_| ())
    }

    async fn set_webhook(&self, url: &str) -> Result<serde_json::Value, BotApiError> {
        self.call("setWebhook", &serde_json::json!({ "url": url })).await
    }
}
