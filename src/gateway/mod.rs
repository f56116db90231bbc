//! The bot gateway: turns Telegram updates into store, resolver and renderer calls.
//!
//! Every update is handled on its own; nothing is kept between updates except what
//! is in the database.

use sea_orm::DatabaseConnection;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::db::services::{self, LinkStoreError, LinkWithTags};
use crate::metadata::MetadataResolver;
use crate::render::{PageRenderer, RenderError, RenderedPage};
use crate::telegram::models::{CallbackQuery, InlineKeyboardButton, Message, ReplyMarkup, Update};
use crate::telegram::{BotApi, BotApiError};

pub mod parse;

pub use parse::{CallbackAction, ParsedLink, parse_link_message};

pub const INVALID_LINK_REPLY: &str = "Please send a valid link.";
const APOLOGY_REPLY: &str =
    "Sorry, something went wrong while handling your message. Please try again.";
const MISSING_LINK_REPLY: &str = "That link no longer exists.";
const MAX_TAG_BUTTONS: usize = 8;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Store error: {0}")]
    Store(#[from] LinkStoreError),
    #[error("Render error: {0}")]
    Render(#[from] RenderError),
    #[error("Bot API error: {0}")]
    Bot(#[from] BotApiError),
}

pub struct BotGateway {
    db: DatabaseConnection,
    resolver: Arc<MetadataResolver>,
    renderer: Arc<PageRenderer>,
    bot: Arc<dyn BotApi>,
}

impl BotGateway {
    pub fn new(
        db: DatabaseConnection,
        resolver: Arc<MetadataResolver>,
        renderer: Arc<PageRenderer>,
        bot: Arc<dyn BotApi>,
    ) -> Self {
        Self {
            db,
            resolver,
            renderer,
            bot,
        }
    }

    /// Handles one webhook update to completion. Errors are logged and, where a chat
    /// is known, reported to the user; they never propagate to the webhook caller.
    pub async fn handle_update(&self, update: &Update) {
        let (result, chat_id) = if let Some(callback) = &update.callback_query {
            (
                self.handle_callback(callback).await,
                callback.message.as_ref().map(|m| m.chat.key()),
            )
        } else if let Some(message) = &update.message {
            (self.handle_message(message).await, Some(message.chat.key()))
        } else {
            debug!(update_id = ?update.update_id, "Ignoring update without message or callback.");
            return;
        };

        if let Err(e) = result {
            error!(update_id = ?update.update_id, error = %e, "Failed to handle update.");
            if let Some(chat_id) = chat_id {
                if let Err(send_err) = self.bot.send_message(&chat_id, APOLOGY_REPLY, None).await {
                    warn!(chat_id = %chat_id, error = %send_err, "Failed to send apology message.");
                }
            }
        }
    }

    async fn handle_message(&self, message: &Message) -> Result<(), GatewayError> {
        let chat_id = message.chat.key();
        let name = message.chat.display_name();
        let text = message.text.as_deref().map(str::trim).unwrap_or_default();
        debug!(chat_id = %chat_id, text, "Message received.");

        if let Some(link_id) = message
            .reply_to_message
            .as_ref()
            .and_then(|m| m.text.as_deref())
            .and_then(parse::parse_new_tag_prompt)
        {
            return self.handle_new_tag_reply(&chat_id, name, link_id, text).await;
        }

        match text.split_whitespace().next().unwrap_or_default() {
            "/start" => {
                let greeting = format!(
                    "Hi {}! Send me a link, optionally followed by #tags, \
                     and I'll keep it on your bookmarks page.",
                    name.unwrap_or("there")
                );
                self.bot.send_message(&chat_id, &greeting, None).await?;
                return Ok(());
            }
            "/list" => {
                let page = self.refresh_snapshot(&chat_id, name).await?;
                self.bot
                    .send_message(&chat_id, &format!("Your bookmarks: {}", page.url), None)
                    .await?;
                return Ok(());
            }
            "/clear" => {
                let deleted = services::delete_all_links(&self.db, &chat_id).await?;
                let page = self.refresh_snapshot(&chat_id, name).await?;
                let reply = format!("Deleted {deleted} link(s). Your bookmarks: {}", page.url);
                self.bot.send_message(&chat_id, &reply, None).await?;
                return Ok(());
            }
            _ => {}
        }

        match parse_link_message(text) {
            Some(parsed) => self.save_link(&chat_id, name, parsed).await,
            None => {
                self.bot.send_message(&chat_id, INVALID_LINK_REPLY, None).await?;
                Ok(())
            }
        }
    }

    async fn save_link(
        &self,
        chat_id: &str,
        name: Option<&str>,
        parsed: ParsedLink,
    ) -> Result<(), GatewayError> {
        let metadata = self.resolver.resolve(&parsed.url).await;
        let link_id =
            services::create_link(&self.db, chat_id, &parsed.url, &parsed.tags, &metadata).await?;

        let links = services::list_links(&self.db, chat_id, &[]).await?;
        let page = self.renderer.render(chat_id, name, &links).await?;

        let reply = format!(
            "Hi {}, thanks for sharing! Saved: {}\n\nYour bookmarks: {}",
            name.unwrap_or("there"),
            metadata.title,
            page.url
        );
        let keyboard = tag_keyboard(link_id, &suggested_tags(&links, link_id));
        self.bot.send_message(chat_id, &reply, Some(keyboard)).await?;
        info!(chat_id, link_id, "Link saved from chat message.");
        Ok(())
    }

    async fn handle_new_tag_reply(
        &self,
        chat_id: &str,
        name: Option<&str>,
        link_id: i32,
        text: &str,
    ) -> Result<(), GatewayError> {
        let Some(tag) = text
            .split_whitespace()
            .next()
            .and_then(services::normalize_tag_name)
        else {
            self.bot
                .send_message(chat_id, "Please send a tag name.", Some(force_reply(link_id)))
                .await?;
            return Ok(());
        };

        if self.owned_link(chat_id, link_id).await?.is_none() {
            self.bot.send_message(chat_id, MISSING_LINK_REPLY, None).await?;
            return Ok(());
        }

        services::add_tag(&self.db, link_id, &tag).await?;
        let page = self.refresh_snapshot(chat_id, name).await?;
        let reply = format!("Added #{tag}. Your bookmarks: {}", page.url);
        self.bot.send_message(chat_id, &reply, None).await?;
        Ok(())
    }

    async fn handle_callback(&self, callback: &CallbackQuery) -> Result<(), GatewayError> {
        let action = callback.data.as_deref().and_then(CallbackAction::parse);
        let (Some(action), Some(message)) = (action, callback.message.as_ref()) else {
            warn!(data = ?callback.data, "Unrecognized callback query.");
            self.bot.answer_callback(&callback.id, Some("Unknown action")).await?;
            return Ok(());
        };

        let chat_id = message.chat.key();
        let name = message.chat.display_name();

        if self.owned_link(&chat_id, action.link_id()).await?.is_none() {
            self.bot.answer_callback(&callback.id, Some(MISSING_LINK_REPLY)).await?;
            return Ok(());
        }

        match action {
            CallbackAction::AddTag { link_id, tag } => {
                let added = services::add_tag(&self.db, link_id, &tag).await?;
                self.refresh_snapshot(&chat_id, name).await?;
                let toast = if added {
                    format!("Tagged #{tag}")
                } else {
                    format!("Already tagged #{tag}")
                };
                self.bot.answer_callback(&callback.id, Some(&toast)).await?;
            }
            CallbackAction::PromptNewTag { link_id } => {
                self.bot.answer_callback(&callback.id, None).await?;
                let prompt = parse::new_tag_prompt(link_id);
                self.bot
                    .send_message(&chat_id, &prompt, Some(force_reply(link_id)))
                    .await?;
            }
            CallbackAction::DeleteLink { link_id } => {
                services::delete_link(&self.db, link_id).await?;
                self.refresh_snapshot(&chat_id, name).await?;
                self.bot.answer_callback(&callback.id, Some("Link deleted")).await?;
            }
        }
        Ok(())
    }

    /// The link, if it exists and belongs to `chat_id`.
    async fn owned_link(
        &self,
        chat_id: &str,
        link_id: i32,
    ) -> Result<Option<LinkWithTags>, GatewayError> {
        match services::get_link(&self.db, link_id).await {
            Ok(link) if link.chat_id == chat_id => Ok(Some(link)),
            Ok(_) | Err(LinkStoreError::LinkNotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Re-renders the chat's snapshot from the store.
    pub async fn refresh_snapshot(
        &self,
        chat_id: &str,
        name: Option<&str>,
    ) -> Result<RenderedPage, GatewayError> {
        let links = services::list_links(&self.db, chat_id, &[]).await?;
        Ok(self.renderer.render(chat_id, name, &links).await?)
    }
}

/// Tags the chat already uses that are not yet on `link_id`, alphabetically.
fn suggested_tags(links: &[LinkWithTags], link_id: i32) -> Vec<String> {
    let current: &[String] = links
        .iter()
        .find(|l| l.id == link_id)
        .map(|l| l.tags.as_slice())
        .unwrap_or_default();
    let mut tags: Vec<String> = links
        .iter()
        .flat_map(|l| l.tags.iter())
        .filter(|t| !current.contains(t))
        .cloned()
        .collect();
    tags.sort();
    tags.dedup();
    tags
}

/// Keyboard offered after saving a link: existing tags two per row, then the
/// new-tag and delete buttons.
pub fn tag_keyboard(link_id: i32, tags: &[String]) -> ReplyMarkup {
    let tag_buttons: Vec<InlineKeyboardButton> = tags
        .iter()
        .map(|tag| (tag, CallbackAction::AddTag { link_id, tag: tag.clone() }.encode()))
        .filter(|(_, data)| data.len() <= parse::MAX_CALLBACK_DATA_BYTES)
        .take(MAX_TAG_BUTTONS)
        .map(|(tag, callback_data)| InlineKeyboardButton {
            text: format!("#{tag}"),
            callback_data,
        })
        .collect();

    let mut rows: Vec<Vec<InlineKeyboardButton>> =
        tag_buttons.chunks(2).map(|chunk| chunk.to_vec()).collect();
    rows.push(vec![
        InlineKeyboardButton {
            text: "➕ New tag".to_string(),
            callback_data: CallbackAction::PromptNewTag { link_id }.encode(),
        },
        InlineKeyboardButton {
            text: "🗑 Delete".to_string(),
            callback_data: CallbackAction::DeleteLink { link_id }.encode(),
        },
    ]);
    ReplyMarkup::InlineKeyboard { inline_keyboard: rows }
}

fn force_reply(link_id: i32) -> ReplyMarkup {
    ReplyMarkup::ForceReply {
        force_reply: true,
        input_field_placeholder: format!("Tag for link #{link_id}"),
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{RecordingBot, Sent};
    use super::*;
    use crate::db::test_support::sqlite_db;
    use crate::metadata::{ResolverConfig, test_upstream};
    use axum::{Router, extract::Query, routing::get};
    use sea_orm::EntityTrait;
    use std::collections::HashMap;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Harness {
        gateway: BotGateway,
        bot: Arc<RecordingBot>,
        db: DatabaseConnection,
        _db_dir: TempDir,
        pages: TempDir,
    }

    async fn harness() -> Harness {
        // Stands in for the unblocker: echoes the requested URL as the page title.
        let upstream = Router::new().route(
            "/unblock",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                let url = params.get("url").cloned().unwrap_or_default();
                format!(r#"<meta property="og:title" content="Page for {url}">"#)
            }),
        );
        let base = test_upstream::spawn(upstream).await;
        let resolver = MetadataResolver::new(ResolverConfig {
            product_api_url: None,
            product_api_key: None,
            unblocker_url: Some(format!("{base}/unblock")),
            unblocker_api_key: None,
            timeout: Duration::from_secs(5),
            product_domains: Vec::new(),
        })
        .unwrap();

        let (db, db_dir) = sqlite_db().await;
        let pages = tempfile::tempdir().unwrap();
        let renderer = PageRenderer::new(pages.path(), "https://bot.example.org").unwrap();
        let bot = Arc::new(RecordingBot::default());
        let gateway =
            BotGateway::new(db.clone(), Arc::new(resolver), Arc::new(renderer), bot.clone());
        Harness { gateway, bot, db, _db_dir: db_dir, pages }
    }

    fn answer(text: &str) -> Sent {
        Sent::Answer {
            callback_id: "cb-1".to_string(),
            text: Some(text.to_string()),
        }
    }

    fn message_update(chat_id: i64, text: &str) -> Update {
        serde_json::from_value(serde_json::json!({
            "update_id": 1,
            "message": {
                "message_id": 1,
                "chat": { "id": chat_id, "first_name": "Ada" },
                "text": text
            }
        }))
        .unwrap()
    }

    fn reply_update(chat_id: i64, prompt: &str, text: &str) -> Update {
        serde_json::from_value(serde_json::json!({
            "message": {
                "message_id": 2,
                "chat": { "id": chat_id, "first_name": "Ada" },
                "text": text,
                "reply_to_message": { "message_id": 1, "chat": { "id": chat_id }, "text": prompt }
            }
        }))
        .unwrap()
    }

    fn callback_update(chat_id: i64, data: &str) -> Update {
        serde_json::from_value(serde_json::json!({
            "callback_query": {
                "id": "cb-1",
                "data": data,
                "message": { "message_id": 3, "chat": { "id": chat_id, "first_name": "Ada" } }
            }
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_link_with_tags_is_resolved_stored_and_rendered() {
        let h = harness().await;

        h.gateway
            .handle_update(&message_update(77, "https://example.com/item #sale #deal"))
            .await;

        let links = services::list_links(&h.db, "77", &[]).await.unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].link, "https://example.com/item");
        assert_eq!(links[0].title, "Page for https://example.com/item");
        assert_eq!(links[0].tags, vec!["deal", "sale"]);

        let page = std::fs::read_to_string(h.pages.path().join("77_history.html")).unwrap();
        assert!(page.contains("Ada&#x27;s Bookmarks"));

        let sent = h.bot.take();
        assert_eq!(sent.len(), 1);
        let Sent::Message { chat_id, text, markup } = &sent[0] else {
            panic!("expected a message, got {sent:?}");
        };
        assert_eq!(chat_id, "77");
        assert!(text.starts_with("Hi Ada, thanks for sharing!"));
        assert!(text.contains("https://bot.example.org/storage/links_history/77_history.html"));
        assert_eq!(markup.as_ref(), Some(&tag_keyboard(links[0].id, &[])));
    }

    #[tokio::test]
    async fn test_non_link_text_gets_prompt() {
        let h = harness().await;
        h.gateway.handle_update(&message_update(5, "just chatting")).await;

        assert_eq!(
            h.bot.take(),
            vec![Sent::Message {
                chat_id: "5".to_string(),
                text: INVALID_LINK_REPLY.to_string(),
                markup: None
            }]
        );
        assert!(crate::db::entities::prelude::Link::find().all(&h.db).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_keyboard_suggests_existing_chat_tags() {
        let h = harness().await;
        h.gateway.handle_update(&message_update(9, "https://a.example #books")).await;
        h.bot.take();

        h.gateway.handle_update(&message_update(9, "https://b.example #music")).await;
        let links = services::list_links(&h.db, "9", &[]).await.unwrap();
        let newest = links[0].id;

        let sent = h.bot.take();
        let Sent::Message { markup: Some(markup), .. } = &sent[0] else {
            panic!("expected a keyboard, got {sent:?}");
        };
        assert_eq!(markup, &tag_keyboard(newest, &["books".to_string()]));
    }

    #[tokio::test]
    async fn test_callback_adds_tag_and_deletes_link() {
        let h = harness().await;
        h.gateway.handle_update(&message_update(11, "https://a.example")).await;
        let link_id = services::list_links(&h.db, "11", &[]).await.unwrap()[0].id;
        h.bot.take();

        h.gateway.handle_update(&callback_update(11, &format!("tag:{link_id}:later"))).await;
        h.gateway.handle_update(&callback_update(11, &format!("tag:{link_id}:later"))).await;
        assert_eq!(services::get_link(&h.db, link_id).await.unwrap().tags, vec!["later"]);
        assert_eq!(
            h.bot.take(),
            vec![
                answer("Tagged #later"),
                answer("Already tagged #later"),
            ]
        );

        h.gateway.handle_update(&callback_update(11, &format!("del:{link_id}"))).await;
        assert!(services::list_links(&h.db, "11", &[]).await.unwrap().is_empty());
        let page = std::fs::read_to_string(h.pages.path().join("11_history.html")).unwrap();
        assert!(page.contains("No bookmarks yet"));
    }

    #[tokio::test]
    async fn test_callback_for_another_chats_link_is_refused() {
        let h = harness().await;
        h.gateway.handle_update(&message_update(1, "https://a.example")).await;
        let link_id = services::list_links(&h.db, "1", &[]).await.unwrap()[0].id;
        h.bot.take();

        h.gateway.handle_update(&callback_update(2, &format!("del:{link_id}"))).await;

        assert_eq!(services::list_links(&h.db, "1", &[]).await.unwrap().len(), 1);
        assert_eq!(
            h.bot.take(),
            vec![answer(MISSING_LINK_REPLY)]
        );
    }

    #[tokio::test]
    async fn test_new_tag_prompt_and_reply() {
        let h = harness().await;
        h.gateway.handle_update(&message_update(3, "https://a.example")).await;
        let link_id = services::list_links(&h.db, "3", &[]).await.unwrap()[0].id;
        h.bot.take();

        h.gateway.handle_update(&callback_update(3, &format!("newtag:{link_id}"))).await;
        let sent = h.bot.take();
        let prompt = parse::new_tag_prompt(link_id);
        assert_eq!(
            sent[1],
            Sent::Message {
                chat_id: "3".to_string(),
                text: prompt.clone(),
                markup: Some(force_reply(link_id)),
            }
        );

        h.gateway.handle_update(&reply_update(3, &prompt, "#wishlist please")).await;
        assert_eq!(services::get_link(&h.db, link_id).await.unwrap().tags, vec!["wishlist"]);
        let sent = h.bot.take();
        let Sent::Message { text, .. } = &sent[0] else {
            panic!("expected a message, got {sent:?}");
        };
        assert!(text.starts_with("Added #wishlist."));
    }

    #[tokio::test]
    async fn test_clear_command_removes_everything() {
        let h = harness().await;
        h.gateway.handle_update(&message_update(4, "https://a.example #x")).await;
        h.gateway.handle_update(&message_update(4, "https://b.example #y")).await;
        h.bot.take();

        h.gateway.handle_update(&message_update(4, "/clear")).await;

        assert!(services::list_links(&h.db, "4", &[]).await.unwrap().is_empty());
        assert!(services::all_tag_names(&h.db).await.unwrap().is_empty());
        let sent = h.bot.take();
        let Sent::Message { text, .. } = &sent[0] else {
            panic!("expected a message, got {sent:?}");
        };
        assert!(text.starts_with("Deleted 2 link(s)."));
    }

    #[test]
    fn test_keyboard_skips_oversized_callback_data() {
        let long_tag = "x".repeat(70);
        let tags = [long_tag, "a".to_string(), "b".to_string(), "c".to_string()];
        let markup = tag_keyboard(1, &tags);
        let ReplyMarkup::InlineKeyboard { inline_keyboard } = markup else {
            panic!("expected an inline keyboard");
        };
        assert_eq!(inline_keyboard.len(), 3);
        assert_eq!(inline_keyboard[0].len(), 2);
        assert_eq!(inline_keyboard[0][0].callback_data, "tag:1:a");
        assert_eq!(inline_keyboard[1][0].callback_data, "tag:1:c");
        assert_eq!(inline_keyboard[2][1].callback_data, "del:1");
    }
}
