use serde::{Deserialize, Serialize};

/// An inbound webhook update. Only the fields the bot reads are modelled.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    #[serde(default)]
    pub update_id: Option<i64>,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub reply_to_message: Option<Box<Message>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl Chat {
    /// Chat identifier as stored in the link table.
    pub fn key(&self) -> String {
        self.id.to_string()
    }

    pub fn display_name(&self) -> Option<&str> {
        self.first_name.as_deref().or(self.username.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub callback_data: String,
}

/// Reply markup attached to outgoing messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ReplyMarkup {
    InlineKeyboard {
        inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
    },
    ForceReply {
        force_reply: bool,
        input_field_placeholder: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_message_update() {
        let update: Update = serde_json::from_value(serde_json::json!({
            "update_id": 1,
            "message": {
                "message_id": 10,
                "chat": { "id": -1001, "first_name": "Ada", "type": "private" },
                "text": "https://example.com #a",
                "reply_to_message": {
                    "message_id": 9,
                    "chat": { "id": -1001 },
                    "text": "Send a new tag for link #3"
                }
            }
        }))
        .unwrap();

        let message = update.message.unwrap();
        assert_eq!(message.chat.key(), "-1001");
        assert_eq!(message.chat.display_name(), Some("Ada"));
        assert_eq!(
            message.reply_to_message.unwrap().text.as_deref(),
            Some("Send a new tag for link #3")
        );
        assert!(update.callback_query.is_none());
    }

    #[test]
    fn test_serialize_reply_markup() {
        let markup = ReplyMarkup::InlineKeyboard {
            inline_keyboard: vec![vec![InlineKeyboardButton {
                text: "#sale".to_string(),
                callback_data: "tag:1:sale".to_string(),
            }]],
        };
        assert_eq!(
            serde_json::to_value(&markup).unwrap(),
            serde_json::json!({
                "inline_keyboard": [[{ "text": "#sale", "callback_data": "tag:1:sale" }]]
            })
        );
    }
}
