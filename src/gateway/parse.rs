use reqwest::Url;

/// Telegram rejects callback data longer than this many bytes.
pub const MAX_CALLBACK_DATA_BYTES: usize = 64;

const NEW_TAG_PROMPT_PREFIX: &str = "Send a new tag for link #";

/// A link message split into its URL and hashtags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLink {
    pub url: String,
    pub tags: Vec<String>,
}

/// Splits `text` on whitespace: `#word` tokens are tags, the first `http(s)://`
/// token that parses as a URL is the link. Returns `None` when there is no link.
pub fn parse_link_message(text: &str) -> Option<ParsedLink> {
    let mut url = None;
    let mut tags: Vec<String> = Vec::new();

    for token in text.split_whitespace() {
        if let Some(tag) = token.strip_prefix('#') {
            if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
                tags.push(tag.to_string());
            }
        } else if url.is_none() && is_http_url(token) {
            url = Some(token.to_string());
        }
    }

    url.map(|url| ParsedLink { url, tags })
}

fn is_http_url(token: &str) -> bool {
    let lower = token.to_ascii_lowercase();
    (lower.starts_with("http://") || lower.starts_with("https://"))
        && Url::parse(token).map(|u| u.host_str().is_some()).unwrap_or(false)
}

/// Inline-keyboard actions, encoded as `action:link_id[:value]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    AddTag { link_id: i32, tag: String },
    PromptNewTag { link_id: i32 },
    DeleteLink { link_id: i32 },
}

impl CallbackAction {
    pub fn parse(data: &str) -> Option<Self> {
        let mut parts = data.splitn(3, ':');
        let action = parts.next()?;
        let link_id: i32 = parts.next()?.parse().ok()?;
        let value = parts.next();

        match (action, value) {
            ("tag", Some(tag)) if !tag.is_empty() => Some(Self::AddTag {
                link_id,
                tag: tag.to_string(),
            }),
            ("newtag", None) => Some(Self::PromptNewTag { link_id }),
            ("del", None) => Some(Self::DeleteLink { link_id }),
            _ => None,
        }
    }

    pub fn encode(&self) -> String {
        match self {
            Self::AddTag { link_id, tag } => format!("tag:{link_id}:{tag}"),
            Self::PromptNewTag { link_id } => format!("newtag:{link_id}"),
            Self::DeleteLink { link_id } => format!("del:{link_id}"),
        }
    }

    pub fn link_id(&self) -> i32 {
        match self {
            Self::AddTag { link_id, .. }
            | Self::PromptNewTag { link_id }
            | Self::DeleteLink { link_id } => *link_id,
        }
    }
}

pub fn new_tag_prompt(link_id: i32) -> String {
    format!("{NEW_TAG_PROMPT_PREFIX}{link_id}")
}

/// The link id a new-tag prompt refers to, if `text` is such a prompt.
pub fn parse_new_tag_prompt(text: &str) -> Option<i32> {
    text.trim().strip_prefix(NEW_TAG_PROMPT_PREFIX)?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_with_hashtags() {
        let parsed = parse_link_message("https://example.com/item #sale #deal").unwrap();
        assert_eq!(parsed.url, "https://example.com/item");
        assert_eq!(parsed.tags, vec!["sale", "deal"]);
    }

    #[test]
    fn test_tags_before_url_and_duplicates() {
        let parsed = parse_link_message("#a look at this  HTTP://Example.com/x #a # #b").unwrap();
        assert_eq!(parsed.url, "HTTP://Example.com/x");
        assert_eq!(parsed.tags, vec!["a", "b"]);
    }

    #[test]
    fn test_non_links_rejected() {
        assert_eq!(parse_link_message("hello there #tag"), None);
        assert_eq!(parse_link_message("ftp://example.com/file"), None);
        assert_eq!(parse_link_message("https://"), None);
        assert_eq!(parse_link_message(""), None);
    }

    #[test]
    fn test_callback_actions() {
        assert_eq!(
            CallbackAction::parse("tag:12:wish:list"),
            Some(CallbackAction::AddTag { link_id: 12, tag: "wish:list".to_string() })
        );
        assert_eq!(
            CallbackAction::parse("newtag:3"),
            Some(CallbackAction::PromptNewTag { link_id: 3 })
        );
        assert_eq!(CallbackAction::parse("del:9"), Some(CallbackAction::DeleteLink { link_id: 9 }));
        assert_eq!(CallbackAction::parse("tag:12"), None);
        assert_eq!(CallbackAction::parse("del:abc"), None);
        assert_eq!(CallbackAction::parse("boom:1"), None);

        let action = CallbackAction::AddTag { link_id: 5, tag: "sale".to_string() };
        assert_eq!(CallbackAction::parse(&action.encode()), Some(action));
    }

    #[test]
    fn test_new_tag_prompt() {
        assert_eq!(parse_new_tag_prompt(&new_tag_prompt(17)), Some(17));
        assert_eq!(parse_new_tag_prompt("Send a new tag for link #x"), None);
        assert_eq!(parse_new_tag_prompt("unrelated"), None);
    }
}
