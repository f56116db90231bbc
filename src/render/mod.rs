//! Static per-chat bookmarks pages.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use tera::{Context, Tera};
use thiserror::Error;
use tracing::info;

use crate::db::services::LinkWithTags;
use crate::metadata::{NO_PRICE, web_url};

/// Route prefix under which snapshots are served.
pub const SNAPSHOT_ROUTE: &str = "/storage/links_history";

const TEMPLATE_NAME: &str = "bookmarks.html";
const TEMPLATE: &str = include_str!("templates/bookmarks.html");

pub const TITLE_BUDGET: usize = 150;
pub const DESCRIPTION_BUDGET: usize = 200;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Template error: {0}")]
    Template(#[from] tera::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Chat id cannot be used in a file name: {0}")]
    InvalidChatId(String),
}

/// Where a snapshot was written and the URL users reach it at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    pub path: PathBuf,
    pub url: String,
}

#[derive(Serialize)]
struct Card {
    title: String,
    description: String,
    url: String,
    thumbnail: Option<String>,
    initial: String,
    price: Option<String>,
    site_name: Option<String>,
    tags: Vec<String>,
    tags_attr: String,
    search_text: String,
    added: String,
}

pub struct PageRenderer {
    tera: Tera,
    storage_dir: PathBuf,
    public_base_url: String,
}

impl PageRenderer {
    pub fn new(
        storage_dir: impl Into<PathBuf>,
        public_base_url: &str,
    ) -> Result<Self, RenderError> {
        let mut tera = Tera::default();
        tera.add_raw_template(TEMPLATE_NAME, TEMPLATE)?;
        Ok(Self {
            tera,
            storage_dir: storage_dir.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Public URL of a chat's snapshot, whether or not it has been written yet.
    pub fn snapshot_url(&self, chat_id: &str) -> String {
        format!("{}{}/{}", self.public_base_url, SNAPSHOT_ROUTE, snapshot_file_name(chat_id))
    }

    /// Renders `links` (in the given order) and overwrites the chat's snapshot file.
    pub async fn render(
        &self,
        chat_id: &str,
        display_name: Option<&str>,
        links: &[LinkWithTags],
    ) -> Result<RenderedPage, RenderError> {
        validate_chat_id(chat_id)?;
        let html = self.render_html(display_name, links, Utc::now())?;

        tokio::fs::create_dir_all(&self.storage_dir).await?;
        let path = self.storage_dir.join(snapshot_file_name(chat_id));
        tokio::fs::write(&path, html).await?;

        info!(chat_id, links = links.len(), path = %path.display(), "Bookmarks page rendered.");
        Ok(RenderedPage {
            path,
            url: self.snapshot_url(chat_id),
        })
    }

    /// The page markup. Deterministic for identical `links` and `now`.
    pub fn render_html(
        &self,
        display_name: Option<&str>,
        links: &[LinkWithTags],
        now: DateTime<Utc>,
    ) -> Result<String, RenderError> {
        let heading = match display_name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => format!("{name}'s Bookmarks"),
            None => "Your Bookmarks".to_string(),
        };

        let mut tags: Vec<&str> = links
            .iter()
            .flat_map(|l| l.tags.iter().map(String::as_str))
            .collect();
        tags.sort_unstable();
        tags.dedup();

        let cards: Vec<Card> = links.iter().map(|link| card_for(link, now)).collect();

        let mut context = Context::new();
        context.insert("heading", &heading);
        context.insert("tags", &tags);
        context.insert("links", &cards);
        Ok(self.tera.render(TEMPLATE_NAME, &context)?)
    }
}

fn card_for(link: &LinkWithTags, now: DateTime<Utc>) -> Card {
    let display_site = link.site_name.clone().filter(|s| !s.trim().is_empty());
    let initial = display_site
        .as_deref()
        .unwrap_or(&link.title)
        .chars()
        .find(|c| c.is_alphanumeric())
        .map(|c| c.to_uppercase().to_string())
        .unwrap_or_else(|| "#".to_string());

    let href = web_url(&link.url)
        .or_else(|| web_url(&link.link))
        .unwrap_or_else(|| "#".to_string());

    Card {
        title: truncate(&link.title, TITLE_BUDGET),
        description: truncate(&link.description, DESCRIPTION_BUDGET),
        url: href.clone(),
        thumbnail: link.images.first().and_then(|i| web_url(i)),
        initial,
        price: Some(link.price.trim())
            .filter(|p| !p.is_empty() && *p != NO_PRICE)
            .map(str::to_string),
        site_name: display_site,
        tags: link.tags.clone(),
        tags_attr: link.tags.join("|"),
        search_text: format!("{} {} {}", link.title, link.description, href).to_lowercase(),
        added: relative_day(link.created_at, now),
    }
}

/// Cuts `text` to `budget` characters, marking the cut with `...`.
pub fn truncate(text: &str, budget: usize) -> String {
    if text.chars().count() <= budget {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(budget).collect();
    cut.push_str("...");
    cut
}

/// "today", "yesterday" or "N days ago", counted in UTC calendar days.
pub fn relative_day(created_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let days = (now.date_naive() - created_at.date_naive()).num_days();
    match days {
        d if d <= 0 => "today".to_string(),
        1 => "yesterday".to_string(),
        d => format!("{d} days ago"),
    }
}

pub fn snapshot_file_name(chat_id: &str) -> String {
    format!("{chat_id}_history.html")
}

/// Rejects chat ids that cannot be used as a snapshot file name.
pub fn validate_chat_id(chat_id: &str) -> Result<(), RenderError> {
    let valid = !chat_id.is_empty()
        && chat_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(RenderError::InvalidChatId(chat_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::path::Path;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
    }

    fn link(id: i32, title: &str, tags: &[&str], created_at: DateTime<Utc>) -> LinkWithTags {
        LinkWithTags {
            id,
            chat_id: "555".to_string(),
            link: format!("https://shop.example/{id}"),
            title: title.to_string(),
            description: "Plain description".to_string(),
            url: format!("https://shop.example/{id}"),
            price: "N/A".to_string(),
            images: Vec::new(),
            site_name: Some("Shop".to_string()),
            created_at,
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn renderer(dir: &Path) -> PageRenderer {
        PageRenderer::new(dir, "https://bot.example.org/").unwrap()
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("exactly", 7), "exactly");
        assert_eq!(truncate("ünïcödé text", 5), "ünïcö...");
    }

    #[test]
    fn test_relative_day() {
        let now = now();
        assert_eq!(relative_day(now - Duration::hours(3), now), "today");
        assert_eq!(relative_day(now - Duration::hours(13), now), "yesterday");
        assert_eq!(relative_day(now - Duration::days(5), now), "5 days ago");
        assert_eq!(relative_day(now + Duration::hours(2), now), "today");
    }

    #[test]
    fn test_render_html_cards_and_filter_bar() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = renderer(dir.path());
        let mut priced = link(2, "Kettle", &["sale", "home"], now() - Duration::days(1));
        priced.price = "$25.00".to_string();
        priced.images = vec!["https://img.example/k.jpg".to_string()];
        let long_title = "A".repeat(200);
        let links = vec![priced, link(1, &long_title, &["sale"], now())];

        let html = renderer.render_html(Some("Ada"), &links, now()).unwrap();

        assert!(html.contains("<title>Ada&#x27;s Bookmarks</title>"));
        assert!(html.contains(r#"data-tag="home">#home</button>"#));
        assert_eq!(html.matches(r#"data-tag="sale""#).count(), 1);
        assert!(html.contains(r#"data-tags="sale|home""#));
        assert!(html.contains("$25.00"));
        assert!(html.contains("yesterday"));
        assert!(html.contains("today"));
        assert!(html.contains(&format!("{}...", "A".repeat(150))));
        assert!(!html.contains(&"A".repeat(151)));
        assert!(html.contains("https:&#x2F;&#x2F;img.example&#x2F;k.jpg"));
        // The unpriced card shows no price line.
        assert_eq!(html.matches(r#"<span class="price">"#).count(), 1);

        let again = renderer.render_html(Some("Ada"), &links, now()).unwrap();
        assert_eq!(html, again);
    }

    #[test]
    fn test_render_escapes_markup() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = renderer(dir.path());
        let links = vec![link(1, "<script>alert(1)</script>", &[], now())];

        let html = renderer.render_html(None, &links, now()).unwrap();
        assert!(html.contains("Your Bookmarks"));
        assert!(!html.contains("<script>alert(1)</script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_card_links_only_to_web_urls() {
        let dir = tempfile::tempdir().unwrap();
        let mut hostile = link(7, "Hostile", &[], now());
        hostile.url = "javascript:alert(document.domain)".to_string();
        hostile.images = vec!["javascript:alert(1)//x.png".to_string()];

        let html = renderer(dir.path())
            .render_html(None, &[hostile], now())
            .unwrap();
        assert!(!html.to_ascii_lowercase().contains("javascript:"));
        assert!(html.contains(r#"href="https:&#x2F;&#x2F;shop.example&#x2F;7""#));
    }

    #[test]
    fn test_empty_collection() {
        let dir = tempfile::tempdir().unwrap();
        let html = renderer(dir.path()).render_html(Some("Ada"), &[], now()).unwrap();
        assert!(html.contains("No bookmarks yet"));
    }

    #[tokio::test]
    async fn test_render_writes_and_overwrites_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = renderer(&dir.path().join("links_history"));

        let page = renderer
            .render("-100123", Some("Ada"), &[link(1, "First", &[], Utc::now())])
            .await
            .unwrap();
        assert_eq!(
            page.url,
            "https://bot.example.org/storage/links_history/-100123_history.html"
        );
        assert!(std::fs::read_to_string(&page.path).unwrap().contains("First"));

        let page = renderer.render("-100123", Some("Ada"), &[]).await.unwrap();
        let html = std::fs::read_to_string(&page.path).unwrap();
        assert!(!html.contains("First"));
        assert!(html.contains("No bookmarks yet"));
    }

    #[tokio::test]
    async fn test_rejects_path_like_chat_ids() {
        let dir = tempfile::tempdir().unwrap();
        let result = renderer(dir.path()).render("../etc", None, &[]).await;
        assert!(matches!(result, Err(RenderError::InvalidChatId(_))));
    }
}
