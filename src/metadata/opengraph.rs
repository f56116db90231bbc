use reqwest::Client;
use std::collections::HashMap;

use super::{Metadata, NO_PRICE, ResolveError, ResolverConfig, host_of, web_url};

/// Fetches the page (through the unblocker when one is configured) and extracts
/// OpenGraph metadata from it.
pub async fn fetch_open_graph(
    client: &Client,
    config: &ResolverConfig,
    url: &str,
) -> Result<Metadata, ResolveError> {
    let request = match config.unblocker_url.as_deref() {
        Some(unblocker) => {
            let mut request = client.get(unblocker).query(&[("url", url)]);
            if let Some(key) = config.unblocker_api_key.as_deref() {
                request = request.query(&[("api_key", key)]);
            }
            request
        }
        None => client.get(url),
    };

    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(ResolveError::Status(status));
    }
    let html = response.text().await?;
    Ok(extract_open_graph(&html, url))
}

/// Builds `Metadata` from the page's `og:*` tags. Each field falls back on its own.
pub fn extract_open_graph(html: &str, url: &str) -> Metadata {
    let tags = MetaTags::parse(html);

    let title = tags
        .get("og:title")
        .or_else(|| tags.get("twitter:title"))
        .or_else(|| extract_title_element(html))
        .unwrap_or_else(|| url.to_string());
    let description = tags
        .get("og:description")
        .or_else(|| tags.get("description"))
        .unwrap_or_default();
    let canonical = tags
        .get("og:url")
        .and_then(|u| web_url(&u))
        .unwrap_or_else(|| url.to_string());
    let images = tags
        .get("og:image")
        .and_then(|u| web_url(&u))
        .into_iter()
        .collect();
    let site_name = tags.get("og:site_name").or_else(|| host_of(url));

    let price = match (
        tags.get("product:price:amount").or_else(|| tags.get("og:price:amount")),
        tags.get("product:price:currency").or_else(|| tags.get("og:price:currency")),
    ) {
        (Some(amount), Some(currency)) => format!("{amount} {currency}"),
        (Some(amount), None) => amount,
        _ => NO_PRICE.to_string(),
    };

    Metadata {
        title,
        description,
        url: canonical,
        price,
        images,
        site_name,
    }
}

/// `<meta>` tags keyed by their lower-cased `property`, `name` or `itemprop`.
/// The first occurrence of a key wins.
struct MetaTags(HashMap<String, String>);

impl MetaTags {
    fn parse(html: &str) -> Self {
        // ASCII lowercasing keeps byte offsets aligned with `html`.
        let lower = html.to_ascii_lowercase();
        let mut map = HashMap::new();
        let mut cursor = 0usize;

        while let Some(rel) = lower[cursor..].find("<meta") {
            let start = cursor + rel;
            let Some(close_rel) = lower[start..].find('>') else {
                break;
            };
            let end = start + close_rel + 1;
            let attributes = parse_attributes(&html[start..end]);

            let key = ["property", "name", "itemprop"]
                .iter()
                .find_map(|attr| attributes.get(*attr));
            if let (Some(key), Some(content)) = (key, attributes.get("content")) {
                let content = decode_entities(content.trim());
                if !content.is_empty() {
                    map.entry(key.to_ascii_lowercase()).or_insert(content);
                }
            }
            cursor = end;
        }
        Self(map)
    }

    fn get(&self, key: &str) -> Option<String> {
        self.0.get(key).cloned()
    }
}

/// Parses `name="value"`, `name='value'` and `name=value` pairs out of a single tag.
fn parse_attributes(tag: &str) -> HashMap<String, String> {
    let inner = tag.trim_start_matches('<').trim_end_matches('>');
    let chars: Vec<char> = inner.chars().collect();
    let mut attributes = HashMap::new();

    // Skip the element name.
    let mut i = chars.iter().position(|c| c.is_whitespace()).unwrap_or(chars.len());

    while i < chars.len() {
        while i < chars.len() && (chars[i].is_whitespace() || chars[i] == '/') {
            i += 1;
        }
        let name_start = i;
        while i < chars.len() && !chars[i].is_whitespace() && chars[i] != '=' && chars[i] != '/' {
            i += 1;
        }
        let name: String = chars[name_start..i].iter().collect::<String>().to_ascii_lowercase();

        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        let mut value = String::new();
        if i < chars.len() && chars[i] == '=' {
            i += 1;
            while i < chars.len() && chars[i].is_whitespace() {
                i += 1;
            }
            if i < chars.len() && (chars[i] == '"' || chars[i] == '\'') {
                let quote = chars[i];
                i += 1;
                let value_start = i;
                while i < chars.len() && chars[i] != quote {
                    i += 1;
                }
                value = chars[value_start..i].iter().collect();
                i += 1;
            } else {
                let value_start = i;
                while i < chars.len() && !chars[i].is_whitespace() {
                    i += 1;
                }
                value = chars[value_start..i].iter().collect();
            }
        }

        if !name.is_empty() {
            attributes.entry(name).or_insert(value);
        } else if i == name_start {
            // Stray character such as an unmatched `=`; skip it.
            i += 1;
        }
    }
    attributes
}

fn extract_title_element(html: &str) -> Option<String> {
    let lower = html.to_ascii_lowercase();
    let open = lower.find("<title")?;
    let content_start = open + lower[open..].find('>')? + 1;
    let content_end = content_start + lower[content_start..].find("</title>")?;
    let text = decode_entities(&html[content_start..content_end]);
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Decodes the handful of entities that show up in meta content.
fn decode_entities(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp..];
        let decoded = after.find(';').filter(|semi| *semi <= 10).and_then(|semi| {
            let entity = &after[1..semi];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some(' '),
                _ if entity.starts_with("#x") || entity.starts_with("#X") => {
                    u32::from_str_radix(&entity[2..], 16).ok().and_then(char::from_u32)
                }
                _ if entity.starts_with('#') => {
                    entity[1..].parse::<u32>().ok().and_then(char::from_u32)
                }
                _ => None,
            };
            ch.map(|c| (c, semi + 1))
        });
        match decoded {
            Some((c, consumed)) => {
                out.push(c);
                rest = &after[consumed..];
            }
            None => {
                out.push('&');
                rest = &after[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
