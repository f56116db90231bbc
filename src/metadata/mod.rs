//! Link metadata resolution.
//!
//! `MetadataResolver::resolve` walks an ordered chain: the product-scraping API for
//! known shop domains, then an (optionally unblocked) page fetch with OpenGraph
//! extraction, then a stub built from the URL alone. It never returns an error.

use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::server::config::ServerConfig;

pub mod opengraph;
pub mod product;

/// Placeholder used when no price could be determined.
pub const NO_PRICE: &str = "N/A";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub title: String,
    pub description: String,
    /// Canonical URL, or the input URL when none was found.
    pub url: String,
    pub price: String,
    pub images: Vec<String>,
    pub site_name: Option<String>,
}

impl Metadata {
    /// The record returned when every strategy failed.
    pub fn stub(url: &str) -> Self {
        Self {
            title: url.to_string(),
            description: String::new(),
            url: url.to_string(),
            price: NO_PRICE.to_string(),
            images: Vec::new(),
            site_name: None,
        }
    }
}

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Upstream returned non-success status: {0}")]
    Status(reqwest::StatusCode),
    #[error("Malformed upstream response: {0}")]
    Malformed(String),
    #[error("Not configured: {0}")]
    NotConfigured(&'static str),
}

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub product_api_url: Option<String>,
    pub product_api_key: Option<String>,
    pub unblocker_url: Option<String>,
    pub unblocker_api_key: Option<String>,
    pub timeout: Duration,
    pub product_domains: Vec<String>,
}

impl From<&ServerConfig> for ResolverConfig {
    fn from(config: &ServerConfig) -> Self {
        Self {
            product_api_url: config.product_api_url.clone(),
            product_api_key: config.product_api_key.clone(),
            unblocker_url: config.unblocker_url.clone(),
            unblocker_api_key: config.unblocker_api_key.clone(),
            timeout: config.fetch_timeout(),
            product_domains: config.product_domains.clone(),
        }
    }
}

pub struct MetadataResolver {
    client: Client,
    config: ResolverConfig,
}

impl MetadataResolver {
    pub fn new(config: ResolverConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("linkshelf/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, config })
    }

    /// Resolves metadata for `url`. Failures are logged and degrade to the next strategy.
    pub async fn resolve(&self, url: &str) -> Metadata {
        if is_product_url(url, &self.config.product_domains) {
            match product::fetch_product(&self.client, &self.config, url).await {
                Ok(metadata) => {
                    debug!(url, "Resolved metadata through the product API.");
                    return metadata;
                }
                Err(e) => {
                    warn!(url, error = %e, "Product lookup failed, falling back to page fetch.");
                }
            }
        }

        match opengraph::fetch_open_graph(&self.client, &self.config, url).await {
            Ok(metadata) => {
                debug!(url, "Resolved metadata from OpenGraph tags.");
                metadata
            }
            Err(e) => {
                warn!(url, error = %e, "Page fetch failed, returning stub metadata.");
                Metadata::stub(url)
            }
        }
    }
}

/// Lower-cased host of `url`, if it parses.
pub fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
}

/// `candidate` trimmed, if it is an absolute `http`/`https` URL. Anything else
/// (`javascript:`, `data:`, relative paths) is rejected.
pub fn web_url(candidate: &str) -> Option<String> {
    let candidate = candidate.trim();
    match Url::parse(candidate) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Some(candidate.to_string()),
        _ => None,
    }
}

/// Whether the host of `url` belongs to one of the configured shop domains.
///
/// A bare pattern such as `amazon` matches any host label (`www.amazon.co.uk`);
/// a dotted pattern such as `shop.example.com` matches that host and its subdomains.
pub fn is_product_url(url: &str, domains: &[String]) -> bool {
    let Some(host) = host_of(url) else {
        return false;
    };
    domains.iter().any(|pattern| {
        let pattern = pattern.to_ascii_lowercase();
        if pattern.contains('.') {
            host == pattern || host.ends_with(&format!(".{pattern}"))
        } else {
            host.split('.').any(|label| label == pattern)
        }
    })
}
