use reqwest::Client;
use serde_json::Value;

use super::{Metadata, NO_PRICE, ResolveError, ResolverConfig, host_of, web_url};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "avif"];

/// Queries the product-scraping API for `url` and maps the product object to `Metadata`.
pub async fn fetch_product(
    client: &Client,
    config: &ResolverConfig,
    url: &str,
) -> Result<Metadata, ResolveError> {
    let api_url = config
        .product_api_url
        .as_deref()
        .ok_or(ResolveError::NotConfigured("product_api_url"))?;

    let mut request = client.get(api_url).query(&[("url", url)]);
    if let Some(key) = config.product_api_key.as_deref() {
        request = request.query(&[("api_key", key)]);
    }

    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(ResolveError::Status(status));
    }

    let body: Value = response
        .json()
        .await
        .map_err(|e| ResolveError::Malformed(format!("product API body is not JSON: {e}")))?;
    parse_product_response(&body, url)
}

/// Extracts `Metadata` from a product API response body.
pub fn parse_product_response(body: &Value, original_url: &str) -> Result<Metadata, ResolveError> {
    let product = body
        .get("product")
        .or_else(|| body.pointer("/data/product"))
        .or_else(|| body.get("data"))
        .filter(|p| p.is_object())
        .ok_or_else(|| ResolveError::Malformed("no product object in response".to_string()))?;

    let title = non_empty_str(product.get("title"))
        .ok_or_else(|| ResolveError::Malformed("product has no title".to_string()))?;

    let images = normalize_images(product.get("images").or_else(|| product.get("image")));

    Ok(Metadata {
        title,
        description: non_empty_str(product.get("description")).unwrap_or_default(),
        url: non_empty_str(product.get("url"))
            .and_then(|u| web_url(&u))
            .unwrap_or_else(|| original_url.to_string()),
        price: format_price(product.get("price")),
        images,
        site_name: non_empty_str(product.get("site_name"))
            .or_else(|| non_empty_str(product.get("brand")))
            .or_else(|| host_of(original_url)),
    })
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Accepts `"12.99"`, `12.99` or `{ "value": 12.99, "currency": "USD" }`.
fn format_price(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Object(obj)) => {
            let amount = obj.get("value").or_else(|| obj.get("amount"));
            let amount = match amount {
                Some(Value::String(s)) => Some(s.trim().to_string()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            };
            match (amount, non_empty_str(obj.get("currency"))) {
                (Some(amount), Some(currency)) => format!("{amount} {currency}"),
                (Some(amount), None) => amount,
                _ => NO_PRICE.to_string(),
            }
        }
        _ => NO_PRICE.to_string(),
    }
}

/// Flattens the shapes product APIs use for images (list, object of URLs, list of
/// `{url}` objects, single string) into a de-duplicated list of image-file URLs.
pub fn normalize_images(value: Option<&Value>) -> Vec<String> {
    let candidates: Vec<&str> = match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.as_str()),
                Value::Object(obj) => obj.get("url").and_then(Value::as_str),
                _ => None,
            })
            .collect(),
        Some(Value::Object(obj)) => obj.values().filter_map(Value::as_str).collect(),
        Some(Value::String(s)) => vec![s.as_str()],
        _ => Vec::new(),
    };

    let mut images: Vec<String> = Vec::new();
    for candidate in candidates.into_iter().map(str::trim) {
        if web_url(candidate).is_none() || !has_image_extension(candidate) {
            continue;
        }
        if !images.iter().any(|i| i == candidate) {
            images.push(candidate.to_string());
        }
    }
    images
}

/// Checks the path part of `url` (query and fragment ignored) for an image extension.
pub fn has_image_extension(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    match path.rsplit_once('.') {
        Some((_, ext)) => IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()),
        None => false,
    }
}
