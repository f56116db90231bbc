use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Deserialize, Debug, Clone)]
pub struct ServerConfig {
    pub telegram_bot_token: String,
    pub database_url: String,
    /// Externally reachable base URL, used for snapshot links handed to users.
    pub public_base_url: String,

    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    #[serde(default = "default_storage_dir")]
    pub storage_dir: String,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default)]
    pub product_api_url: Option<String>,
    #[serde(default)]
    pub product_api_key: Option<String>,
    #[serde(default)]
    pub unblocker_url: Option<String>,
    #[serde(default)]
    pub unblocker_api_key: Option<String>,

    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    #[serde(default = "default_product_domains")]
    pub product_domains: Vec<String>,

    #[serde(default = "default_telegram_api_base")]
    pub telegram_api_base: String,
}

// Partial config for layering
#[derive(Deserialize, Default, Debug)]
struct PartialServerConfig {
    telegram_bot_token: Option<String>,
    database_url: Option<String>,
    public_base_url: Option<String>,
    listen_addr: Option<String>,
    storage_dir: Option<String>,
    log_dir: Option<String>,
    product_api_url: Option<String>,
    product_api_key: Option<String>,
    unblocker_url: Option<String>,
    unblocker_api_key: Option<String>,
    fetch_timeout_secs: Option<u64>,
    /// Comma-separated in the environment, a plain string in TOML too.
    product_domains: Option<String>,
    telegram_api_base: Option<String>,
}

fn default_listen_addr() -> String {
    "0.0.0.0:5000".to_string()
}

fn default_storage_dir() -> String {
    "storage/links_history".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_fetch_timeout_secs() -> u64 {
    20
}

fn default_telegram_api_base() -> String {
    "https://api.telegram.org".to_string()
}

pub fn default_product_domains() -> Vec<String> {
    ["amazon", "ebay", "walmart", "aliexpress", "etsy", "target", "bestbuy"]
        .iter()
        .map(|d| d.to_string())
        .collect()
}

fn parse_domain_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|d| d.trim().to_ascii_lowercase())
        .filter(|d| !d.is_empty())
        .collect()
}

impl ServerConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self, String> {
        dotenv::dotenv().ok();

        // 1. Load from file (optional)
        let file_config: PartialServerConfig = if let Some(path_str) = config_path {
            let path = Path::new(path_str);
            if path.exists() {
                let contents = fs::read_to_string(path)
                    .map_err(|e| format!("Failed to read config file at {path:?}: {e}"))?;
                toml::from_str(&contents)
                    .map_err(|e| format!("Failed to parse TOML from config file at {path:?}: {e}"))?
            } else {
                PartialServerConfig::default()
            }
        } else {
            PartialServerConfig::default()
        };

        // 2. Load from environment variables
        let env_config: PartialServerConfig = envy::from_env::<PartialServerConfig>()
            .map_err(|e| format!("Failed to load config from environment: {e}"))?;

        // 3. Merge: environment overrides file
        Self::merge(env_config, file_config)
    }

    fn merge(env: PartialServerConfig, file: PartialServerConfig) -> Result<Self, String> {
        Ok(ServerConfig {
            telegram_bot_token: env.telegram_bot_token.or(file.telegram_bot_token)
                .ok_or("TELEGRAM_BOT_TOKEN is required")?,
            database_url: env.database_url.or(file.database_url)
                .ok_or("DATABASE_URL is required")?,
            public_base_url: env.public_base_url.or(file.public_base_url)
                .map(|u| u.trim_end_matches('/').to_string())
                .ok_or("PUBLIC_BASE_URL is required")?,
            listen_addr: env.listen_addr.or(file.listen_addr)
                .unwrap_or_else(default_listen_addr),
            storage_dir: env.storage_dir.or(file.storage_dir)
                .unwrap_or_else(default_storage_dir),
            log_dir: env.log_dir.or(file.log_dir)
                .unwrap_or_else(default_log_dir),
            product_api_url: env.product_api_url.or(file.product_api_url),
            product_api_key: env.product_api_key.or(file.product_api_key),
            unblocker_url: env.unblocker_url.or(file.unblocker_url),
            unblocker_api_key: env.unblocker_api_key.or(file.unblocker_api_key),
            fetch_timeout_secs: env.fetch_timeout_secs.or(file.fetch_timeout_secs)
                .unwrap_or_else(default_fetch_timeout_secs),
            product_domains: env.product_domains.or(file.product_domains)
                .map(|raw| parse_domain_list(&raw))
                .unwrap_or_else(default_product_domains),
            telegram_api_base: env.telegram_api_base.or(file.telegram_api_base)
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(default_telegram_api_base),
        })
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}
