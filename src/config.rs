/**
 * Server Configuration
 * Process settings read from the environment, each with a default
 */
use std::{net::SocketAddr, path::PathBuf, time::Duration};

pub const DEFAULT_SITE_NAME: &str = "Our Studio";
pub const DEFAULT_SITE_DESCRIPTION: &str = "Services, projects and news";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Public base URL, used for absolute links in the feed
    pub site_url: String,
    pub site_name: String,
    pub site_description: String,
    pub request_timeout: Duration,
    pub max_body_bytes: usize,
    pub config_cache_ttl: Duration,
    pub upload_dir: PathBuf,
    /// Cloud Storage bucket; local disk is used when unset
    pub storage_bucket: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
            site_url: "http://localhost:3000".to_string(),
            site_name: DEFAULT_SITE_NAME.to_string(),
            site_description: DEFAULT_SITE_DESCRIPTION.to_string(),
            request_timeout: Duration::from_secs(30),
            // Room for a 5 MB upload plus multipart framing
            max_body_bytes: 6 * 1024 * 1024,
            config_cache_ttl: Duration::from_secs(60),
            upload_dir: PathBuf::from("uploads"),
            storage_bucket: None,
        }
    }
}

fn var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = var(key)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring unparsable environment value");
            None
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: parsed("PORT").unwrap_or(defaults.port),
            site_url: var("SITE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.site_url),
            site_name: var("SITE_NAME").unwrap_or(defaults.site_name),
            site_description: var("SITE_DESCRIPTION").unwrap_or(defaults.site_description),
            request_timeout: parsed("REQUEST_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            max_body_bytes: parsed("MAX_BODY_BYTES").unwrap_or(defaults.max_body_bytes),
            config_cache_ttl: parsed("CONFIG_CACHE_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.config_cache_ttl),
            upload_dir: var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            storage_bucket: var("STORAGE_BUCKET"),
        }
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}
