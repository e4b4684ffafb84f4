use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_API_URL: &str = "http://127.0.0.1:8080";
const DEFAULT_WEB_ADDR: &str = "127.0.0.1:3000";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: String,
    pub request_timeout: Duration,
    pub log_poll_interval: Duration,
    pub log_limit: usize,
    pub lang_store_path: PathBuf,
    pub web_addr: SocketAddr,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            request_timeout: Duration::from_secs(60),
            log_poll_interval: Duration::from_secs(1),
            log_limit: 100,
            lang_store_path: default_lang_path(),
            web_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
        }
    }
}

fn default_lang_path() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".litho")
        .join("lang.json")
}

impl Config {
    /// Defaults overridden by `LITHO_API_URL`, `LITHO_LANG_FILE` and `LITHO_WEB_ADDR`.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(url) = std::env::var("LITHO_API_URL") {
            if !url.trim().is_empty() {
                cfg = cfg.with_api_base_url(url);
            }
        }
        if let Some(path) = std::env::var_os("LITHO_LANG_FILE") {
            cfg = cfg.with_lang_store_path(path);
        }
        if let Ok(addr) = std::env::var("LITHO_WEB_ADDR") {
            match addr.parse() {
                Ok(addr) => cfg.web_addr = addr,
                Err(_) => tracing::warn!("ignoring LITHO_WEB_ADDR={}, using {}", addr, DEFAULT_WEB_ADDR),
            }
        }
        cfg
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_log_poll_interval(mut self, interval: Duration) -> Self {
        self.log_poll_interval = interval.max(Duration::from_millis(10));
        self
    }

    pub fn with_log_limit(mut self, limit: usize) -> Self {
        self.log_limit = limit.max(1);
        self
    }

    pub fn with_lang_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.lang_store_path = path.into();
        self
    }

    pub fn with_web_addr(mut self, addr: SocketAddr) -> Self {
        self.web_addr = addr;
        self
    }
}
