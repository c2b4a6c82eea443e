mod defaults;


use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::BridgeError;
use crate::normalize::{NormalizationPolicy, PolicyKind};
use crate::retry::RetryPolicy;
use defaults::*;

/// Top-level bridge configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
}

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Also write logs to `{data_dir}/logs/wabridge.log`.
    #[serde(default)]
    pub log_to_file: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            log_to_file: false,
        }
    }
}

/// HTTP API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
    /// Value expected in the `x-api-key` header. Empty = no auth (local use only).
    #[serde(default)]
    pub api_key: String,
    /// Require the API key on read endpoints (`/status`, `/health`, `/qr`) too.
    #[serde(default)]
    pub protect_reads: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
            api_key: String::new(),
            protect_reads: false,
        }
    }
}

impl ApiConfig {
    /// Listen address (`host:port`).
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// WhatsApp automation client config.
///
/// The session (credentials) and browser cache directories are owned by the
/// sidecar and wiped wholesale by a reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppConfig {
    /// WebSocket URL of the automation sidecar.
    #[serde(default = "default_sidecar_url")]
    pub sidecar_url: String,
    /// Session name, lets several bridges share one sidecar.
    #[serde(default = "default_client_id")]
    pub client_id: String,
    /// Chrome/Chromium executable the sidecar should launch. `None` = bundled.
    #[serde(default)]
    pub browser_path: Option<String>,
    #[serde(default = "default_true")]
    pub headless: bool,
    #[serde(default = "default_session_dir")]
    pub session_dir: String,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,
    /// Pause before re-initializing after a disconnect.
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
    /// Timeout for a single sidecar request.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Timeout for client initialization (browser start-up is slow).
    #[serde(default = "default_init_timeout_secs")]
    pub init_timeout_secs: u64,
    #[serde(default)]
    pub normalization: NormalizationPolicy,
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            sidecar_url: default_sidecar_url(),
            client_id: default_client_id(),
            browser_path: None,
            headless: true,
            session_dir: default_session_dir(),
            cache_dir: default_cache_dir(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            init_timeout_secs: default_init_timeout_secs(),
            normalization: NormalizationPolicy::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl WhatsAppConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn init_timeout(&self) -> Duration {
        Duration::from_secs(self.init_timeout_secs)
    }
}

/// External webhook that records group ids (e.g. a spreadsheet script).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Empty = disabled.
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub token: String,
}

impl WebhookConfig {
    pub fn is_enabled(&self) -> bool {
        !self.url.trim().is_empty()
    }
}

/// Expand `~` to home directory.
pub fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{rest}", home.to_string_lossy());
        }
    }
    path.to_string()
}

impl Config {
    /// Override file values with environment variables.
    ///
    /// `lookup` is `std::env::var(..).ok()` in production; tests pass a map.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), BridgeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(port) = get("PORT") {
            self.api.port = port
                .trim()
                .parse()
                .map_err(|e| BridgeError::Config(format!("invalid PORT '{port}': {e}")))?;
        }
        if let Some(host) = get("HOST") {
            self.api.host = host;
        }
        if let Some(key) = get("API_KEY") {
            self.api.api_key = key;
        }
        if let Some(url) = get("SIDECAR_URL") {
            self.whatsapp.sidecar_url = url;
        }
        if let Some(path) = get("BROWSER_PATH").or_else(|| get("PUPPETEER_EXECUTABLE_PATH")) {
            self.whatsapp.browser_path = Some(path);
        }
        if let Some(url) = get("WEBHOOK_URL") {
            self.webhook.url = url;
        }
        if let Some(token) = get("WEBHOOK_TOKEN") {
            self.webhook.token = token;
        }
        if let Some(policy) = get("NORMALIZATION_POLICY") {
            self.whatsapp.normalization.policy = match policy.trim().to_lowercase().as_str() {
                "strict" => PolicyKind::Strict,
                "lenient" => PolicyKind::Lenient,
                other => {
                    return Err(BridgeError::Config(format!(
                        "invalid NORMALIZATION_POLICY '{other}', expected 'strict' or 'lenient'"
                    )))
                }
            };
        }
        if let Some(code) = get("DEFAULT_COUNTRY_CODE") {
            self.whatsapp.normalization.default_country_code =
                code.trim().trim_start_matches('+').to_string();
        }
        Ok(())
    }

    /// Reject settings the bridge cannot run with.
    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.whatsapp.retry.max_attempts == 0 {
            return Err(BridgeError::Config(
                "whatsapp.retry.max_attempts must be at least 1".into(),
            ));
        }
        let norm = &self.whatsapp.normalization;
        if norm.policy == PolicyKind::Lenient
            && (norm.default_country_code.is_empty()
                || !norm.default_country_code.bytes().all(|b| b.is_ascii_digit()))
        {
            return Err(BridgeError::Config(format!(
                "lenient normalization needs a numeric default_country_code, got '{}'",
                norm.default_country_code
            )));
        }
        if !self.whatsapp.sidecar_url.starts_with("ws://")
            && !self.whatsapp.sidecar_url.starts_with("wss://")
        {
            return Err(BridgeError::Config(format!(
                "whatsapp.sidecar_url must be a ws:// or wss:// URL, got '{}'",
                self.whatsapp.sidecar_url
            )));
        }
        Ok(())
    }

    /// Expand `~` in every path setting.
    pub fn expand_paths(&mut self) {
        self.bridge.data_dir = shellexpand(&self.bridge.data_dir);
        self.whatsapp.session_dir = shellexpand(&self.whatsapp.session_dir);
        self.whatsapp.cache_dir = shellexpand(&self.whatsapp.cache_dir);
        if let Some(path) = self.whatsapp.browser_path.as_mut() {
            *path = shellexpand(path);
        }
    }
}

/// Parse configuration from TOML text.
pub fn from_toml(content: &str) -> Result<Config, BridgeError> {
    toml::from_str(content).map_err(|e| BridgeError::Config(format!("failed to parse config: {e}")))
}

/// Where [`load`] found the base configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    File,
    /// No file at the given path; defaults were used.
    Defaults,
}

/// Load configuration from a TOML file, then apply environment overrides.
///
/// Falls back to defaults if the file does not exist. Runs before logging is
/// set up, so the caller reports the returned [`ConfigSource`].
pub fn load(path: &str) -> Result<(Config, ConfigSource), BridgeError> {
    let path = Path::new(path);
    let (mut config, source) = if path.exists() {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BridgeError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        (from_toml(&content)?, ConfigSource::File)
    } else {
        (Config::default(), ConfigSource::Defaults)
    };

    config.apply_env(|key| std::env::var(key).ok())?;
    config.expand_paths();
    config.validate()?;
    Ok((config, source))
}
