//! Configuration types for the stock tracker bot.
//!
//! Loaded from TOML, then overridden by `GAGSTOCK_*` environment variables
//! so secrets never have to live in the file.

use gagstock_feed::FeedConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Inbound webhook listener.
    pub gateway: GatewayConfig,
    /// Outbound Messenger send API.
    pub messenger: MessengerConfig,
    /// Remote stock and weather endpoints.
    pub feed: FeedConfig,
    /// Session scheduling and cleanup.
    pub tracker: TrackerConfig,
    /// Per-user inbound command limits.
    pub rate_limit: RateLimitConfig,
    /// Admin identities.
    pub admin: AdminConfig,
}

/// Webhook gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// Token echoed back during the Messenger webhook verification handshake.
    pub verify_token: String,
    /// Optional bearer token required on the generic `/inbound` route.
    pub bearer_token: Option<String>,
    /// Capacity of the inbound message queue.
    pub inbound_queue_size: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 3000,
            verify_token: String::new(),
            bearer_token: None,
            inbound_queue_size: 128,
        }
    }
}

/// Messenger send API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MessengerConfig {
    pub page_access_token: String,
    /// Graph API base, including the version segment.
    pub graph_base_url: String,
}

impl Default for MessengerConfig {
    fn default() -> Self {
        Self {
            page_access_token: String::new(),
            graph_base_url: "https://graph.facebook.com/v18.0".to_owned(),
        }
    }
}

/// Session scheduling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Grid interval for scheduled cycles.
    pub interval_secs: u64,
    /// Offset added to each grid point, giving the shop time to restock.
    pub offset_secs: u64,
    /// Sessions idle longer than this are removed by the sweep.
    pub inactivity_timeout_secs: u64,
    /// How often the idle sweep runs.
    pub sweep_interval_secs: u64,
    /// Delay before a sent fingerprint is cleared and unchanged stock is
    /// reported again. `0` keeps it until the session ends. Keep it off a
    /// multiple of `interval_secs` so the clear never lands on a tick.
    pub fingerprint_ttl_secs: u64,
    /// UTC offset used for restock countdowns.
    pub restock_utc_offset_hours: i32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            offset_secs: 30,
            inactivity_timeout_secs: 30 * 60,
            sweep_interval_secs: 5 * 60,
            fingerprint_ttl_secs: 750,
            restock_utc_offset_hours: 8,
        }
    }
}

impl TrackerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn offset(&self) -> Duration {
        Duration::from_secs(self.offset_secs)
    }

    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_secs(self.inactivity_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    pub fn fingerprint_ttl(&self) -> Option<Duration> {
        (self.fingerprint_ttl_secs > 0).then(|| Duration::from_secs(self.fingerprint_ttl_secs))
    }
}

/// Per-user inbound rate limit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub max_commands_per_minute: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_commands_per_minute: 10,
        }
    }
}

/// Admin identities allowed to run admin commands.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    pub admin_ids: Vec<String>,
}

impl BotConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::BotError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::BotError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `~/.config/gagstock/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config).join("gagstock").join("config.toml")
        } else if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("gagstock")
                .join("config.toml")
        } else {
            PathBuf::from("/tmp/gagstock-config/config.toml")
        }
    }

    /// Apply `GAGSTOCK_*` overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if `GAGSTOCK_PORT` is not a valid port number.
    pub fn apply_env(&mut self) -> crate::error::Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup. Empty values are ignored.
    pub(crate) fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> crate::error::Result<()> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());

        if let Some(token) = get("GAGSTOCK_PAGE_ACCESS_TOKEN") {
            self.messenger.page_access_token = token;
        }
        if let Some(token) = get("GAGSTOCK_VERIFY_TOKEN") {
            self.gateway.verify_token = token;
        }
        if let Some(admin) = get("GAGSTOCK_ADMIN_ID")
            && !self.admin.admin_ids.contains(&admin)
        {
            self.admin.admin_ids.push(admin);
        }
        if let Some(port) = get("GAGSTOCK_PORT") {
            self.gateway.port = port.parse().map_err(|_| {
                crate::error::BotError::Config(format!("GAGSTOCK_PORT `{port}` is not a port"))
            })?;
        }
        if let Some(url) = get("GAGSTOCK_STOCK_URL") {
            self.feed.stock_url = url;
        }
        if let Some(url) = get("GAGSTOCK_WEATHER_URL") {
            self.feed.weather_url = url;
        }
        Ok(())
    }
}

/// Severity of a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigIssueSeverity {
    Warning,
    Error,
}

/// Validation issue surfaced at startup and by `check-config`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    pub id: String,
    pub severity: ConfigIssueSeverity,
    pub summary: String,
}

impl ConfigIssue {
    fn new(id: &str, severity: ConfigIssueSeverity, summary: impl Into<String>) -> Self {
        Self {
            id: id.to_owned(),
            severity,
            summary: summary.into(),
        }
    }
}

/// Validate configuration without network calls.
#[must_use]
pub fn validate_config(config: &BotConfig) -> Vec<ConfigIssue> {
    let mut issues = Vec::new();

    if config.messenger.page_access_token.trim().is_empty() {
        issues.push(ConfigIssue::new(
            "messenger-missing-token",
            ConfigIssueSeverity::Error,
            "Messenger page access token is empty; notifications cannot be sent.",
        ));
    }
    if config.gateway.verify_token.trim().is_empty() {
        issues.push(ConfigIssue::new(
            "gateway-missing-verify-token",
            ConfigIssueSeverity::Warning,
            "Webhook verification will fail until a verify token is set.",
        ));
    }
    if let Err(err) = config.feed.validate() {
        issues.push(ConfigIssue::new(
            "feed-invalid",
            ConfigIssueSeverity::Error,
            err.to_string(),
        ));
    }
    if config.admin.admin_ids.is_empty() {
        issues.push(ConfigIssue::new(
            "admin-empty-allowlist",
            ConfigIssueSeverity::Warning,
            "No admin ids configured; admin commands are disabled.",
        ));
    }
    if config.rate_limit.max_commands_per_minute == 0 {
        issues.push(ConfigIssue::new(
            "rate-limit-zero",
            ConfigIssueSeverity::Error,
            "max_commands_per_minute is 0; every command would be rejected.",
        ));
    }
    if config.tracker.offset_secs >= config.tracker.interval_secs.max(1) {
        issues.push(ConfigIssue::new(
            "tracker-offset-exceeds-interval",
            ConfigIssueSeverity::Warning,
            "offset_secs is not smaller than interval_secs; wake times will drift a full slot.",
        ));
    }
    let ttl = config.tracker.fingerprint_ttl_secs;
    if ttl > 0 && ttl % config.tracker.interval_secs.max(1) == 0 {
        issues.push(ConfigIssue::new(
            "tracker-ttl-on-grid",
            ConfigIssueSeverity::Warning,
            "fingerprint_ttl_secs is a multiple of interval_secs; repeat notifications will depend on fetch latency.",
        ));
    }

    let bearer_missing = config
        .gateway
        .bearer_token
        .as_ref()
        .is_none_or(|token| token.trim().is_empty());
    if config.gateway.host.trim() == "0.0.0.0" && bearer_missing {
        issues.push(ConfigIssue::new(
            "gateway-public-without-auth",
            ConfigIssueSeverity::Warning,
            "Binding to 0.0.0.0 without a bearer token exposes the generic inbound route.",
        ));
    }

    issues
}
