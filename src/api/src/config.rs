//! Configuration for the Kyotei API.

use serde::{Deserialize, Serialize};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    10000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Upstream fetch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_base_url() -> String {
    crate::scraper::BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_user_agent() -> String {
    concat!("kyotei-api/", env!("CARGO_PKG_VERSION"), " (pre-race info bot)").to_string()
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

/// Upper bound for `cache.ttl_secs` (one day)
const MAX_TTL_SECS: i64 = 24 * 3600;

/// Upper bound for `fetch.timeout_secs`
const MAX_TIMEOUT_SECS: u64 = 120;

/// Race cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Matches the upstream refresh cadence of pre-race data
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: i64,
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

fn default_ttl_secs() -> i64 {
    300
}

fn default_capacity() -> usize {
    256
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            capacity: default_capacity(),
        }
    }
}

/// Messaging platform credentials, required by `serve`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LineConfig {
    #[serde(default)]
    pub channel_secret: String,
    #[serde(default)]
    pub channel_access_token: String,
}

impl LineConfig {
    /// Fail when either secret is missing
    pub fn require(&self) -> anyhow::Result<()> {
        if self.channel_secret.trim().is_empty() {
            anyhow::bail!("line.channel_secret is not set (KYOTEI_LINE__CHANNEL_SECRET or LINE_CHANNEL_SECRET)");
        }
        if self.channel_access_token.trim().is_empty() {
            anyhow::bail!(
                "line.channel_access_token is not set (KYOTEI_LINE__CHANNEL_ACCESS_TOKEN or LINE_CHANNEL_ACCESS_TOKEN)"
            );
        }
        Ok(())
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub line: LineConfig,
}

impl AppConfig {
    /// Load configuration from environment and config file
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            // Start with defaults
            .add_source(config::Config::try_from(&AppConfig::default())?)
            // Add config file if exists
            .add_source(config::File::with_name("config").required(false))
            // Override with environment variables (KYOTEI_SERVER__PORT, KYOTEI_FETCH__TIMEOUT_SECS, ...)
            .add_source(
                config::Environment::with_prefix("KYOTEI")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            // Platform-standard secret names
            .set_override_option("line.channel_secret", std::env::var("LINE_CHANNEL_SECRET").ok())?
            .set_override_option(
                "line.channel_access_token",
                std::env::var("LINE_CHANNEL_ACCESS_TOKEN").ok(),
            )?
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the fetcher or cache unusable
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(1..=MAX_TTL_SECS).contains(&self.cache.ttl_secs) {
            anyhow::bail!(
                "cache.ttl_secs must be between 1 and {}, got {}",
                MAX_TTL_SECS,
                self.cache.ttl_secs
            );
        }
        if self.cache.capacity == 0 {
            anyhow::bail!("cache.capacity must be at least 1");
        }
        if !(1..=MAX_TIMEOUT_SECS).contains(&self.fetch.timeout_secs) {
            anyhow::bail!(
                "fetch.timeout_secs must be between 1 and {}, got {}",
                MAX_TIMEOUT_SECS,
                self.fetch.timeout_secs
            );
        }
        Ok(())
    }
}
