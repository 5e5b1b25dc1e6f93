//! Gateway configuration types.
//!
//! Values come from `config.toml` with environment overrides; every field has
//! a serde default so a bare token is enough to run.

use serde::{Deserialize, Serialize};

/// Provider limit on participants per availability query. Rosters are split
/// into groups of at most this many members unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Cronofy API access token (bearer). Required, no default.
    #[serde(default)]
    pub access_token: String,

    /// Base URL of the Cronofy data centre to query.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// TCP port the HTTP boundary listens on.
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub cache: CacheConfig,
}

/// Outbound provider tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Maximum members per availability query (provider participant limit).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Outbound request deadline in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Outbound requests per second across all concurrent batches.
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
}

/// Availability cache tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Entry time-to-live in seconds.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Interval between expired-entry sweeps in seconds.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_base_url() -> String {
    "https://api-au.cronofy.com".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_timeout_secs() -> u64 {
    25
}

fn default_requests_per_second() -> u32 {
    15
}

fn default_ttl_secs() -> u64 {
    300
}

fn default_sweep_interval_secs() -> u64 {
    60
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            timeout_secs: default_timeout_secs(),
            requests_per_second: default_requests_per_second(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            base_url: default_base_url(),
            port: default_port(),
            provider: ProviderConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}
