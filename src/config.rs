//! Configuration loader — merges env vars, .env file, and config.toml.

use common::config::GatewayConfig;
use common::Error;
use std::path::Path;

fn parse_positive_u64(raw: &str, env_name: &str) -> Result<u64, Error> {
    let parsed = raw
        .trim()
        .parse::<u64>()
        .map_err(|_| Error::Config(format!("{env_name} must be an integer > 0")))?;
    if parsed == 0 {
        return Err(Error::Config(format!("{env_name} must be an integer > 0")));
    }
    Ok(parsed)
}

fn parse_port(raw: &str) -> Result<u16, Error> {
    raw.trim()
        .parse::<u16>()
        .map_err(|_| Error::Config("PORT must be a valid TCP port".into()))
}

fn validate_config(config: &GatewayConfig) -> Result<(), Error> {
    let mut issues: Vec<String> = Vec::new();

    if config.base_url.trim().is_empty() {
        issues.push("base_url must not be empty".into());
    }

    if config.provider.batch_size == 0 {
        issues.push("provider.batch_size must be > 0".into());
    }
    if config.provider.timeout_secs == 0 {
        issues.push("provider.timeout_secs must be > 0".into());
    }
    if config.provider.requests_per_second == 0 {
        issues.push("provider.requests_per_second must be > 0".into());
    }

    if config.cache.ttl_secs == 0 {
        issues.push("cache.ttl_secs must be > 0".into());
    }
    if config.cache.sweep_interval_secs == 0 {
        issues.push("cache.sweep_interval_secs must be > 0".into());
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "Invalid config:\n - {}",
            issues.join("\n - ")
        )))
    }
}

/// Load gateway configuration from environment and optional config file.
pub fn load_config() -> Result<GatewayConfig, Error> {
    // 1. Load .env file from project root or parent directories.
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {}", e);
    }

    // 2. Start with defaults.
    let mut config = GatewayConfig::default();

    // 3. Try loading config.toml if it exists.
    let config_path = Path::new("config.toml");
    if config_path.exists() {
        let contents = std::fs::read_to_string(config_path)
            .map_err(|e| Error::Config(format!("Failed to read config.toml: {}", e)))?;
        config = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config.toml: {}", e)))?;
    }

    // 4. Override with environment variables (highest priority).
    if let Ok(token) = std::env::var("CRONOFY_ACCESS_TOKEN") {
        config.access_token = token;
    }
    if let Ok(url) = std::env::var("CRONOFY_BASE_URL") {
        if !url.trim().is_empty() {
            config.base_url = url.trim().to_string();
        }
    }
    if let Ok(port) = std::env::var("PORT") {
        config.port = parse_port(&port)?;
    }
    if let Ok(ttl) = std::env::var("AVAILABILITY_CACHE_TTL_SECS") {
        config.cache.ttl_secs = parse_positive_u64(&ttl, "AVAILABILITY_CACHE_TTL_SECS")?;
    }

    // 5. Validate required fields.
    if config.access_token.trim().is_empty() {
        return Err(Error::Config(
            "CRONOFY_ACCESS_TOKEN is required (set in .env or environment)".into(),
        ));
    }

    validate_config(&config)?;

    Ok(config)
}
