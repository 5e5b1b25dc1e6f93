//! Authenticated REST client for the Cronofy availability endpoint.

use std::time::Duration;

use async_trait::async_trait;
use common::types::{AvailabilityQuery, AvailabilityResponse};
use common::{Error, Member, Result};
use tracing::debug;

use crate::enrich::enrich_response;
use crate::rate_limit::RateLimiter;

/// Default Cronofy data centre. The deployments this gateway fronts live in
/// the AU region; override with `CRONOFY_BASE_URL` for other regions.
pub const DEFAULT_BASE_URL: &str = "https://api-au.cronofy.com";

const AVAILABILITY_PATH: &str = "/v1/availability";

/// Seam between the aggregation engine and the provider transport. Lets the
/// engine be driven by a stub in tests and keeps all HTTP concerns here.
#[async_trait]
pub trait AvailabilityProvider: Send + Sync {
    /// Execute one availability query and enrich the result against
    /// `original_members` (the batch the query was built from).
    async fn fetch_availability(
        &self,
        query: &AvailabilityQuery,
        original_members: &[Member],
    ) -> Result<AvailabilityResponse>;
}

/// Async client for the Cronofy availability API.
#[derive(Debug, Clone)]
pub struct CronofyClient {
    client: reqwest::Client,
    access_token: String,
    base_url: String,
    limiter: RateLimiter,
}

impl CronofyClient {
    /// Create a new client.
    ///
    /// Fails when the access token is empty, so a misconfigured process can
    /// never issue a provider call.
    pub fn new(
        access_token: &str,
        base_url: &str,
        timeout: Duration,
        limiter: RateLimiter,
    ) -> Result<Self> {
        let access_token = access_token.trim();
        if access_token.is_empty() {
            return Err(Error::Config(
                "CRONOFY_ACCESS_TOKEN is required (set in .env or environment)".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(4)
            .tcp_keepalive(Duration::from_secs(30))
            .timeout(timeout)
            .build()
            .expect("failed to build reqwest client");

        Ok(Self {
            client,
            access_token: access_token.to_string(),
            base_url: normalize_base_url(base_url),
            limiter,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl AvailabilityProvider for CronofyClient {
    async fn fetch_availability(
        &self,
        query: &AvailabilityQuery,
        original_members: &[Member],
    ) -> Result<AvailabilityResponse> {
        self.limiter.acquire().await;

        let response = self
            .client
            .post(self.url(AVAILABILITY_PATH))
            .bearer_auth(&self.access_token)
            .json(query)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout
                } else {
                    Error::Http(format_reqwest_error(&e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::CronofyApi {
                status: status.as_u16(),
                body: summarize_response_body(&body),
            });
        }

        let raw_body = response
            .text()
            .await
            .map_err(|e| Error::Http(format_reqwest_error(&e)))?;
        let parsed: AvailabilityResponse = serde_json::from_str(&raw_body).map_err(|e| {
            Error::Http(format!(
                "error decoding availability response: {}; body={}",
                e,
                summarize_response_body(&raw_body)
            ))
        })?;

        let enriched = enrich_response(parsed, original_members);
        debug!(
            "Fetched {} slot(s) for a batch of {} member(s)",
            enriched.available_slots.as_ref().map_or(0, |s| s.len()),
            original_members.len()
        );
        Ok(enriched)
    }
}

fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        DEFAULT_BASE_URL.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Render a reqwest error with its source chain; the top-level display alone
/// usually hides the interesting connect/TLS cause.
fn format_reqwest_error(err: &reqwest::Error) -> String {
    let mut out = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        out.push_str(&format!("; caused by: {}", cause));
        source = cause.source();
    }
    out
}

/// Trim a response body down to something loggable.
fn summarize_response_body(raw: &str) -> String {
    const MAX_LEN: usize = 800;
    let trimmed = raw.trim();
    if trimmed.len() <= MAX_LEN {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(MAX_LEN).collect();
        format!("{}... ({} bytes total)", cut, trimmed.len())
    }
}
