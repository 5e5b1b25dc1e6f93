//! Unified error type for the availability gateway.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Transport-level failure talking to the provider (connect, TLS, decode).
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Missing or invalid configuration detected before any work is done.
    #[error("Config error: {0}")]
    Config(String),

    /// Non-2xx reply from the Cronofy API, with a truncated response body.
    #[error("Cronofy API error (status={status}): {body}")]
    CronofyApi { status: u16, body: String },

    /// The provider did not answer within the request deadline.
    #[error("Cronofy request timed out")]
    Timeout,
}
