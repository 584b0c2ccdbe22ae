//! HTTP fetch layer wrapping reqwest.
//!
//! Two operations: GET-JSON and GET-bytes, both with a fixed per-attempt
//! timeout and a fixed-interval bounded retry. 404 is not an error here, it
//! is an absence result (`Ok(None)`) and never consumes a retry attempt.
//! 429 sleeps until the advertised reset without consuming an attempt.

use crate::config::{self, REQUEST_TIMEOUT, RETRY_INTERVAL, RETRY_TIMES};
use chrono::Utc;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Terminal failure of a fetch after the retry budget is exhausted.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request timed out: {url}")]
    Timeout { url: String },

    #[error("transport failure for {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("rate limited by the API (reset at unix {reset:?})")]
    RateLimited { reset: Option<i64> },
}

/// Absence-aware fetch result: `Ok(None)` means the resource does not exist.
pub type FetchResult<T> = Result<Option<T>, FetchError>;

/// Shared HTTP client carrying the optional bearer token.
///
/// Cheap to clone; the underlying `reqwest::Client` is an `Arc` internally.
#[derive(Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    token: Option<String>,
    retry_times: u32,
    retry_interval: Duration,
}

impl Fetcher {
    pub fn new(token: Option<String>) -> Result<Self, reqwest::Error> {
        Self::with_policy(token, RETRY_TIMES, RETRY_INTERVAL)
    }

    /// Build a fetcher with an explicit retry policy. The production policy
    /// is fixed; this exists so tests do not sleep through real intervals.
    pub fn with_policy(
        token: Option<String>,
        retry_times: u32,
        retry_interval: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(format!("GitHubManifest/{}", config::VERSION))
            .build()?;
        Ok(Self {
            client,
            token,
            retry_times,
            retry_interval,
        })
    }

    /// GET a URL and decode the body as JSON. The bearer token is attached:
    /// API endpoints are authenticated, unlike the raw CDN.
    ///
    /// A 2xx body that fails to decode is reported as absence, not retried.
    pub async fn get_json(&self, url: &str) -> FetchResult<Value> {
        let Some(body) = self.get_raw(url, true).await? else {
            return Ok(None);
        };
        match serde_json::from_slice(&body) {
            Ok(v) => Ok(Some(v)),
            Err(e) => {
                warn!("bad JSON body from {url}: {e}");
                Ok(None)
            }
        }
    }

    /// GET a URL and return the raw body. No auth header: raw content is
    /// served off the CDN, which does not take API tokens.
    pub async fn get_bytes(&self, url: &str) -> FetchResult<Vec<u8>> {
        self.get_raw(url, false).await
    }

    async fn get_raw(&self, url: &str, auth: bool) -> FetchResult<Vec<u8>> {
        let mut attempts = 0u32;
        let mut limit_waits = 0u32;
        loop {
            debug!("requesting {url}");
            let err = match self.send(url, auth).await {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if status == 404 {
                        debug!("resource not found: {url}");
                        return Ok(None);
                    }
                    if status == 429 {
                        let reset = resp
                            .headers()
                            .get("X-RateLimit-Reset")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|s| s.parse::<i64>().ok());
                        limit_waits += 1;
                        if limit_waits > self.retry_times {
                            return Err(FetchError::RateLimited { reset });
                        }
                        // Sleep through to the reset instead of burning
                        // retry attempts on a limiter that will not relent.
                        let wait = reset
                            .map(|r| r - Utc::now().timestamp())
                            .unwrap_or(self.retry_interval.as_secs().max(1) as i64)
                            .clamp(1, 900) as u64;
                        warn!("rate limit hit on {url}, sleeping {wait}s until reset");
                        tokio::time::sleep(Duration::from_secs(wait)).await;
                        continue;
                    }
                    if resp.status().is_success() {
                        match resp.bytes().await {
                            Ok(b) => {
                                debug!("received {} bytes from {url}", b.len());
                                return Ok(Some(b.to_vec()));
                            }
                            Err(e) => {
                                warn!("body read failed for {url}: {e}");
                                FetchError::Transport {
                                    url: url.to_string(),
                                    source: e,
                                }
                            }
                        }
                    } else {
                        warn!("HTTP {status} from {url}");
                        FetchError::Status {
                            status,
                            url: url.to_string(),
                        }
                    }
                }
                Err(e) if e.is_timeout() => {
                    warn!("request timed out: {url}");
                    FetchError::Timeout {
                        url: url.to_string(),
                    }
                }
                Err(e) => {
                    warn!("request failed: {e} - {url}");
                    FetchError::Transport {
                        url: url.to_string(),
                        source: e,
                    }
                }
            };
            attempts += 1;
            if attempts >= self.retry_times {
                return Err(err);
            }
            tokio::time::sleep(self.retry_interval).await;
        }
    }

    async fn send(&self, url: &str, auth: bool) -> Result<reqwest::Response, reqwest::Error> {
        let mut req = self.client.get(url);
        if auth {
            if let Some(token) = &self.token {
                req = req.bearer_auth(token);
            }
        }
        req.send().await
    }
}
