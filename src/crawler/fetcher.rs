//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with proper user agent strings
//! - GET requests with a bounded timeout
//! - Retry with exponential backoff for transient failures
//! - Honouring server-supplied `Retry-After` hints
//! - Separating definitive "not found" answers from failures

use crate::config::{Config, RetryConfig, UserAgentConfig};
use crate::extract::Document;
use chrono::{DateTime, Utc};
use reqwest::header::RETRY_AFTER;
use reqwest::{redirect::Policy, Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Result of a fetch that reached a definitive answer
#[derive(Debug)]
pub enum FetchOutcome {
    /// The page was served and parsed
    Document(Document),

    /// The server answered 404 (or 410); retrying will not help
    NotFound,
}

/// One failed attempt that is worth retrying
#[derive(Debug, Error)]
pub enum TransientFailure {
    /// Non-success status other than not-found
    #[error("HTTP {status}")]
    Status {
        status: u16,
        /// Raw `Retry-After` header value, if the server sent one
        retry_after: Option<String>,
    },

    /// Connection failure, timeout, or broken body
    #[error("{0}")]
    Transport(#[source] reqwest::Error),
}

impl TransientFailure {
    fn retry_after(&self) -> Option<&str> {
        match self {
            Self::Status { retry_after, .. } => retry_after.as_deref(),
            Self::Transport(_) => None,
        }
    }
}

/// Errors returned by [`Fetcher::fetch`]
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Giving up on {url} after {attempts} attempts: {last}")]
    Exhausted {
        url: String,
        attempts: u32,
        #[source]
        last: TransientFailure,
    },

    #[error("Cannot request {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Exponential backoff schedule for fetch retries
///
/// The wait before retry `n` (n failed attempts so far, starting at 1) is
/// `multiplier * 2^(n-1)`, clamped to `[min_backoff, max_backoff]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub min_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: u64,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            min_backoff: Duration::from_secs(config.min_backoff_secs),
            max_backoff: Duration::from_secs(config.max_backoff_secs),
            multiplier: config.backoff_multiplier,
        }
    }

    /// Computed wait after `failed_attempts` failures
    pub fn backoff(&self, failed_attempts: u32) -> Duration {
        let exponent = failed_attempts.saturating_sub(1);
        let factor = 1u64.checked_shl(exponent).unwrap_or(u64::MAX);
        let secs = self.multiplier.saturating_mul(factor);

        Duration::from_secs(secs)
            .max(self.min_backoff)
            .min(self.max_backoff)
    }

    /// Wait before the next attempt
    ///
    /// A parseable `Retry-After` value replaces the computed backoff.
    pub fn delay_before_retry(
        &self,
        failed_attempts: u32,
        retry_after: Option<&str>,
        now: DateTime<Utc>,
    ) -> Duration {
        retry_after
            .and_then(|value| parse_retry_after(value, now))
            .unwrap_or_else(|| self.backoff(failed_attempts))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Parses a `Retry-After` header value
///
/// Accepts delay-seconds (`120`) or an HTTP-date
/// (`Wed, 21 Oct 2015 07:28:00 GMT`). Dates in the past yield zero.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();

    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let at = DateTime::parse_from_rfc2822(value).ok()?;
    let wait = at.with_timezone(&Utc) - now;
    Some(wait.to_std().unwrap_or(Duration::ZERO))
}

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use archive_harvest::config::UserAgentConfig;
/// use archive_harvest::crawler::build_http_client;
/// use std::time::Duration;
///
/// let client = build_http_client(&UserAgentConfig::default(), Duration::from_secs(60)).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches archive pages with retry and backoff
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    policy: RetryPolicy,
}

impl Fetcher {
    pub fn new(client: Client, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    /// Builds a fetcher from the crawler and retry configuration
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let client = build_http_client(&config.user_agent, config.crawler.request_timeout())?;
        Ok(Self::new(client, RetryPolicy::from_config(&config.retry)))
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetches `url`, retrying transient failures
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | HTTP 2xx | Parse and return the document |
    /// | HTTP 404 / 410 | Return `NotFound`, no retry |
    /// | Other HTTP status | Retry, honouring `Retry-After` |
    /// | Timeout / connection / body error | Retry |
    ///
    /// There is no wait before the first attempt. After `max_attempts`
    /// failures the last failure is returned inside `FetchError::Exhausted`.
    pub async fn fetch(&self, url: &str) -> Result<FetchOutcome, FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let mut attempt = 1;
        loop {
            let failure = match self.attempt(&parsed).await {
                Ok(FetchOutcome::NotFound) => {
                    tracing::warn!(url, attempt, outcome = "not_found", "Page not found");
                    return Ok(FetchOutcome::NotFound);
                }
                Ok(outcome) => {
                    tracing::info!(url, attempt, outcome = "fetched", "Fetched page");
                    return Ok(outcome);
                }
                Err(failure) => failure,
            };

            if attempt >= self.policy.max_attempts {
                tracing::error!(
                    url,
                    attempt,
                    outcome = "exhausted",
                    error = %failure,
                    "Fetch failed, no attempts left"
                );
                return Err(FetchError::Exhausted {
                    url: url.to_string(),
                    attempts: attempt,
                    last: failure,
                });
            }

            let hint = failure.retry_after();
            let wait = self.policy.delay_before_retry(attempt, hint, Utc::now());
            tracing::warn!(
                url,
                attempt,
                outcome = "retry",
                error = %failure,
                retry_after = hint.unwrap_or(""),
                wait_secs = wait.as_secs_f64(),
                "Fetch failed, retrying"
            );

            tokio::time::sleep(wait).await;
            attempt += 1;
        }
    }

    /// Performs a single GET
    async fn attempt(&self, url: &Url) -> Result<FetchOutcome, TransientFailure> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(TransientFailure::Transport)?;

        let status = response.status();

        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return Ok(FetchOutcome::NotFound);
        }

        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            return Err(TransientFailure::Status {
                status: status.as_u16(),
                retry_after,
            });
        }

        let final_url = response.url().clone();
        let body = response.text().await.map_err(TransientFailure::Transport)?;

        Ok(FetchOutcome::Document(Document::parse(final_url, &body)))
    }
}
