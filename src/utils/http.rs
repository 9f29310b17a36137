// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use reqwest::{Client, StatusCode};

use crate::error::{AppError, Result};
use crate::models::CrawlerConfig;

/// Retry schedule for page loads: `max_retries` extra attempts, waiting
/// `backoff * attempt` between them.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff * attempt
    }
}

/// Create a configured asynchronous HTTP client.
pub fn create_client(config: &CrawlerConfig) -> Result<Client> {
    let client = Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Statuses worth another attempt: server errors and rate limiting.
fn retryable_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

/// Transport failures have no status and are always retried.
fn is_retryable(err: &reqwest::Error) -> bool {
    err.status().is_none_or(retryable_status)
}

/// Fetch a page body, retrying transport failures, server errors and 429.
///
/// Returns the raw text; callers parse it synchronously so no `scraper::Html`
/// is held across an await point.
pub async fn fetch_text(client: &Client, url: &str, retry: RetryPolicy) -> Result<String> {
    let mut attempt = 0;
    loop {
        let result = async {
            client
                .get(url)
                .send()
                .await?
                .error_for_status()?
                .text()
                .await
        }
        .await;

        match result {
            Ok(text) => return Ok(text),
            Err(e) if attempt < retry.max_retries && is_retryable(&e) => {
                attempt += 1;
                let delay = retry.delay_for(attempt);
                log::warn!(
                    "Request to {} failed ({}), retry {}/{} in {:?}",
                    url,
                    e,
                    attempt,
                    retry.max_retries,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(AppError::navigation(url, e)),
        }
    }
}
