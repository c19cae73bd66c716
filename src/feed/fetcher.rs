use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;
use url::Url;

use super::parser::parse_feed;
use super::{Feed, FeedSource, FetchError};

const MAX_RETRIES: u32 = 3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Fetches feeds over HTTP.
///
/// Identifiers that are absolute `http://` or `https://` URLs are requested
/// as-is; anything else is treated as a path on the configured base URL (the
/// RSSHub instance), e.g. `/36kr/newsflashes`.
///
/// # Behavior
///
/// - Each attempt, body included, has a 10-second timeout
/// - Timeouts, connection errors, 429 and 5xx responses are retried up to 3
///   times with exponential backoff (1s, 2s, 4s)
/// - Other non-2xx responses fail immediately
/// - Response bodies are limited to 10MB
#[derive(Clone)]
pub struct HttpFeedSource {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    max_retries: u32,
    backoff_base: Duration,
}

impl HttpFeedSource {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            timeout: REQUEST_TIMEOUT,
            max_retries: MAX_RETRIES,
            backoff_base: Duration::from_secs(1),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Base delay for the exponential backoff between attempts.
    pub fn with_backoff(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    /// Resolves an identifier to the URL that will be requested.
    pub fn resolve(&self, identifier: &str) -> Result<Url, FetchError> {
        let raw = if identifier.starts_with("https://") || identifier.starts_with("http://") {
            identifier.to_string()
        } else {
            format!("{}{}", self.base_url, identifier)
        };
        Url::parse(&raw).map_err(|_| FetchError::InvalidIdentifier(identifier.to_string()))
    }

    fn backoff(&self, retry: u32) -> Duration {
        self.backoff_base.saturating_mul(2u32.saturating_pow(retry))
    }

    /// One request, headers and body, with no retry.
    async fn attempt(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }
        read_limited_bytes(response, MAX_FEED_SIZE).await
    }

    async fn fetch_bytes(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        let mut retry_count = 0;

        loop {
            // Deadline covers headers and body
            let failure = match tokio::time::timeout(self.timeout, self.attempt(url)).await {
                Err(_) => FetchError::Timeout(retry_count + 1),
                Ok(Ok(bytes)) => return Ok(bytes),
                Ok(Err(e)) if is_retryable(&e) => e,
                // 4xx errors and oversized bodies fail immediately
                Ok(Err(e)) => return Err(e),
            };

            if retry_count >= self.max_retries {
                return Err(failure);
            }

            let delay = self.backoff(retry_count);
            tracing::warn!(
                url = %url,
                error = %failure,
                retry = retry_count + 1,
                delay_ms = delay.as_millis() as u64,
                "Feed request failed, retrying after delay"
            );
            tokio::time::sleep(delay).await;
            retry_count += 1;
        }
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch(&self, identifier: &str) -> Result<Feed, FetchError> {
        let url = self.resolve(identifier)?;
        tracing::info!(feed = %identifier, url = %url, "Fetching feed");

        let bytes = self.fetch_bytes(&url).await?;
        let feed = parse_feed(&bytes)?;

        tracing::debug!(feed = %identifier, items = feed.items.len(), "Feed parsed");
        Ok(feed)
    }
}

fn is_retryable(error: &FetchError) -> bool {
    match error {
        FetchError::Network(_) | FetchError::Timeout(_) => true,
        FetchError::HttpStatus(status) => *status == 429 || (500..600).contains(status),
        _ => false,
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
