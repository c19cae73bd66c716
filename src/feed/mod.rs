//! Feed retrieval for RSS/Atom sources.
//!
//! This module turns a feed identifier into a normalized [`Feed`] snapshot:
//!
//! - **Parsing**: Convert RSS/Atom XML into [`FeedItem`]s, dropping untitled entries
//! - **Fetching**: HTTP retrieval with a per-request timeout and bounded retries
//! - **Fixtures**: Static feeds read from disk for offline runs
//!
//! # Architecture
//!
//! - [`parser`] - Low-level feed parsing using the `feed-rs` crate
//! - [`fetcher`] - [`HttpFeedSource`], network fetching with retry logic
//! - [`fixture`] - [`FixtureFeedSource`], reads `/mock/...` identifiers from a directory
//!
//! Both sources implement [`FeedSource`]. [`FeedRouter`] picks between them by
//! identifier prefix so the rest of the program only sees one source.

mod fetcher;
mod fixture;
mod parser;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub use fetcher::HttpFeedSource;
pub use fixture::{FixtureFeedSource, MOCK_PREFIX};
pub use parser::parse_feed;

/// A single published entry, normalized.
///
/// `title` is never empty; entries without a title are dropped by the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub published_at: Option<DateTime<Utc>>,
    pub excerpt: Option<String>,
}

/// A fetched feed snapshot. Produced fresh on every fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Feed {
    pub title: Option<String>,
    pub link: Option<String>,
    pub items: Vec<FeedItem>,
}

/// Errors that can occur while fetching a feed.
///
/// These errors cover the full lifecycle of a fetch: network issues,
/// HTTP errors, parsing failures, and fixture file problems.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Every attempt exceeded the per-request timeout
    #[error("Request timed out after {0} attempts")]
    Timeout(u32),
    /// Feed XML could not be parsed as RSS or Atom
    #[error("Parse error: {0}")]
    Parse(String),
    /// Response body exceeded the size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Identifier could not be turned into a URL or fixture path
    #[error("Invalid feed identifier '{0}'")]
    InvalidIdentifier(String),
    /// Fixture file could not be read
    #[error("Failed to read fixture: {0}")]
    Io(#[from] std::io::Error),
}

/// Anything that can produce a [`Feed`] from an identifier.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self, identifier: &str) -> Result<Feed, FetchError>;
}

/// Routes `/mock/...` identifiers to fixtures and everything else to the network.
pub struct FeedRouter<N, F> {
    network: N,
    fixtures: F,
}

impl<N: FeedSource, F: FeedSource> FeedRouter<N, F> {
    pub fn new(network: N, fixtures: F) -> Self {
        Self { network, fixtures }
    }

    pub fn is_fixture(identifier: &str) -> bool {
        identifier.starts_with(MOCK_PREFIX)
    }
}

#[async_trait]
impl<N: FeedSource, F: FeedSource> FeedSource for FeedRouter<N, F> {
    async fn fetch(&self, identifier: &str) -> Result<Feed, FetchError> {
        if Self::is_fixture(identifier) {
            tracing::debug!(feed = %identifier, "Routing to fixture source");
            self.fixtures.fetch(identifier).await
        } else {
            self.network.fetch(identifier).await
        }
    }
}
