use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

use super::parser::parse_feed;
use super::{Feed, FeedSource, FetchError};

/// Identifiers starting with this prefix are served from fixture files.
pub const MOCK_PREFIX: &str = "/mock/";

/// Serves feeds from XML files in a local directory.
///
/// `/mock/36kr_newsflashes_rss.xml` maps to `<dir>/36kr_newsflashes_rss.xml`.
/// Used for offline runs and replaying a known feed.
#[derive(Debug, Clone)]
pub struct FixtureFeedSource {
    dir: PathBuf,
}

impl FixtureFeedSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Maps an identifier to a file inside the fixture directory.
    ///
    /// Rejects anything that would escape the directory (`..`, absolute paths).
    pub fn path_for(&self, identifier: &str) -> Result<PathBuf, FetchError> {
        let name = identifier.strip_prefix(MOCK_PREFIX).unwrap_or(identifier);
        let relative = Path::new(name);
        let is_contained = !name.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !is_contained {
            return Err(FetchError::InvalidIdentifier(identifier.to_string()));
        }
        Ok(self.dir.join(relative))
    }
}

#[async_trait]
impl FeedSource for FixtureFeedSource {
    async fn fetch(&self, identifier: &str) -> Result<Feed, FetchError> {
        let path = self.path_for(identifier)?;
        tracing::info!(feed = %identifier, path = %path.display(), "Reading fixture feed");

        let bytes = tokio::fs::read(&path).await?;
        parse_feed(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_for_strips_prefix() {
        let src = FixtureFeedSource::new("/srv/mock");
        assert_eq!(
            src.path_for("/mock/36kr.xml").unwrap(),
            PathBuf::from("/srv/mock/36kr.xml")
        );
    }

    #[test]
    fn test_path_for_rejects_traversal() {
        let src = FixtureFeedSource::new("/srv/mock");
        assert!(src.path_for("/mock/../secret.xml").is_err());
        assert!(src.path_for("/mock/").is_err());
    }

    #[tokio::test]
    async fn test_fetch_reads_and_parses_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("sample.xml"),
            r#"<?xml version="1.0"?><rss version="2.0"><channel><title>Fixture</title>
<item><title>One</title><link>https://example.com/1</link></item></channel></rss>"#,
        )
        .unwrap();

        let src = FixtureFeedSource::new(dir.path());
        let feed = src.fetch("/mock/sample.xml").await.unwrap();
        assert_eq!(feed.title.as_deref(), Some("Fixture"));
        assert_eq!(feed.items.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let src = FixtureFeedSource::new(dir.path());
        let result = src.fetch("/mock/missing.xml").await;
        assert!(matches!(result, Err(FetchError::Io(_))));
    }
}
