use feed_rs::parser;

use super::{Feed, FeedItem, FetchError};
use crate::util::{collapse_whitespace, html_to_text, strip_control_chars};

/// Parses RSS/Atom bytes into a normalized [`Feed`].
///
/// Entries whose title is empty after trimming are dropped: they can be
/// neither deduplicated nor displayed. The published timestamp prefers the
/// entry's `published` field and falls back to `updated`. The excerpt is the
/// summary (or, failing that, the content body) reduced to plain text.
pub fn parse_feed(bytes: &[u8]) -> Result<Feed, FetchError> {
    let parsed = parser::parse(bytes).map_err(|e| FetchError::Parse(e.to_string()))?;

    let total = parsed.entries.len();
    let items: Vec<FeedItem> = parsed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let title = entry
                .title
                .map(|t| strip_control_chars(t.content.trim()).into_owned())
                .unwrap_or_default();
            if title.is_empty() {
                return None;
            }

            let link = entry
                .links
                .first()
                .map(|l| strip_control_chars(l.href.trim()).into_owned())
                .unwrap_or_default();
            let published_at = entry.published.or(entry.updated);
            let excerpt = entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body))
                .map(|raw| collapse_whitespace(&html_to_text(&raw)).into_owned())
                .filter(|s| !s.is_empty());

            Some(FeedItem {
                title,
                link,
                published_at,
                excerpt,
            })
        })
        .collect();

    let skipped = total - items.len();
    if skipped > 0 {
        tracing::debug!(skipped = skipped, "Entries without a title dropped");
    }

    Ok(Feed {
        title: parsed
            .title
            .map(|t| t.content.trim().to_string())
            .filter(|t| !t.is_empty()),
        link: parsed.links.first().map(|l| l.href.clone()),
        items,
    })
}
