//! Builds Telegram-ready HTML messages from new feed items.
//!
//! One message per feed per cycle: a bold header naming the feed and the
//! number of new items, then a numbered entry per item with its title,
//! a short excerpt and the link. Messages longer than the size bound are
//! split on line boundaries into chunks that are sent in order.

use crate::feed::{Feed, FeedItem};
use crate::util::clean_excerpt;

/// Default chunk size, safely under Telegram's 4096-character hard limit.
pub const DEFAULT_SIZE_BOUND: usize = 4000;
/// Characters of excerpt kept per item.
pub const EXCERPT_CHARS: usize = 100;
/// Header label when a feed has neither a title nor a link.
pub const UNKNOWN_SOURCE: &str = "Unknown source";

/// One transport-bounded piece of a composed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageChunk {
    pub text: String,
    pub size_bound: usize,
}

/// Escapes the five HTML-reserved characters (`& < > " '`).
pub fn escape_html(text: &str) -> String {
    html_escape::encode_quoted_attribute(text).into_owned()
}

#[derive(Debug, Clone)]
pub struct MessageComposer {
    size_bound: usize,
}

impl Default for MessageComposer {
    fn default() -> Self {
        Self::new(DEFAULT_SIZE_BOUND)
    }
}

impl MessageComposer {
    pub fn new(size_bound: usize) -> Self {
        Self { size_bound }
    }

    pub fn size_bound(&self) -> usize {
        self.size_bound
    }

    /// Composes the full message for `items` without splitting it.
    ///
    /// Titles and excerpts are escaped; links are embedded verbatim.
    pub fn render(&self, feed: &Feed, items: &[FeedItem]) -> String {
        let source = feed
            .title
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| feed.link.as_deref().filter(|s| !s.is_empty()))
            .unwrap_or(UNKNOWN_SOURCE);

        let mut message = format!(
            "<b>{} - {} new items</b>\n\n",
            escape_html(source),
            items.len()
        );

        for (index, item) in items.iter().enumerate() {
            let excerpt = item
                .excerpt
                .as_deref()
                .map(|e| clean_excerpt(e, EXCERPT_CHARS))
                .unwrap_or_default();

            message.push_str(&format!(
                "{}. <b>{}</b>\n{}\n{}\n\n",
                index + 1,
                escape_html(&item.title),
                escape_html(&excerpt),
                item.link
            ));
        }

        message
    }

    /// Composes and splits the message for `items`.
    ///
    /// Returns no chunks when `items` is empty.
    pub fn build(&self, feed: &Feed, items: &[FeedItem]) -> Vec<MessageChunk> {
        if items.is_empty() {
            return Vec::new();
        }

        let message = self.render(feed, items);
        split_message(&message, self.size_bound)
            .into_iter()
            .map(|text| MessageChunk {
                text,
                size_bound: self.size_bound,
            })
            .collect()
    }
}

/// Splits `message` into pieces of at most `max_chars` characters, breaking
/// only between lines.
///
/// Each line keeps its trailing newline, so concatenating the pieces gives
/// back `message` exactly. A single line longer than `max_chars` becomes its
/// own oversized piece.
pub fn split_message(message: &str, max_chars: usize) -> Vec<String> {
    if message.chars().count() <= max_chars {
        return vec![message.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for line in message.split_inclusive('\n') {
        let line_len = line.chars().count();
        if current_len + line_len > max_chars && current_len > 0 {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        current.push_str(line);
        current_len += line_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn feed(title: Option<&str>, link: Option<&str>) -> Feed {
        Feed {
            title: title.map(str::to_string),
            link: link.map(str::to_string),
            items: Vec::new(),
        }
    }

    fn item(title: &str, excerpt: Option<&str>) -> FeedItem {
        FeedItem {
            title: title.to_string(),
            link: format!("https://example.com/{}", title.len()),
            published_at: None,
            excerpt: excerpt.map(str::to_string),
        }
    }

    #[test]
    fn test_empty_items_yield_no_chunks() {
        let composer = MessageComposer::default();
        assert!(composer.build(&feed(Some("F"), None), &[]).is_empty());
    }

    #[test]
    fn test_render_layout() {
        let composer = MessageComposer::default();
        let items = vec![
            item("First", Some("  Some\n\n body  ")),
            item("Second", None),
        ];
        let text = composer.render(&feed(Some("News"), None), &items);
        assert_eq!(
            text,
            "<b>News - 2 new items</b>\n\n\
             1. <b>First</b>\nSome body\nhttps://example.com/5\n\n\
             2. <b>Second</b>\n\nhttps://example.com/6\n\n"
        );
    }

    #[test]
    fn test_header_fallbacks() {
        let composer = MessageComposer::default();
        let items = vec![item("x", None)];

        let text = composer.render(&feed(None, Some("https://feed.example")), &items);
        assert!(text.starts_with("<b>https://feed.example - 1 new items</b>"));

        let text = composer.render(&feed(Some(""), Some("https://feed.example")), &items);
        assert!(text.starts_with("<b>https://feed.example - 1 new items</b>"));

        let text = composer.render(&feed(None, None), &items);
        assert!(text.starts_with("<b>Unknown source - 1 new items</b>"));

        let text = composer.render(&feed(Some(""), Some("")), &items);
        assert!(text.starts_with("<b>Unknown source - 1 new items</b>"));
    }

    #[test]
    fn test_title_escaped_exactly_once() {
        let composer = MessageComposer::default();
        let items = vec![item("<b>bold</b> & \"quoted\" it's", None)];
        let text = composer.render(&feed(Some("F"), None), &items);

        assert!(text.contains("&lt;b&gt;bold&lt;/b&gt; &amp; &quot;quoted&quot;"));
        assert!(!text.contains("&amp;lt;"), "double escaped");
        assert!(!text.contains("it's"), "apostrophe left unescaped");
    }

    #[test]
    fn test_excerpt_truncated_then_escaped() {
        let composer = MessageComposer::default();
        let long = format!("{}<tail>", "a".repeat(100));
        let text = composer.render(&feed(Some("F"), None), &[item("t", Some(&long))]);
        assert!(text.contains(&format!("\n{}...\n", "a".repeat(100))));
        assert!(!text.contains("tail"));

        // Short excerpts get no ellipsis
        let text = composer.render(&feed(Some("F"), None), &[item("t", Some("a < b"))]);
        assert!(text.contains("\na &lt; b\n"));
    }

    #[test]
    fn test_links_not_escaped() {
        let composer = MessageComposer::default();
        let mut it = item("t", None);
        it.link = "https://example.com/?a=1&b=2".to_string();
        let text = composer.render(&feed(Some("F"), None), &[it]);
        assert!(text.contains("\nhttps://example.com/?a=1&b=2\n"));
    }

    #[test]
    fn test_short_message_is_single_chunk() {
        let composer = MessageComposer::default();
        let chunks = composer.build(&feed(Some("F"), None), &[item("t", None)]);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].size_bound, DEFAULT_SIZE_BOUND);
    }

    #[test]
    fn test_split_9000_chars_of_even_lines() {
        // 100 lines of 89 chars + newline = 9000 chars
        let line = format!("{}\n", "x".repeat(89));
        let message = line.repeat(100);
        assert_eq!(message.chars().count(), 9000);

        let chunks = split_message(&message, 4000);
        assert!(chunks.len() >= 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 4000));
        assert_eq!(chunks.concat(), message);
    }

    #[test]
    fn test_oversized_line_kept_whole() {
        let message = format!("short\n{}\nend\n", "y".repeat(50));
        let chunks = split_message(&message, 20);
        assert_eq!(chunks, vec!["short\n".to_string(), format!("{}\n", "y".repeat(50)), "end\n".to_string()]);
    }

    proptest! {
        #[test]
        fn prop_split_concatenates_back(
            lines in proptest::collection::vec("[a-z <>&]{0,60}", 0..80),
            max in 20usize..400,
        ) {
            let message: String = lines.iter().map(|l| format!("{l}\n")).collect();
            let chunks = split_message(&message, max);
            prop_assert_eq!(chunks.concat(), message);
        }

        #[test]
        fn prop_chunks_respect_bound_when_lines_fit(
            lines in proptest::collection::vec("[a-zé]{0,30}", 1..120),
            max in 40usize..500,
        ) {
            let message: String = lines.iter().map(|l| format!("{l}\n")).collect();
            let chunks = split_message(&message, max);
            prop_assert!(chunks.iter().all(|c| c.chars().count() <= max));
            prop_assert!(chunks.iter().all(|c| !c.is_empty()));
        }
    }

    #[test]
    fn test_build_splits_many_items() {
        let composer = MessageComposer::new(500);
        let items: Vec<FeedItem> = (0..40)
            .map(|n| item(&format!("Item number {n}"), Some(&"word ".repeat(30))))
            .collect();
        let chunks = composer.build(&feed(Some("Big"), None), &items);

        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.text.chars().count() <= 500));
        let joined: String = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(joined, composer.render(&feed(Some("Big"), None), &items));
    }
}
