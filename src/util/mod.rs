//! Utility functions for common operations.
//!
//! This module provides reusable text utilities used by the feed parser and
//! the message composer:
//!
//! - **Whitespace**: collapse runs of whitespace for single-line excerpts
//! - **Truncation**: character-aware truncation with an ellipsis
//! - **Sanitizing**: control-character stripping and HTML-to-text conversion
//!
//! # Examples
//!
//! ```
//! use hubrelay::util::{clean_excerpt, strip_control_chars};
//!
//! assert_eq!(clean_excerpt("  Breaking:\n\n  news  ", 100), "Breaking: news");
//! assert_eq!(strip_control_chars("a\u{0}b"), "ab");
//! ```

mod text;

pub use text::{
    clean_excerpt, collapse_whitespace, html_to_text, strip_control_chars, truncate_chars,
};
