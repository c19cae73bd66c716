//! Outbound message delivery.
//!
//! [`OutboundSink`] is the single seam between the dispatcher and the
//! messaging transport. Two implementations exist:
//!
//! - [`TelegramSink`] - posts to the Telegram Bot API `sendMessage` method
//! - [`LogSink`] - writes the would-be message to the log (simulate mode)
//!
//! The implementation is picked once at startup and shared as
//! `Arc<dyn OutboundSink>`.

mod log;
mod telegram;

use async_trait::async_trait;
use thiserror::Error;

pub use self::log::LogSink;
pub use telegram::{TelegramSink, TELEGRAM_MAX_MESSAGE_CHARS};

/// Markup the transport should apply to the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageFormat {
    Plain,
    Markdown,
    Html,
}

impl MessageFormat {
    /// The Telegram `parse_mode` value, if any.
    pub fn parse_mode(self) -> Option<&'static str> {
        match self {
            MessageFormat::Plain => None,
            MessageFormat::Markdown => Some("Markdown"),
            MessageFormat::Html => Some("HTML"),
        }
    }
}

/// Errors that can occur while delivering one message.
#[derive(Debug, Error)]
pub enum SendError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {status}: {description}")]
    HttpStatus { status: u16, description: String },
    /// The API answered 2xx but reported failure
    #[error("API rejected message: {0}")]
    Api(String),
    /// Text exceeds the transport's hard limit; nothing was sent
    #[error("Message too long: {len} characters (max {max})")]
    TooLong { len: usize, max: usize },
}

/// Delivers one message to a channel.
#[async_trait]
pub trait OutboundSink: Send + Sync {
    async fn send(&self, channel_id: &str, text: &str, format: MessageFormat)
        -> Result<(), SendError>;
}
