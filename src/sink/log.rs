use async_trait::async_trait;

use super::{MessageFormat, OutboundSink, SendError};

/// Logs messages instead of sending them.
#[derive(Debug, Clone, Default)]
pub struct LogSink;

#[async_trait]
impl OutboundSink for LogSink {
    async fn send(
        &self,
        channel_id: &str,
        text: &str,
        format: MessageFormat,
    ) -> Result<(), SendError> {
        tracing::info!(
            channel = %channel_id,
            format = ?format,
            chars = text.chars().count(),
            "[SIMULATE] Message not actually sent:\n{}",
            text
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_sink_always_succeeds() {
        let sink = LogSink;
        let long = "x".repeat(10_000);
        assert!(sink.send("42", &long, MessageFormat::Html).await.is_ok());
    }
}
