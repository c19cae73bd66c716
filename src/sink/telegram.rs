use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{MessageFormat, OutboundSink, SendError};

/// Telegram rejects message texts longer than this.
pub const TELEGRAM_MAX_MESSAGE_CHARS: usize = 4096;

const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Sends messages through the Telegram Bot API.
///
/// Proxies are taken from the environment (`HTTPS_PROXY`/`HTTP_PROXY`) by the
/// underlying `reqwest` client.
#[derive(Clone)]
pub struct TelegramSink {
    client: reqwest::Client,
    api_base: String,
    token: SecretString,
    timeout: Duration,
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
}

#[derive(Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

impl TelegramSink {
    pub fn new(client: reqwest::Client, token: SecretString) -> Self {
        Self {
            client,
            api_base: DEFAULT_API_BASE.to_string(),
            token,
            timeout: Duration::from_secs(30),
        }
    }

    /// Points the sink at a different API host (self-hosted Bot API, tests).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.api_base,
            self.token.expose_secret()
        )
    }
}

impl std::fmt::Debug for TelegramSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramSink")
            .field("api_base", &self.api_base)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

#[async_trait]
impl OutboundSink for TelegramSink {
    async fn send(
        &self,
        channel_id: &str,
        text: &str,
        format: MessageFormat,
    ) -> Result<(), SendError> {
        let len = text.chars().count();
        if len > TELEGRAM_MAX_MESSAGE_CHARS {
            return Err(SendError::TooLong {
                len,
                max: TELEGRAM_MAX_MESSAGE_CHARS,
            });
        }

        let body = SendMessageRequest {
            chat_id: channel_id,
            text,
            parse_mode: format.parse_mode(),
        };

        // The endpoint embeds the bot token; keep it out of error messages.
        let response = self
            .client
            .post(self.endpoint())
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| SendError::Network(e.without_url()))?;

        let status = response.status();
        let raw = response
            .text()
            .await
            .map_err(|e| SendError::Network(e.without_url()))?;
        let parsed: Option<ApiResponse> = serde_json::from_str(&raw).ok();

        if !status.is_success() {
            let description = parsed
                .and_then(|r| r.description)
                .unwrap_or_else(|| raw.chars().take(200).collect());
            return Err(SendError::HttpStatus {
                status: status.as_u16(),
                description,
            });
        }

        match parsed {
            Some(r) if r.ok => {
                tracing::debug!(channel = %channel_id, chars = len, "Message sent");
                Ok(())
            }
            Some(r) => Err(SendError::Api(
                r.description.unwrap_or_else(|| "unknown error".to_string()),
            )),
            None => Err(SendError::Api("unreadable response body".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sink(server: &MockServer) -> TelegramSink {
        TelegramSink::new(reqwest::Client::new(), SecretString::from("TEST:TOKEN"))
            .with_api_base(server.uri())
    }

    #[tokio::test]
    async fn test_send_posts_html_message() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTEST:TOKEN/sendMessage"))
            .and(body_json(serde_json::json!({
                "chat_id": "-100123",
                "text": "<b>hi</b>",
                "parse_mode": "HTML"
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true, "result": {}})),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        sink(&mock_server)
            .send("-100123", "<b>hi</b>", MessageFormat::Html)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_plain_format_omits_parse_mode() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_json(serde_json::json!({"chat_id": "1", "text": "hi"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .expect(1)
            .mount(&mock_server)
            .await;

        sink(&mock_server)
            .send("1", "hi", MessageFormat::Plain)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_http_error_carries_description() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: can't parse entities"
            })))
            .mount(&mock_server)
            .await;

        let err = sink(&mock_server)
            .send("1", "<b>broken", MessageFormat::Html)
            .await
            .unwrap_err();
        match err {
            SendError::HttpStatus {
                status: 400,
                description,
            } => assert!(description.contains("can't parse entities")),
            e => panic!("Expected HttpStatus(400), got {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_ok_false_in_success_response_is_api_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": false,
                "description": "Bad Request: chat not found"
            })))
            .mount(&mock_server)
            .await;

        let err = sink(&mock_server)
            .send("1", "hi", MessageFormat::Html)
            .await
            .unwrap_err();
        match err {
            SendError::Api(description) => assert_eq!(description, "Bad Request: chat not found"),
            e => panic!("Expected Api, got {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_unreadable_success_body_is_api_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
            .mount(&mock_server)
            .await;

        let err = sink(&mock_server)
            .send("1", "hi", MessageFormat::Html)
            .await
            .unwrap_err();
        assert!(matches!(err, SendError::Api(ref d) if d == "unreadable response body"));
    }

    #[tokio::test]
    async fn test_too_long_rejected_before_io() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let text = "x".repeat(TELEGRAM_MAX_MESSAGE_CHARS + 1);
        let err = sink(&mock_server)
            .send("1", &text, MessageFormat::Plain)
            .await
            .unwrap_err();
        assert!(matches!(err, SendError::TooLong { len: 4097, max: 4096 }));
    }

    #[test]
    fn test_debug_redacts_token() {
        let sink = TelegramSink::new(reqwest::Client::new(), SecretString::from("super-secret"));
        let out = format!("{:?}", sink);
        assert!(!out.contains("super-secret"));
        assert!(out.contains("[REDACTED]"));
    }
}
