use std::time::Duration;

use anyhow::Result;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::BackendConfig;
use crate::transcript::ActionChip;

/// Why one submission produced no reply. Cloneable so it can travel in UI messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("could not reach the chat server: {0}")]
    Transport(String),
    #[error("chat server answered with status {0}")]
    Status(u16),
    #[error("unexpected reply from chat server: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Action(ActionChip),
}

#[derive(Debug, Clone)]
pub struct ChatClient {
    endpoint: String,
    request_field: String,
    client: reqwest::Client,
}

impl ChatClient {
    pub fn with_config(config: &BackendConfig) -> Result<Self> {
        // The server keeps the conversation in a session cookie.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .cookie_store(true)
            .build()?;

        Ok(ChatClient {
            endpoint: config.endpoint.clone(),
            request_field: config.request_field.clone(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Sends one message and waits for its reply. Never retries.
    pub async fn send(&self, text: &str) -> Result<Reply, ChatError> {
        let mut body = Map::new();
        body.insert(self.request_field.clone(), Value::String(text.to_string()));

        debug!(endpoint = %self.endpoint, chars = text.len(), "Sending chat request");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!("Chat request failed: {}", e);
                ChatError::Transport(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Chat server returned an error status");
            return Err(ChatError::Status(status.as_u16()));
        }

        let text = response
            .text()
            .await
            .map_err(|e| ChatError::Transport(e.to_string()))?;

        parse_reply(&text).map_err(|e| {
            warn!("{}", e);
            e
        })
    }
}

/// Only http(s) links may be handed to the browser.
pub fn is_web_link(url: &str) -> bool {
    let lower = url.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Decodes a reply body: an action payload when `kind` is `"action"`,
/// otherwise the `reply` (or `resposta`) string.
pub fn parse_reply(body: &str) -> Result<Reply, ChatError> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| ChatError::Malformed(e.to_string()))?;

    if value.get("kind").and_then(Value::as_str) == Some("action") {
        let chip: ActionChip =
            serde_json::from_value(value).map_err(|e| ChatError::Malformed(e.to_string()))?;
        if !is_web_link(&chip.url) {
            return Err(ChatError::Malformed(format!("action link is not a web address: {}", chip.url)));
        }
        return Ok(Reply::Action(chip));
    }

    ["reply", "resposta"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .map(|text| Reply::Text(text.to_string()))
        .ok_or_else(|| ChatError::Malformed("missing reply field".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, field: &str) -> ChatClient {
        let config = BackendConfig {
            endpoint: format!("{}/api/chat", server.uri()),
            request_field: field.to_string(),
            timeout_secs: 5,
        };
        ChatClient::with_config(&config).unwrap()
    }

    #[test]
    fn test_parse_plain_reply() {
        assert_eq!(
            parse_reply(r#"{"reply":"Hello"}"#),
            Ok(Reply::Text("Hello".to_string()))
        );
        assert_eq!(
            parse_reply(r#"{"pergunta":"oi","resposta":"Olá","status":"sucesso","links":{}}"#),
            Ok(Reply::Text("Olá".to_string()))
        );
    }

    #[test]
    fn test_parse_action_reply() {
        let reply = parse_reply(
            r#"{"kind":"action","preText":"Watch live:","url":"https://example.org/live","icon":"▶","label":"Open stream"}"#,
        )
        .unwrap();

        assert_eq!(
            reply,
            Reply::Action(ActionChip {
                pre_text: "Watch live:".to_string(),
                url: "https://example.org/live".to_string(),
                icon: "▶".to_string(),
                label: "Open stream".to_string(),
            })
        );
    }

    #[test]
    fn test_parse_malformed() {
        assert!(matches!(parse_reply("not json"), Err(ChatError::Malformed(_))));
        assert!(matches!(parse_reply(r#"{"status":"ok"}"#), Err(ChatError::Malformed(_))));
        assert!(matches!(parse_reply(r#"{"reply":42}"#), Err(ChatError::Malformed(_))));
        assert!(matches!(
            parse_reply(r#"{"kind":"action","preText":"x"}"#),
            Err(ChatError::Malformed(_))
        ));
    }

    #[test]
    fn test_action_link_must_be_web_address() {
        for url in ["/usr/bin/xterm", "file:///etc/passwd", "javascript:alert(1)", "ftp://example.org"] {
            let body = json!({"kind": "action", "url": url, "label": "x"}).to_string();
            assert!(
                matches!(parse_reply(&body), Err(ChatError::Malformed(_))),
                "accepted {url}"
            );
        }

        let body = json!({"kind": "action", "url": "HTTPS://example.org", "label": "x"}).to_string();
        assert!(matches!(parse_reply(&body), Ok(Reply::Action(_))));
    }

    #[tokio::test]
    async fn test_session_cookie_is_sent_back() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("set-cookie", "session=abc123; Path=/")
                    .set_body_json(json!({"reply": "first"})),
            )
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(header("cookie", "session=abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"reply": "second"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, "message");
        assert_eq!(client.send("one").await, Ok(Reply::Text("first".to_string())));
        assert_eq!(client.send("two").await, Ok(Reply::Text("second".to_string())));
    }

    #[tokio::test]
    async fn test_send_posts_message_field() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_json(json!({"message": "what time is mass"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"reply": "Sunday at 10h"})))
            .expect(1)
            .mount(&server)
            .await;

        let reply = client_for(&server, "message").send("what time is mass").await;
        assert_eq!(reply, Ok(Reply::Text("Sunday at 10h".to_string())));
    }

    #[tokio::test]
    async fn test_send_uses_configured_field() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_json(json!({"pergunta": "oi"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"resposta": "Olá"})))
            .expect(1)
            .mount(&server)
            .await;

        let reply = client_for(&server, "pergunta").send("oi").await;
        assert_eq!(reply, Ok(Reply::Text("Olá".to_string())));
    }

    #[tokio::test]
    async fn test_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_json(json!({"erro": "down"})))
            .mount(&server)
            .await;

        let reply = client_for(&server, "message").send("hi").await;
        assert_eq!(reply, Err(ChatError::Status(503)));
    }

    #[tokio::test]
    async fn test_undecodable_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let reply = client_for(&server, "message").send("hi").await;
        assert!(matches!(reply, Err(ChatError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        let config = BackendConfig {
            endpoint: "http://127.0.0.1:9/api/chat".to_string(),
            request_field: "message".to_string(),
            timeout_secs: 2,
        };
        let client = ChatClient::with_config(&config).unwrap();

        let reply = client.send("hi").await;
        assert!(matches!(reply, Err(ChatError::Transport(_))));
    }
}
