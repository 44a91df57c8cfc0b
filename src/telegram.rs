//! telegram.rs — Minimal Telegram Bot API client.
//!
//! Only what the bot needs: getMe, long-polling getUpdates, sendMessage and
//! editMessageText. Every call is a JSON POST to
//! `{api_url}/bot{token}/{method}`.

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("Telegram request failed: {0}")]
    Request(reqwest::Error),
    #[error("Telegram API error in {method}: {description}")]
    Api { method: &'static str, description: String },
}

// request URLs embed the bot token
impl From<reqwest::Error> for TelegramError {
    fn from(err: reqwest::Error) -> Self {
        TelegramError::Request(err.without_url())
    }
}

/// Bot API response envelope.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'static str,
}

#[derive(Debug, Serialize)]
struct EditMessageText<'a> {
    chat_id: i64,
    message_id: i64,
    text: &'a str,
    parse_mode: &'static str,
}

pub struct TelegramClient {
    http: Client,
    base: String,
    poll_timeout_secs: u64,
}

impl TelegramClient {
    pub fn new(api_url: &str, token: &str, poll_timeout_secs: u64) -> Result<Self, TelegramError> {
        // the HTTP timeout has to outlive the long poll
        let http = Client::builder()
            .timeout(Duration::from_secs(poll_timeout_secs + 15))
            .build()?;
        Ok(Self {
            http,
            base: format!("{}/bot{}", api_url.trim_end_matches('/'), token),
            poll_timeout_secs,
        })
    }

    pub async fn get_me(&self) -> Result<User, TelegramError> {
        self.call("getMe", &json!({})).await
    }

    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, TelegramError> {
        self.call(
            "getUpdates",
            &json!({
                "offset": offset,
                "timeout": self.poll_timeout_secs,
                "allowed_updates": ["message"],
            }),
        )
        .await
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<Message, TelegramError> {
        let body = SendMessage { chat_id, text, parse_mode: "HTML" };
        self.call("sendMessage", &body).await
    }

    /// Edit a message previously sent by the bot. The API answers with the
    /// edited message, or `true` for inline messages; the value is dropped.
    pub async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> Result<(), TelegramError> {
        let body = EditMessageText { chat_id, message_id, text, parse_mode: "HTML" };
        let _: serde_json::Value = self.call("editMessageText", &body).await?;
        Ok(())
    }

    async fn call<B, T>(&self, method: &'static str, body: &B) -> Result<T, TelegramError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!(method, "Telegram call");
        let resp = self
            .http
            .post(format!("{}/{}", self.base, method))
            .json(body)
            .send()
            .await?;
        let envelope: ApiResponse<T> = resp.json().await?;
        unwrap_envelope(method, envelope)
    }
}

fn unwrap_envelope<T>(method: &'static str, envelope: ApiResponse<T>) -> Result<T, TelegramError> {
    match envelope {
        ApiResponse { ok: true, result: Some(result), .. } => Ok(result),
        ApiResponse { description, .. } => Err(TelegramError::Api {
            method,
            description: description.unwrap_or_else(|| "no description".to_string()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_updates() {
        let raw = r#"{
            "ok": true,
            "result": [
                {"update_id": 10, "message": {"message_id": 1, "chat": {"id": 5, "type": "private"},
                 "from": {"id": 5, "is_bot": false, "first_name": "A"}, "date": 0, "text": "/start"}},
                {"update_id": 11, "edited_message": {"message_id": 1, "chat": {"id": 5}}}
            ]
        }"#;
        let envelope: ApiResponse<Vec<Update>> = serde_json::from_str(raw).unwrap();
        let updates = unwrap_envelope("getUpdates", envelope).unwrap();
        assert_eq!(updates.len(), 2);
        let message = updates[0].message.as_ref().unwrap();
        assert_eq!(message.chat.id, 5);
        assert_eq!(message.text.as_deref(), Some("/start"));
        assert!(updates[1].message.is_none());
    }

    #[test]
    fn test_api_error_is_surfaced() {
        let raw = r#"{"ok": false, "error_code": 401, "description": "Unauthorized"}"#;
        let envelope: ApiResponse<User> = serde_json::from_str(raw).unwrap();
        match unwrap_envelope("getMe", envelope) {
            Err(TelegramError::Api { method, description }) => {
                assert_eq!(method, "getMe");
                assert_eq!(description, "Unauthorized");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_request_errors_do_not_leak_token() {
        let client = TelegramClient::new("http://127.0.0.1:1", "123456:SECRET-TOKEN", 1).unwrap();
        let err = client.get_updates(0).await.unwrap_err();
        assert!(matches!(err, TelegramError::Request(_)));
        let shown = format!("{err} / {err:?}");
        assert!(!shown.contains("SECRET-TOKEN"), "{shown}");
        assert!(!shown.contains("123456"), "{shown}");
    }

    #[test]
    fn test_send_message_body() {
        let body = SendMessage { chat_id: 7, text: "<b>hi</b>", parse_mode: "HTML" };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["chat_id"], 7);
        assert_eq!(value["parse_mode"], "HTML");
    }
}
