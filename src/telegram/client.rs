//! Bot API client — long-polls `getUpdates` and implements the outbound
//! delivery seam over plain JSON calls.
//!
//! Media is always re-sent by `file_id`, never downloaded or re-uploaded.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::error::TelegramError;
use crate::outbound::{Button, ChatRef, MediaKind, MediaRef, MessageId, Outbound};
use crate::telegram::update::Update;

/// Long-poll timeout passed to `getUpdates`, in seconds.
const POLL_TIMEOUT_SECS: u64 = 30;

/// Bot API response envelope.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

/// The subset of a sent message the client reads back.
#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

/// Telegram Bot API client.
pub struct TelegramClient {
    token: SecretString,
    http: reqwest::Client,
}

impl TelegramClient {
    pub fn new(token: SecretString) -> Self {
        Self {
            token,
            http: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "https://api.telegram.org/bot{}/{method}",
            self.token.expose_secret()
        )
    }

    /// POST one Bot API method and unwrap the response envelope.
    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        body: &serde_json::Value,
    ) -> Result<T, TelegramError> {
        let response = self
            .http
            .post(self.api_url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| TelegramError::Http(format!("{method}: {e}")))?;

        let envelope: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| TelegramError::InvalidResponse {
                method: method.to_string(),
                reason: e.to_string(),
            })?;

        if !envelope.ok {
            return Err(TelegramError::Api {
                method: method.to_string(),
                description: envelope
                    .description
                    .unwrap_or_else(|| "no description".to_string()),
            });
        }

        envelope.result.ok_or_else(|| TelegramError::InvalidResponse {
            method: method.to_string(),
            reason: "ok response without result".to_string(),
        })
    }

    /// Long-poll for updates past `offset`.
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, TelegramError> {
        self.call(
            "getUpdates",
            &json!({
                "offset": offset,
                "timeout": POLL_TIMEOUT_SECS,
                "allowed_updates": ["message", "callback_query"],
            }),
        )
        .await
    }

    /// Startup probe: the token is valid and the API reachable.
    pub async fn probe_identity(&self) -> Result<(), TelegramError> {
        let _: serde_json::Value = self.call("getMe", &json!({})).await?;
        Ok(())
    }

    /// Startup probe: the given destination exists and the bot can see it.
    pub async fn probe_chat(&self, chat: &ChatRef) -> Result<(), TelegramError> {
        let _: serde_json::Value = self
            .call("getChat", &json!({"chat_id": chat.as_str()}))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Outbound for TelegramClient {
    async fn send_text(&self, chat: &ChatRef, text: &str) -> Result<MessageId, TelegramError> {
        let sent: SentMessage = self
            .call(
                "sendMessage",
                &json!({"chat_id": chat.as_str(), "text": text}),
            )
            .await?;
        debug!(chat = %chat, message_id = sent.message_id, "Text sent");
        Ok(sent.message_id)
    }

    async fn send_media(
        &self,
        chat: &ChatRef,
        media: &MediaRef,
        caption: Option<&str>,
    ) -> Result<MessageId, TelegramError> {
        let (method, field) = match media.kind {
            MediaKind::Photo => ("sendPhoto", "photo"),
            MediaKind::Video => ("sendVideo", "video"),
        };

        let mut body = json!({"chat_id": chat.as_str(), field: media.file_ref});
        if let Some(caption) = caption {
            body["caption"] = json!(caption);
        }

        let sent: SentMessage = self.call(method, &body).await?;
        debug!(chat = %chat, kind = media.kind.as_str(), message_id = sent.message_id, "Media sent");
        Ok(sent.message_id)
    }

    async fn send_prompt(
        &self,
        chat: &ChatRef,
        text: &str,
        buttons: &[Button],
    ) -> Result<MessageId, TelegramError> {
        let row: Vec<serde_json::Value> = buttons
            .iter()
            .map(|b| json!({"text": b.label, "callback_data": b.action}))
            .collect();

        let sent: SentMessage = self
            .call(
                "sendMessage",
                &json!({
                    "chat_id": chat.as_str(),
                    "text": text,
                    "reply_markup": {"inline_keyboard": [row]},
                }),
            )
            .await?;
        Ok(sent.message_id)
    }

    async fn clear_buttons(
        &self,
        chat: &ChatRef,
        message: MessageId,
    ) -> Result<(), TelegramError> {
        let _: serde_json::Value = self
            .call(
                "editMessageReplyMarkup",
                &json!({
                    "chat_id": chat.as_str(),
                    "message_id": message,
                    "reply_markup": {"inline_keyboard": []},
                }),
            )
            .await?;
        Ok(())
    }

    async fn ack_action(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), TelegramError> {
        let mut body = json!({"callback_query_id": callback_id});
        if let Some(text) = text {
            body["text"] = json!(text);
        }
        // answerCallbackQuery returns plain `true`.
        let _: serde_json::Value = self.call("answerCallbackQuery", &body).await?;
        Ok(())
    }
}
