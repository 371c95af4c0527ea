//! Outbound delivery seam.
//!
//! `Outbound` is the narrow trait the review workflow and the publisher send
//! through. The Telegram client implements it for production; tests plug in
//! a recording double. Sends are fire-once: a failed delivery is logged by
//! the caller and never retried here.

use async_trait::async_trait;

use crate::error::TelegramError;

/// A delivery target: a numeric chat id or an `@name`, as Telegram accepts
/// both. Private-chat submitters are addressed by their user id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChatRef(String);

impl ChatRef {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn user(user_id: i64) -> Self {
        Self(user_id.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChatRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of a media payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    Video,
}

impl MediaKind {
    /// Stable string form, used both in the DB and in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Photo => "photo",
            Self::Video => "video",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "photo" => Some(Self::Photo),
            "video" => Some(Self::Video),
            _ => None,
        }
    }
}

/// An opaque handle to a media payload, resendable by reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef {
    pub kind: MediaKind,
    /// Telegram `file_id` — never dereferenced by us, only passed back.
    pub file_ref: String,
}

/// One inline button: a label plus the opaque action tag sent back on tap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub action: String,
}

impl Button {
    pub fn new(label: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: action.into(),
        }
    }
}

/// Identifies a previously sent message so its controls can be cleared.
pub type MessageId = i64;

/// Everything the pipeline sends out, abstracted from the transport.
#[async_trait]
pub trait Outbound: Send + Sync {
    /// Send plain text.
    async fn send_text(&self, chat: &ChatRef, text: &str) -> Result<MessageId, TelegramError>;

    /// Send a single photo or video by reference, with an optional caption.
    async fn send_media(
        &self,
        chat: &ChatRef,
        media: &MediaRef,
        caption: Option<&str>,
    ) -> Result<MessageId, TelegramError>;

    /// Send text with one row of inline buttons.
    async fn send_prompt(
        &self,
        chat: &ChatRef,
        text: &str,
        buttons: &[Button],
    ) -> Result<MessageId, TelegramError>;

    /// Remove the inline buttons from a previously sent prompt.
    async fn clear_buttons(&self, chat: &ChatRef, message: MessageId)
    -> Result<(), TelegramError>;

    /// Acknowledge a button tap (clears the client-side spinner).
    async fn ack_action(&self, callback_id: &str, text: Option<&str>)
    -> Result<(), TelegramError>;
}
