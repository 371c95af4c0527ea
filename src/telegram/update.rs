//! Bot API wire types and their decoding into domain events.
//!
//! Only the fields this bot reads are modeled; everything else in an update
//! is ignored by serde. Decoding happens once, at the boundary — the rest of
//! the pipeline never sees raw JSON or string-prefixed tags.

use serde::Deserialize;

use crate::intake::types::{Action, Command, ContentFragment, InboundEvent};
use crate::outbound::{ChatRef, MediaKind, MediaRef};

/// One `getUpdates` result entry.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<User>,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub photo: Option<Vec<PhotoSize>>,
    #[serde(default)]
    pub video: Option<Video>,
    #[serde(default)]
    pub media_group_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

/// One size variant of a photo. Telegram sends several; we keep the largest.
#[derive(Debug, Clone, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
    #[serde(default)]
    pub width: i64,
    #[serde(default)]
    pub height: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Video {
    pub file_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: Option<String>,
}

impl Update {
    /// Classify this update into a domain event.
    ///
    /// Returns `None` for anything the bot does not handle — service
    /// messages, unsupported media kinds, malformed callback tags — which
    /// the caller silently skips.
    pub fn into_event(self) -> Option<InboundEvent> {
        if let Some(cq) = self.callback_query {
            let action = Action::parse(cq.data.as_deref()?)?;
            let prompt = cq
                .message
                .as_ref()
                .map(|m| (ChatRef::new(m.chat.id.to_string()), m.message_id));
            return Some(InboundEvent::Action {
                user_id: cq.from.id,
                callback_id: cq.id,
                prompt,
                action,
            });
        }

        let message = self.message?;
        let user_id = message.from.as_ref().map(|u| u.id)?;

        if let Some(command) = parse_command(message.text.as_deref()) {
            return Some(InboundEvent::Command { user_id, command });
        }

        let media = extract_media(&message);
        let text = message
            .text
            .as_deref()
            .or(message.caption.as_deref())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        // A message with neither text nor supported media carries nothing
        // the pipeline can use.
        if media.is_none() && text.is_none() {
            return None;
        }

        Some(InboundEvent::Content {
            user_id,
            group_id: message.media_group_id,
            fragment: ContentFragment { text, media },
        })
    }
}

fn parse_command(text: Option<&str>) -> Option<Command> {
    // Commands may arrive as `/start@BotName`; match on the bare name.
    let first = text?.trim().split_whitespace().next()?;
    let name = first.split('@').next()?;
    match name {
        "/start" => Some(Command::Start),
        "/write" => Some(Command::Write),
        _ => None,
    }
}

/// Pull the single media reference out of a message: the largest photo
/// size, or the video.
fn extract_media(message: &Message) -> Option<MediaRef> {
    if let Some(sizes) = &message.photo {
        let largest = sizes.iter().max_by_key(|s| s.width * s.height)?;
        return Some(MediaRef {
            kind: MediaKind::Photo,
            file_ref: largest.file_id.clone(),
        });
    }
    message.video.as_ref().map(|v| MediaRef {
        kind: MediaKind::Video,
        file_ref: v.file_id.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(json: serde_json::Value) -> Update {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn decodes_start_command() {
        let event = update(serde_json::json!({
            "update_id": 1,
            "message": {
                "message_id": 10,
                "from": {"id": 42},
                "chat": {"id": 42},
                "text": "/start"
            }
        }))
        .into_event();

        assert!(matches!(
            event,
            Some(InboundEvent::Command {
                user_id: 42,
                command: Command::Start
            })
        ));
    }

    #[test]
    fn decodes_command_with_bot_suffix() {
        let event = update(serde_json::json!({
            "update_id": 1,
            "message": {
                "message_id": 10,
                "from": {"id": 42},
                "chat": {"id": 42},
                "text": "/write@curator_bot"
            }
        }))
        .into_event();

        assert!(matches!(
            event,
            Some(InboundEvent::Command {
                command: Command::Write,
                ..
            })
        ));
    }

    #[test]
    fn decodes_text_content() {
        let event = update(serde_json::json!({
            "update_id": 2,
            "message": {
                "message_id": 11,
                "from": {"id": 7},
                "chat": {"id": 7},
                "text": "launch day"
            }
        }))
        .into_event();

        let Some(InboundEvent::Content {
            user_id,
            group_id,
            fragment,
        }) = event
        else {
            panic!("expected content event");
        };
        assert_eq!(user_id, 7);
        assert_eq!(group_id, None);
        assert_eq!(fragment.text.as_deref(), Some("launch day"));
        assert_eq!(fragment.media, None);
    }

    #[test]
    fn decodes_photo_with_caption_and_group() {
        let event = update(serde_json::json!({
            "update_id": 3,
            "message": {
                "message_id": 12,
                "from": {"id": 7},
                "chat": {"id": 7},
                "caption": "look at this",
                "media_group_id": "g-99",
                "photo": [
                    {"file_id": "small", "width": 90, "height": 90},
                    {"file_id": "big", "width": 1280, "height": 960}
                ]
            }
        }))
        .into_event();

        let Some(InboundEvent::Content {
            group_id, fragment, ..
        }) = event
        else {
            panic!("expected content event");
        };
        assert_eq!(group_id.as_deref(), Some("g-99"));
        let media = fragment.media.unwrap();
        assert_eq!(media.kind, MediaKind::Photo);
        assert_eq!(media.file_ref, "big");
        assert_eq!(fragment.text.as_deref(), Some("look at this"));
    }

    #[test]
    fn decodes_video() {
        let event = update(serde_json::json!({
            "update_id": 4,
            "message": {
                "message_id": 13,
                "from": {"id": 7},
                "chat": {"id": 7},
                "video": {"file_id": "vid-1"}
            }
        }))
        .into_event();

        let Some(InboundEvent::Content { fragment, .. }) = event else {
            panic!("expected content event");
        };
        assert_eq!(fragment.media.unwrap().kind, MediaKind::Video);
    }

    #[test]
    fn decodes_decision_callback_with_prompt_location() {
        let post = uuid::Uuid::new_v4();
        let event = update(serde_json::json!({
            "update_id": 5,
            "callback_query": {
                "id": "cb-1",
                "from": {"id": 1000},
                "data": format!("approve:{post}"),
                "message": {
                    "message_id": 77,
                    "chat": {"id": -100123}
                }
            }
        }))
        .into_event();

        let Some(InboundEvent::Action {
            user_id,
            callback_id,
            prompt,
            action,
        }) = event
        else {
            panic!("expected action event");
        };
        assert_eq!(user_id, 1000);
        assert_eq!(callback_id, "cb-1");
        assert_eq!(action, Action::Approve(post));
        let (chat, message_id) = prompt.unwrap();
        assert_eq!(chat.as_str(), "-100123");
        assert_eq!(message_id, 77);
    }

    #[test]
    fn drops_unhandled_updates() {
        // Sticker-style message: no text, no supported media
        assert!(
            update(serde_json::json!({
                "update_id": 6,
                "message": {
                    "message_id": 14,
                    "from": {"id": 7},
                    "chat": {"id": 7}
                }
            }))
            .into_event()
            .is_none()
        );

        // Malformed callback tag
        assert!(
            update(serde_json::json!({
                "update_id": 7,
                "callback_query": {
                    "id": "cb-2",
                    "from": {"id": 1},
                    "data": "bogus"
                }
            }))
            .into_event()
            .is_none()
        );

        // Empty update
        assert!(
            update(serde_json::json!({"update_id": 8}))
                .into_event()
                .is_none()
        );
    }

    #[test]
    fn whitespace_only_caption_is_dropped() {
        let event = update(serde_json::json!({
            "update_id": 9,
            "message": {
                "message_id": 15,
                "from": {"id": 7},
                "chat": {"id": 7},
                "caption": "   ",
                "photo": [{"file_id": "p", "width": 1, "height": 1}]
            }
        }))
        .into_event();

        let Some(InboundEvent::Content { fragment, .. }) = event else {
            panic!("expected content event");
        };
        assert_eq!(fragment.text, None);
        assert!(fragment.media.is_some());
    }
}
