//! Domain events — what the transport's updates decode into.
//!
//! Action tags arrive as opaque strings (`cat:joke`, `approve:<uuid>`); they
//! are decoded into the closed `Action` enum here, at the boundary, so the
//! rest of the pipeline dispatches on variants rather than string prefixes.

use uuid::Uuid;

use crate::outbound::{ChatRef, MediaRef, MessageId};
use crate::store::Decision;

/// A command message from a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `/start` — greet and present categories.
    Start,
    /// `/write` — same flow, kept as a separate alias command.
    Write,
}

/// A decoded inline-button action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// `cat:<slug>` — the user picked a submission category.
    SelectCategory(String),
    /// `approve:<postId>` — a reviewer approved a post.
    Approve(Uuid),
    /// `reject:<postId>` — a reviewer rejected a post.
    Reject(Uuid),
}

impl Action {
    /// Decode an opaque callback tag. Unknown or malformed tags yield `None`
    /// and the update is dropped.
    pub fn parse(tag: &str) -> Option<Self> {
        let (kind, rest) = tag.split_once(':')?;
        match kind {
            "cat" if !rest.is_empty() => Some(Self::SelectCategory(rest.to_string())),
            "approve" => Uuid::parse_str(rest).ok().map(Self::Approve),
            "reject" => Uuid::parse_str(rest).ok().map(Self::Reject),
            _ => None,
        }
    }

    /// The moderation decision carried by this action, if it is one.
    pub fn decision(&self) -> Option<(Uuid, Decision)> {
        match self {
            Self::Approve(id) => Some((*id, Decision::Approve)),
            Self::Reject(id) => Some((*id, Decision::Reject)),
            Self::SelectCategory(_) => None,
        }
    }
}

/// One content-bearing message: text and/or a single media reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentFragment {
    pub text: Option<String>,
    pub media: Option<MediaRef>,
}

/// A classified inbound event, ready for the router.
#[derive(Debug, Clone)]
pub enum InboundEvent {
    /// A command from a submitter.
    Command { user_id: i64, command: Command },
    /// An inline-button tap (category selection or a moderation decision).
    Action {
        user_id: i64,
        /// Transport callback id, acknowledged after handling.
        callback_id: String,
        /// The message the tapped button was attached to, when known.
        prompt: Option<(ChatRef, MessageId)>,
        action: Action,
    },
    /// A content message, optionally part of a media group.
    Content {
        user_id: i64,
        group_id: Option<String>,
        fragment: ContentFragment,
    },
}
