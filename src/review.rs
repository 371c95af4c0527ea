//! Review workflow — renders submissions to the moderation surface and
//! applies decisions exactly once.
//!
//! The pending-state check in `SubmissionStore::decide` is the real guard
//! against duplicate decisions; clearing the prompt's buttons afterwards is
//! belt and suspenders on top of it.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{Result, TelegramError};
use crate::outbound::{Button, ChatRef, MediaRef, MessageId, Outbound};
use crate::publish::Publisher;
use crate::store::{Decision, PostStatus, SubmissionStore};
use crate::texts;

/// An accepted submission, ready to show to reviewers.
#[derive(Debug, Clone)]
pub struct ReviewItem {
    pub post_id: Uuid,
    pub submitter: i64,
    pub category: String,
    pub media: Option<MediaRef>,
    pub text: Option<String>,
}

/// Drives the moderation surface.
pub struct ReviewWorkflow {
    outbound: Arc<dyn Outbound>,
    store: Arc<dyn SubmissionStore>,
    publisher: Arc<Publisher>,
    review_chat: ChatRef,
}

impl ReviewWorkflow {
    pub fn new(
        outbound: Arc<dyn Outbound>,
        store: Arc<dyn SubmissionStore>,
        publisher: Arc<Publisher>,
        review_chat: ChatRef,
    ) -> Self {
        Self {
            outbound,
            store,
            publisher,
            review_chat,
        }
    }

    /// Render one review unit: the content itself, then a decision prompt
    /// with mutually exclusive approve/reject actions.
    pub async fn present(&self, item: &ReviewItem) -> std::result::Result<(), TelegramError> {
        match &item.media {
            Some(media) => {
                self.outbound
                    .send_media(&self.review_chat, media, item.text.as_deref())
                    .await?;
            }
            None => {
                // The router never accepts an empty submission, so a
                // media-less post always carries text.
                let text = item.text.as_deref().unwrap_or("");
                self.outbound.send_text(&self.review_chat, text).await?;
            }
        }

        let prompt = format!("From {} · #{}", item.submitter, item.category);
        let buttons = [
            Button::new(texts::APPROVE_BUTTON, format!("approve:{}", item.post_id)),
            Button::new(texts::REJECT_BUTTON, format!("reject:{}", item.post_id)),
        ];
        self.outbound
            .send_prompt(&self.review_chat, &prompt, &buttons)
            .await?;

        info!(post_id = %item.post_id, submitter = item.submitter, "Submission sent for review");
        Ok(())
    }

    /// Apply a reviewer's decision.
    ///
    /// Only the call that observes the post in `pending` performs any side
    /// effects; a duplicate tap (or a decision on an unknown id) is a no-op
    /// beyond acknowledging the tap.
    pub async fn apply_decision(
        &self,
        post_id: Uuid,
        decision: Decision,
        callback_id: &str,
        prompt: Option<(ChatRef, MessageId)>,
    ) -> Result<()> {
        let prior = self.store.decide(post_id, decision).await?;

        if prior != Some(PostStatus::Pending) {
            info!(post_id = %post_id, ?prior, "Stale or unknown decision ignored");
            self.ack(callback_id, texts::ALREADY_DECIDED).await;
            return Ok(());
        }

        match decision {
            Decision::Approve => self.publisher.publish(post_id).await?,
            Decision::Reject => {
                let payload = self.store.load_for_publish(post_id).await?;
                if let Err(e) = self
                    .outbound
                    .send_text(&ChatRef::user(payload.user_id), texts::REJECTED_NOTICE)
                    .await
                {
                    warn!(post_id = %post_id, error = %e, "Failed to deliver rejection notice");
                }
            }
        }

        self.ack(callback_id, texts::DECISION_RECORDED).await;

        // Disable the prompt's controls so a second tap has nothing to hit.
        if let Some((chat, message_id)) = prompt {
            if let Err(e) = self.outbound.clear_buttons(&chat, message_id).await {
                warn!(post_id = %post_id, error = %e, "Failed to clear decision buttons");
            }
        }

        Ok(())
    }

    async fn ack(&self, callback_id: &str, text: &str) {
        if let Err(e) = self.outbound.ack_action(callback_id, Some(text)).await {
            tracing::debug!(error = %e, "Failed to ack decision callback");
        }
    }
}
