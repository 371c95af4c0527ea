//! Publisher — republishes approved posts to the public destination.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::outbound::{ChatRef, Outbound};
use crate::store::SubmissionStore;
use crate::texts;

/// Build the public caption: the submission text with `#<category>`
/// appended, unless that literal tag already occurs in the text. A post with
/// no text publishes as the bare hashtag.
pub fn caption_with_hashtag(text: Option<&str>, category: &str) -> String {
    let tag = format!("#{category}");
    match text {
        Some(t) if !t.trim().is_empty() => {
            if t.contains(&tag) {
                t.to_string()
            } else {
                format!("{t}\n\n{tag}")
            }
        }
        _ => tag,
    }
}

/// Sends approved content to the channel and notifies the submitter.
///
/// Runs at most once per post — the caller only invokes it after observing
/// the pending→approved transition.
pub struct Publisher {
    outbound: Arc<dyn Outbound>,
    store: Arc<dyn SubmissionStore>,
    channel: ChatRef,
}

impl Publisher {
    pub fn new(
        outbound: Arc<dyn Outbound>,
        store: Arc<dyn SubmissionStore>,
        channel: ChatRef,
    ) -> Self {
        Self {
            outbound,
            store,
            channel,
        }
    }

    /// Load the post's content and deliver it to the public destination,
    /// then tell the submitter. Delivery failures are logged and do not
    /// undo the approval.
    pub async fn publish(&self, post_id: Uuid) -> Result<()> {
        let payload = self.store.load_for_publish(post_id).await?;
        let caption = caption_with_hashtag(payload.text.as_deref(), &payload.category);

        let delivery = match &payload.media {
            Some(media) => {
                self.outbound
                    .send_media(&self.channel, media, Some(&caption))
                    .await
            }
            None => self.outbound.send_text(&self.channel, &caption).await,
        };
        match delivery {
            Ok(_) => info!(post_id = %post_id, category = %payload.category, "Post published"),
            Err(e) => warn!(post_id = %post_id, error = %e, "Failed to deliver post to channel"),
        }

        if let Err(e) = self
            .outbound
            .send_text(&ChatRef::user(payload.user_id), texts::APPROVED_NOTICE)
            .await
        {
            warn!(post_id = %post_id, error = %e, "Failed to deliver approval notice");
        }

        Ok(())
    }
}
