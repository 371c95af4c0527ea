//! Intake router — classifies inbound events and drives acceptance.
//!
//! Every update lands here on its own worker task. Notices to submitters
//! are delivery-errors-tolerated: a failed send is logged and the flow
//! continues, since the submission state already committed (or never will).

use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::Result;
use crate::intake::coalescer::{FinalizedGroup, MediaGroupCoalescer};
use crate::intake::types::{Action, Command, ContentFragment, InboundEvent};
use crate::outbound::{Button, ChatRef, MediaRef, MessageId, Outbound};
use crate::review::{ReviewItem, ReviewWorkflow};
use crate::store::{SubmissionOutcome, SubmissionStore};
use crate::texts;

/// Routes classified events through category selection, the pending-limit
/// gate, the coalescer, and into the review workflow.
pub struct IntakeRouter {
    config: Config,
    store: Arc<dyn SubmissionStore>,
    outbound: Arc<dyn Outbound>,
    coalescer: Arc<MediaGroupCoalescer>,
    review: Arc<ReviewWorkflow>,
}

impl IntakeRouter {
    pub fn new(
        config: Config,
        store: Arc<dyn SubmissionStore>,
        outbound: Arc<dyn Outbound>,
        coalescer: Arc<MediaGroupCoalescer>,
        review: Arc<ReviewWorkflow>,
    ) -> Self {
        Self {
            config,
            store,
            outbound,
            coalescer,
            review,
        }
    }

    /// Handle one classified event. Store failures abort the request and
    /// bubble to the worker task, which logs them.
    pub async fn handle(&self, event: InboundEvent) -> Result<()> {
        match event {
            InboundEvent::Command { user_id, command } => {
                self.handle_command(user_id, command).await
            }
            InboundEvent::Action {
                user_id,
                callback_id,
                prompt,
                action,
            } => self.handle_action(user_id, &callback_id, prompt, action).await,
            InboundEvent::Content {
                user_id,
                group_id,
                fragment,
            } => self.handle_content(user_id, group_id, fragment).await,
        }
    }

    async fn handle_command(&self, user_id: i64, command: Command) -> Result<()> {
        debug!(user_id, ?command, "Command received");
        self.store.register_user(user_id).await?;

        let buttons: Vec<Button> = self
            .config
            .categories
            .iter()
            .map(|slug| Button::new(format!("#{slug}"), format!("cat:{slug}")))
            .collect();

        if let Err(e) = self
            .outbound
            .send_prompt(&ChatRef::user(user_id), texts::CHOOSE_CATEGORY, &buttons)
            .await
        {
            warn!(user_id, error = %e, "Failed to deliver category prompt");
        }
        Ok(())
    }

    async fn handle_action(
        &self,
        user_id: i64,
        callback_id: &str,
        prompt: Option<(ChatRef, MessageId)>,
        action: Action,
    ) -> Result<()> {
        if let Some((post_id, decision)) = action.decision() {
            return self
                .review
                .apply_decision(post_id, decision, callback_id, prompt)
                .await;
        }

        let Action::SelectCategory(slug) = action else {
            unreachable!("non-decision actions are category selections");
        };

        if !self.config.is_known_category(&slug) {
            warn!(user_id, category = %slug, "Unknown category selected");
            self.ack(callback_id, None).await;
            return Ok(());
        }

        self.store.set_category(user_id, &slug).await?;
        self.ack(callback_id, None).await;
        if let Err(e) = self
            .outbound
            .send_text(&ChatRef::user(user_id), texts::CATEGORY_SAVED)
            .await
        {
            warn!(user_id, error = %e, "Failed to deliver category ack");
        }
        Ok(())
    }

    async fn handle_content(
        &self,
        user_id: i64,
        group_id: Option<String>,
        fragment: ContentFragment,
    ) -> Result<()> {
        self.store.register_user(user_id).await?;

        let Some(category) = self.store.category_of(user_id).await? else {
            self.notify(user_id, texts::NO_CATEGORY).await;
            return Ok(());
        };

        if let Some(group_id) = group_id {
            // Fragments joining an open group skip the checks — the group
            // was authorized when it opened.
            if self.coalescer.append(&group_id, fragment.clone()) {
                return Ok(());
            }

            if self.store.count_pending(user_id).await? >= self.config.pending_limit {
                self.notify(user_id, texts::TOO_MANY_PENDING).await;
                return Ok(());
            }

            self.coalescer.open(group_id, user_id, category, fragment);
            return Ok(());
        }

        self.accept(user_id, &category, fragment.media, fragment.text)
            .await
    }

    /// Finalize callback target — a coalesced group re-enters the shared
    /// acceptance path here.
    pub async fn accept_group(&self, group: FinalizedGroup) -> Result<()> {
        if group.media_count() > 1 {
            debug!(
                user_id = group.user_id,
                media = group.media_count(),
                "Discarding multi-media group"
            );
            self.notify(group.user_id, texts::MULTI_MEDIA_UNSUPPORTED)
                .await;
            return Ok(());
        }

        let media = group.single_media();
        let text = group.first_text();
        self.accept(group.user_id, &group.category, media, text).await
    }

    /// The single acceptance path for grouped and non-grouped submissions:
    /// conditional create, render to the moderation surface, ack the user.
    async fn accept(
        &self,
        user_id: i64,
        category: &str,
        media: Option<MediaRef>,
        text: Option<String>,
    ) -> Result<()> {
        let outcome = self
            .store
            .create_submission(
                user_id,
                category,
                media.as_ref(),
                text.as_deref(),
                self.config.pending_limit,
            )
            .await?;

        let post_id = match outcome {
            SubmissionOutcome::LimitReached => {
                self.notify(user_id, texts::TOO_MANY_PENDING).await;
                return Ok(());
            }
            SubmissionOutcome::Accepted(post_id) => post_id,
        };

        self.present_for_review(post_id, user_id, category, media, text)
            .await;
        self.notify(user_id, texts::ACCEPTED).await;
        Ok(())
    }

    async fn present_for_review(
        &self,
        post_id: Uuid,
        user_id: i64,
        category: &str,
        media: Option<MediaRef>,
        text: Option<String>,
    ) {
        let item = ReviewItem {
            post_id,
            submitter: user_id,
            category: category.to_string(),
            media,
            text,
        };
        if let Err(e) = self.review.present(&item).await {
            // The post stays pending; a reviewer can still find it once
            // delivery recovers. Never retried here.
            warn!(post_id = %post_id, error = %e, "Failed to render submission for review");
        }
    }

    async fn notify(&self, user_id: i64, message: &str) {
        if let Err(e) = self
            .outbound
            .send_text(&ChatRef::user(user_id), message)
            .await
        {
            warn!(user_id, error = %e, "Failed to deliver notice");
        }
    }

    async fn ack(&self, callback_id: &str, text: Option<&str>) {
        if let Err(e) = self.outbound.ack_action(callback_id, text).await {
            debug!(error = %e, "Failed to ack callback");
        }
    }
}
