//! The `SubmissionStore` trait — single async interface for all persistence.
//!
//! Every operation is atomic on the store side: either it completes and all
//! of its writes are visible, or it fails and none are. Callers never retry;
//! a failed operation aborts the request that triggered it.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::outbound::MediaRef;

/// Moderation status of a post.
///
/// Transitions exactly once, `Pending` → `Approved` or `Pending` →
/// `Rejected`. Terminal states are immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostStatus {
    Pending,
    Approved,
    Rejected,
}

impl PostStatus {
    /// Stable DB string form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// A moderator's decision on a pending post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    /// The terminal status this decision transitions a pending post into.
    pub fn target_status(self) -> PostStatus {
        match self {
            Self::Approve => PostStatus::Approved,
            Self::Reject => PostStatus::Rejected,
        }
    }
}

/// Outcome of a submission attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// The post and its attachments were created in one transaction.
    Accepted(Uuid),
    /// The submitter already has `max_pending` posts awaiting review.
    LimitReached,
}

/// Everything the publisher needs for one approved post.
///
/// `user_id` and `category` ride along with the content so the publisher can
/// notify the submitter and build the hashtag without a second lookup.
#[derive(Debug, Clone)]
pub struct PublishPayload {
    pub user_id: i64,
    pub category: String,
    pub text: Option<String>,
    pub media: Option<MediaRef>,
}

/// Backend-agnostic store covering users, posts, media and text content.
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Create the user row if it does not exist; always touches
    /// `last_activity`. Idempotent.
    async fn register_user(&self, user_id: i64) -> Result<(), DatabaseError>;

    /// Set the user's selected submission category.
    async fn set_category(&self, user_id: i64, category: &str) -> Result<(), DatabaseError>;

    /// The user's currently selected category, if any.
    async fn category_of(&self, user_id: i64) -> Result<Option<String>, DatabaseError>;

    /// Number of the user's posts currently in `pending` status.
    async fn count_pending(&self, user_id: i64) -> Result<i64, DatabaseError>;

    /// Create a post with its media/text attached, in one transaction.
    ///
    /// The pending-count check runs inside the same transaction that would
    /// insert, so concurrent submissions from one user can never jointly
    /// exceed `max_pending`. Returns `LimitReached` without writing anything
    /// when the user is at the limit.
    async fn create_submission(
        &self,
        user_id: i64,
        category: &str,
        media: Option<&MediaRef>,
        text: Option<&str>,
        max_pending: i64,
    ) -> Result<SubmissionOutcome, DatabaseError>;

    /// Apply a decision, transitioning the post only if it is still pending.
    ///
    /// Returns the status the post had *before* the call — `Some(Pending)`
    /// means this call performed the transition, anything else means the
    /// decision was stale or the id unknown (`None`). Exactly one caller per
    /// post ever observes `Some(Pending)`.
    async fn decide(
        &self,
        post_id: Uuid,
        decision: Decision,
    ) -> Result<Option<PostStatus>, DatabaseError>;

    /// Load a post's content for republishing.
    async fn load_for_publish(&self, post_id: Uuid) -> Result<PublishPayload, DatabaseError>;
}
