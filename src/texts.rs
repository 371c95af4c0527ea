//! User-facing message strings.
//!
//! Kept in one place so the wording can be swapped without touching the
//! pipeline. Everything the bot says to submitters or reviewers lives here.

/// Greeting for `/start` and `/write`, shown above the category keyboard.
pub const CHOOSE_CATEGORY: &str =
    "Hi! Pick a category for your submission, then send me the content.";

/// Acknowledgement after a category is selected.
pub const CATEGORY_SAVED: &str = "Got it. Now send me your text, photo or video.";

/// Content arrived before any category was selected.
pub const NO_CATEGORY: &str = "Please choose a category first — send /start to pick one.";

/// The per-user pending limit was hit.
pub const TOO_MANY_PENDING: &str =
    "You already have submissions waiting for review. Please wait for a decision before sending more.";

/// A media group carried more than one photo/video.
pub const MULTI_MEDIA_UNSUPPORTED: &str =
    "Albums with several photos or videos aren't supported — please send a single photo or video.";

/// Submission accepted into the moderation queue.
pub const ACCEPTED: &str = "Thanks! Your submission was sent to the moderators.";

/// Submission approved and republished.
pub const APPROVED_NOTICE: &str = "Good news — your submission was approved and published!";

/// Submission rejected by a moderator.
pub const REJECTED_NOTICE: &str = "Sorry, your submission was rejected by the moderators.";

/// Toast shown to a reviewer whose decision landed.
pub const DECISION_RECORDED: &str = "Decision recorded.";

/// Toast shown to a reviewer who tapped a prompt that was already decided.
pub const ALREADY_DECIDED: &str = "This submission was already decided.";

/// Labels for the decision prompt buttons.
pub const APPROVE_BUTTON: &str = "✅ Approve";
pub const REJECT_BUTTON: &str = "❌ Reject";
