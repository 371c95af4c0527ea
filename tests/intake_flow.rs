//! End-to-end intake tests — real store and coalescer, recorded outbound.
//!
//! The recording double stands in for the Telegram client, so every notice,
//! review render and publish is observable without a network.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;
use tokio::sync::mpsc;
use uuid::Uuid;

use curator::config::Config;
use curator::error::TelegramError;
use curator::intake::coalescer::{FinalizedGroup, MediaGroupCoalescer};
use curator::intake::types::{Action, Command, ContentFragment, InboundEvent};
use curator::intake::IntakeRouter;
use curator::outbound::{Button, ChatRef, MediaKind, MediaRef, MessageId, Outbound};
use curator::publish::Publisher;
use curator::review::ReviewWorkflow;
use curator::store::{LibSqlStore, SubmissionStore};
use curator::texts;

const REVIEW_CHAT: &str = "-100500";
const CHANNEL: &str = "@public_channel";

// ── Recording outbound double ───────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Sent {
    Text {
        chat: String,
        text: String,
    },
    Media {
        chat: String,
        kind: MediaKind,
        file_ref: String,
        caption: Option<String>,
    },
    Prompt {
        chat: String,
        text: String,
        actions: Vec<String>,
        message_id: MessageId,
    },
    Cleared {
        chat: String,
        message_id: MessageId,
    },
    Ack {
        callback_id: String,
        text: Option<String>,
    },
}

#[derive(Default)]
struct RecordingOutbound {
    sent: Mutex<Vec<Sent>>,
    next_id: AtomicI64,
}

impl RecordingOutbound {
    fn all(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    fn texts_to(&self, chat: &str) -> Vec<String> {
        self.all()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Text { chat: c, text } if c == chat => Some(text),
                _ => None,
            })
            .collect()
    }

    fn media_to(&self, chat: &str) -> Vec<(MediaKind, String, Option<String>)> {
        self.all()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Media {
                    chat: c,
                    kind,
                    file_ref,
                    caption,
                } if c == chat => Some((kind, file_ref, caption)),
                _ => None,
            })
            .collect()
    }

    /// Decision tags from the latest prompt sent to the review chat.
    fn last_decision_prompt(&self) -> (MessageId, Vec<String>) {
        self.all()
            .into_iter()
            .rev()
            .find_map(|s| match s {
                Sent::Prompt {
                    chat,
                    actions,
                    message_id,
                    ..
                } if chat == REVIEW_CHAT => Some((message_id, actions)),
                _ => None,
            })
            .expect("no decision prompt was sent")
    }

    fn count_to(&self, chat: &str) -> usize {
        self.all()
            .iter()
            .filter(|s| match s {
                Sent::Text { chat: c, .. }
                | Sent::Media { chat: c, .. }
                | Sent::Prompt { chat: c, .. } => c == chat,
                _ => false,
            })
            .count()
    }

    fn record(&self, sent: Sent) {
        self.sent.lock().unwrap().push(sent);
    }
}

#[async_trait]
impl Outbound for RecordingOutbound {
    async fn send_text(&self, chat: &ChatRef, text: &str) -> Result<MessageId, TelegramError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.record(Sent::Text {
            chat: chat.as_str().to_string(),
            text: text.to_string(),
        });
        Ok(id)
    }

    async fn send_media(
        &self,
        chat: &ChatRef,
        media: &MediaRef,
        caption: Option<&str>,
    ) -> Result<MessageId, TelegramError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.record(Sent::Media {
            chat: chat.as_str().to_string(),
            kind: media.kind,
            file_ref: media.file_ref.clone(),
            caption: caption.map(str::to_string),
        });
        Ok(id)
    }

    async fn send_prompt(
        &self,
        chat: &ChatRef,
        text: &str,
        buttons: &[Button],
    ) -> Result<MessageId, TelegramError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.record(Sent::Prompt {
            chat: chat.as_str().to_string(),
            text: text.to_string(),
            actions: buttons.iter().map(|b| b.action.clone()).collect(),
            message_id: id,
        });
        Ok(id)
    }

    async fn clear_buttons(
        &self,
        chat: &ChatRef,
        message: MessageId,
    ) -> Result<(), TelegramError> {
        self.record(Sent::Cleared {
            chat: chat.as_str().to_string(),
            message_id: message,
        });
        Ok(())
    }

    async fn ack_action(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), TelegramError> {
        self.record(Sent::Ack {
            callback_id: callback_id.to_string(),
            text: text.map(str::to_string),
        });
        Ok(())
    }
}

// ── Harness ─────────────────────────────────────────────────────────

struct TestBot {
    router: Arc<IntakeRouter>,
    outbound: Arc<RecordingOutbound>,
    store: Arc<dyn SubmissionStore>,
    group_rx: mpsc::UnboundedReceiver<FinalizedGroup>,
}

fn test_config() -> Config {
    Config {
        bot_token: SecretString::from("test-token"),
        review_chat: ChatRef::new(REVIEW_CHAT),
        channel: ChatRef::new(CHANNEL),
        pending_limit: 3,
        // Short real window keeps the group tests fast; fragments are
        // appended in microseconds, far inside it.
        group_window: Duration::from_millis(150),
        restart_delay: Duration::from_secs(5),
        db_path: ":memory:".into(),
        health_port: 0,
        categories: ["joke", "meme", "story", "news"]
            .iter()
            .map(ToString::to_string)
            .collect(),
    }
}

async fn bot() -> TestBot {
    let config = test_config();
    let store: Arc<dyn SubmissionStore> = Arc::new(LibSqlStore::new_memory().await.unwrap());
    let outbound = Arc::new(RecordingOutbound::default());
    let outbound_dyn: Arc<dyn Outbound> = outbound.clone();

    let publisher = Arc::new(Publisher::new(
        Arc::clone(&outbound_dyn),
        Arc::clone(&store),
        config.channel.clone(),
    ));
    let review = Arc::new(ReviewWorkflow::new(
        Arc::clone(&outbound_dyn),
        Arc::clone(&store),
        publisher,
        config.review_chat.clone(),
    ));

    let (group_tx, group_rx) = mpsc::unbounded_channel();
    let coalescer = MediaGroupCoalescer::new(config.group_window, group_tx);

    let router = Arc::new(IntakeRouter::new(
        config,
        Arc::clone(&store),
        outbound_dyn,
        coalescer,
        review,
    ));

    TestBot {
        router,
        outbound,
        store,
        group_rx,
    }
}

impl TestBot {
    async fn send(&self, event: InboundEvent) {
        self.router.handle(event).await.unwrap();
    }

    async fn select_category(&self, user_id: i64, slug: &str) {
        self.send(InboundEvent::Command {
            user_id,
            command: Command::Start,
        })
        .await;
        self.send(InboundEvent::Action {
            user_id,
            callback_id: format!("cb-cat-{user_id}"),
            prompt: None,
            action: Action::SelectCategory(slug.into()),
        })
        .await;
    }

    async fn send_text_content(&self, user_id: i64, text: &str) {
        self.send(InboundEvent::Content {
            user_id,
            group_id: None,
            fragment: ContentFragment {
                text: Some(text.into()),
                media: None,
            },
        })
        .await;
    }

    async fn send_group_fragment(&self, user_id: i64, group_id: &str, fragment: ContentFragment) {
        self.send(InboundEvent::Content {
            user_id,
            group_id: Some(group_id.into()),
            fragment,
        })
        .await;
    }

    /// Drain one finalized group from the coalescer into the router, the way
    /// the group-consumer task does in production.
    async fn finalize_group(&mut self) {
        let group = self
            .group_rx
            .recv()
            .await
            .expect("a group should have finalized");
        self.router.accept_group(group).await.unwrap();
    }

    /// Tap a decision button from the latest review prompt.
    async fn tap(&self, reviewer: i64, tag: &str, callback_id: &str, prompt_id: MessageId) {
        let action = Action::parse(tag).expect("decision tag must decode");
        self.send(InboundEvent::Action {
            user_id: reviewer,
            callback_id: callback_id.into(),
            prompt: Some((ChatRef::new(REVIEW_CHAT), prompt_id)),
            action,
        })
        .await;
    }
}

fn photo(file_ref: &str, caption: Option<&str>) -> ContentFragment {
    ContentFragment {
        text: caption.map(str::to_string),
        media: Some(MediaRef {
            kind: MediaKind::Photo,
            file_ref: file_ref.into(),
        }),
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn content_without_category_is_refused() {
    let bot = bot().await;

    bot.send_text_content(7, "too early").await;

    assert_eq!(bot.outbound.texts_to("7"), vec![texts::NO_CATEGORY]);
    assert_eq!(bot.store.count_pending(7).await.unwrap(), 0);
    assert_eq!(bot.outbound.count_to(REVIEW_CHAT), 0);
}

#[tokio::test]
async fn accepted_text_submission_reaches_review() {
    let bot = bot().await;
    bot.select_category(7, "news").await;

    bot.send_text_content(7, "launch day").await;

    // Review chat got the content and a two-action prompt.
    let review_texts = bot.outbound.texts_to(REVIEW_CHAT);
    assert_eq!(review_texts, vec!["launch day"]);
    let (_, actions) = bot.outbound.last_decision_prompt();
    assert_eq!(actions.len(), 2);
    assert!(actions[0].starts_with("approve:"));
    assert!(actions[1].starts_with("reject:"));

    // Submitter was told the submission is in.
    assert!(bot.outbound.texts_to("7").contains(&texts::ACCEPTED.to_string()));
    assert_eq!(bot.store.count_pending(7).await.unwrap(), 1);
}

#[tokio::test]
async fn end_to_end_rejection_flow() {
    let bot = bot().await;
    bot.select_category(7, "news").await;
    bot.send_text_content(7, "launch day").await;

    let (prompt_id, actions) = bot.outbound.last_decision_prompt();
    let reject_tag = actions
        .iter()
        .find(|a| a.starts_with("reject:"))
        .unwrap()
        .clone();

    bot.tap(1000, &reject_tag, "cb-decision", prompt_id).await;

    // Post left pending, submitter notified once, channel silent.
    assert_eq!(bot.store.count_pending(7).await.unwrap(), 0);
    let user_texts = bot.outbound.texts_to("7");
    assert_eq!(
        user_texts
            .iter()
            .filter(|t| *t == texts::REJECTED_NOTICE)
            .count(),
        1
    );
    assert_eq!(bot.outbound.count_to(CHANNEL), 0);

    // The prompt's controls were cleared.
    assert!(bot.outbound.all().contains(&Sent::Cleared {
        chat: REVIEW_CHAT.into(),
        message_id: prompt_id,
    }));
}

#[tokio::test]
async fn approval_publishes_with_hashtag_and_notifies() {
    let bot = bot().await;
    bot.select_category(7, "joke").await;
    bot.send_text_content(7, "hello").await;

    let (prompt_id, actions) = bot.outbound.last_decision_prompt();
    let approve_tag = actions
        .iter()
        .find(|a| a.starts_with("approve:"))
        .unwrap()
        .clone();

    bot.tap(1000, &approve_tag, "cb-decision", prompt_id).await;

    assert_eq!(
        bot.outbound.texts_to(CHANNEL),
        vec!["hello\n\n#joke".to_string()]
    );
    assert!(
        bot.outbound
            .texts_to("7")
            .contains(&texts::APPROVED_NOTICE.to_string())
    );
}

#[tokio::test]
async fn second_decision_on_same_post_is_a_no_op() {
    let bot = bot().await;
    bot.select_category(7, "joke").await;
    bot.send_text_content(7, "hello").await;

    let (prompt_id, actions) = bot.outbound.last_decision_prompt();
    let approve_tag = actions
        .iter()
        .find(|a| a.starts_with("approve:"))
        .unwrap()
        .clone();
    let reject_tag = actions
        .iter()
        .find(|a| a.starts_with("reject:"))
        .unwrap()
        .clone();

    bot.tap(1000, &approve_tag, "cb-1", prompt_id).await;
    bot.tap(1001, &approve_tag, "cb-2", prompt_id).await;
    bot.tap(1002, &reject_tag, "cb-3", prompt_id).await;

    // Exactly one publish, one approval notice, zero rejection notices.
    assert_eq!(bot.outbound.texts_to(CHANNEL).len(), 1);
    let user_texts = bot.outbound.texts_to("7");
    assert_eq!(
        user_texts
            .iter()
            .filter(|t| *t == texts::APPROVED_NOTICE)
            .count(),
        1
    );
    assert!(!user_texts.contains(&texts::REJECTED_NOTICE.to_string()));

    // Stale taps were acknowledged as already decided.
    let stale_acks: Vec<_> = bot
        .outbound
        .all()
        .into_iter()
        .filter(|s| {
            matches!(s, Sent::Ack { text, .. } if text.as_deref() == Some(texts::ALREADY_DECIDED))
        })
        .collect();
    assert_eq!(stale_acks.len(), 2);
}

#[tokio::test]
async fn decision_on_unknown_post_changes_nothing() {
    let bot = bot().await;

    let tag = format!("approve:{}", Uuid::new_v4());
    bot.tap(1000, &tag, "cb-ghost", 999).await;

    assert_eq!(bot.outbound.count_to(CHANNEL), 0);
    // Only the "already decided" ack goes out; nothing is cleared.
    assert!(
        bot.outbound
            .all()
            .iter()
            .all(|s| matches!(s, Sent::Ack { .. }))
    );
}

#[tokio::test]
async fn pending_limit_rejects_the_fourth_submission() {
    let bot = bot().await;
    bot.select_category(7, "meme").await;

    for i in 0..3 {
        bot.send_text_content(7, &format!("submission {i}")).await;
    }
    assert_eq!(bot.store.count_pending(7).await.unwrap(), 3);

    bot.send_text_content(7, "one too many").await;

    assert_eq!(bot.store.count_pending(7).await.unwrap(), 3);
    assert!(
        bot.outbound
            .texts_to("7")
            .contains(&texts::TOO_MANY_PENDING.to_string())
    );
    // The review chat saw only the three accepted submissions (3 contents
    // + 3 prompts).
    assert_eq!(bot.outbound.count_to(REVIEW_CHAT), 6);
}

#[tokio::test]
async fn media_group_with_single_photo_becomes_one_post() {
    let mut bot = bot().await;
    bot.select_category(7, "meme").await;

    bot.send_group_fragment(7, "g-1", photo("file-a", None)).await;
    bot.send_group_fragment(
        7,
        "g-1",
        ContentFragment {
            text: Some("the caption".into()),
            media: None,
        },
    )
    .await;

    bot.finalize_group().await;

    assert_eq!(bot.store.count_pending(7).await.unwrap(), 1);
    let media = bot.outbound.media_to(REVIEW_CHAT);
    assert_eq!(media.len(), 1);
    assert_eq!(media[0].0, MediaKind::Photo);
    assert_eq!(media[0].1, "file-a");
    assert_eq!(media[0].2.as_deref(), Some("the caption"));
    assert!(bot.outbound.texts_to("7").contains(&texts::ACCEPTED.to_string()));
}

#[tokio::test]
async fn media_group_with_two_photos_is_discarded() {
    let mut bot = bot().await;
    bot.select_category(7, "meme").await;

    bot.send_group_fragment(7, "g-1", photo("file-a", None)).await;
    bot.send_group_fragment(7, "g-1", photo("file-b", Some("cap"))).await;

    bot.finalize_group().await;

    assert_eq!(bot.store.count_pending(7).await.unwrap(), 0);
    assert_eq!(bot.outbound.count_to(REVIEW_CHAT), 0);
    let user_texts = bot.outbound.texts_to("7");
    assert_eq!(
        user_texts
            .iter()
            .filter(|t| *t == texts::MULTI_MEDIA_UNSUPPORTED)
            .count(),
        1
    );
    assert!(!user_texts.contains(&texts::ACCEPTED.to_string()));
}

#[tokio::test]
async fn fragments_after_the_window_start_a_second_submission() {
    let mut bot = bot().await;
    bot.select_category(7, "meme").await;

    bot.send_group_fragment(7, "g-1", photo("file-a", None)).await;
    bot.finalize_group().await;

    // Straggler under the same group id: a new group, a new post.
    bot.send_group_fragment(7, "g-1", photo("file-b", None)).await;
    bot.finalize_group().await;

    assert_eq!(bot.store.count_pending(7).await.unwrap(), 2);
    let media = bot.outbound.media_to(REVIEW_CHAT);
    assert_eq!(media.len(), 2);
}

#[tokio::test]
async fn category_can_be_changed_between_submissions() {
    let bot = bot().await;
    bot.select_category(7, "joke").await;
    bot.send_text_content(7, "first").await;

    bot.select_category(7, "news").await;
    bot.send_text_content(7, "second").await;

    let prompts: Vec<String> = bot
        .outbound
        .all()
        .into_iter()
        .filter_map(|s| match s {
            Sent::Prompt { chat, text, .. } if chat == REVIEW_CHAT => Some(text),
            _ => None,
        })
        .collect();
    assert!(prompts[0].contains("#joke"));
    assert!(prompts[1].contains("#news"));
}

#[tokio::test]
async fn unknown_category_selection_is_ignored() {
    let bot = bot().await;
    bot.send(InboundEvent::Command {
        user_id: 7,
        command: Command::Start,
    })
    .await;
    bot.send(InboundEvent::Action {
        user_id: 7,
        callback_id: "cb-bad".into(),
        prompt: None,
        action: Action::SelectCategory("not-a-category".into()),
    })
    .await;

    assert_eq!(bot.store.category_of(7).await.unwrap(), None);
    bot.send_text_content(7, "still no category").await;
    assert!(bot.outbound.texts_to("7").contains(&texts::NO_CATEGORY.to_string()));
}
