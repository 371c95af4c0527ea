//! Media-group coalescer — buffers multi-fragment submissions.
//!
//! Telegram delivers an album as separate messages sharing a
//! `media_group_id`. The coalescer buffers them and finalizes the group a
//! fixed window after the FIRST fragment arrived; later fragments join the
//! buffer but never extend the window. Finalization removes the group from
//! the map atomically, so the finalize body runs exactly once even when a
//! fragment races the timer — a fragment landing after removal simply opens
//! a fresh group under the same id, which is accepted behavior, not a bug.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::debug;

use crate::intake::types::ContentFragment;
use crate::outbound::MediaRef;

/// A buffered, not-yet-finalized media group.
struct PendingGroup {
    user_id: i64,
    category: String,
    fragments: Vec<ContentFragment>,
}

/// A group whose window elapsed — the union of fragments received in time.
#[derive(Debug, Clone)]
pub struct FinalizedGroup {
    pub user_id: i64,
    pub category: String,
    pub fragments: Vec<ContentFragment>,
}

impl FinalizedGroup {
    /// Number of media-bearing fragments in the group.
    pub fn media_count(&self) -> usize {
        self.fragments.iter().filter(|f| f.media.is_some()).count()
    }

    /// The group's single media reference, if any.
    pub fn single_media(&self) -> Option<MediaRef> {
        self.fragments.iter().find_map(|f| f.media.clone())
    }

    /// First non-empty caption/text among the fragments.
    pub fn first_text(&self) -> Option<String> {
        self.fragments
            .iter()
            .find_map(|f| f.text.as_deref().filter(|t| !t.trim().is_empty()))
            .map(str::to_string)
    }
}

/// Buffers media-group fragments and emits `FinalizedGroup`s on a channel.
///
/// The lock guards only map operations and is never held across an await.
pub struct MediaGroupCoalescer {
    groups: Mutex<HashMap<String, PendingGroup>>,
    window: Duration,
    tx: mpsc::UnboundedSender<FinalizedGroup>,
}

impl MediaGroupCoalescer {
    pub fn new(window: Duration, tx: mpsc::UnboundedSender<FinalizedGroup>) -> Arc<Self> {
        Arc::new(Self {
            groups: Mutex::new(HashMap::new()),
            window,
            tx,
        })
    }

    /// Append a fragment to an already-open group.
    ///
    /// Returns `false` when no group is open under this id — either the
    /// first fragment hasn't arrived or the group already finalized — in
    /// which case the caller runs the acceptance checks and calls `open`.
    pub fn append(&self, group_id: &str, fragment: ContentFragment) -> bool {
        let mut groups = self.groups.lock().expect("group map poisoned");
        match groups.get_mut(group_id) {
            Some(group) => {
                group.fragments.push(fragment);
                true
            }
            None => false,
        }
    }

    /// Open a group with its first fragment and schedule the one-shot
    /// finalize at `window` from now.
    ///
    /// If a racing fragment opened the group between the caller's `append`
    /// and this call, the fragment joins the existing buffer and no second
    /// timer is started.
    pub fn open(
        self: &Arc<Self>,
        group_id: String,
        user_id: i64,
        category: String,
        first: ContentFragment,
    ) {
        {
            let mut groups = self.groups.lock().expect("group map poisoned");
            match groups.entry(group_id.clone()) {
                Entry::Occupied(mut entry) => {
                    entry.get_mut().fragments.push(first);
                    return;
                }
                Entry::Vacant(entry) => {
                    entry.insert(PendingGroup {
                        user_id,
                        category,
                        fragments: vec![first],
                    });
                }
            }
        }

        debug!(group_id = %group_id, user_id, "Media group opened");

        let coalescer = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(coalescer.window).await;
            coalescer.finalize(&group_id);
        });
    }

    /// Timer body: atomically remove the group and emit it. A group that was
    /// already removed (shouldn't happen — each group gets one timer) is a
    /// silent no-op.
    fn finalize(&self, group_id: &str) {
        let group = {
            let mut groups = self.groups.lock().expect("group map poisoned");
            groups.remove(group_id)
        };

        let Some(group) = group else { return };

        debug!(
            group_id = %group_id,
            fragments = group.fragments.len(),
            "Media group finalized"
        );

        // Receiver gone means shutdown; nothing useful to do with the group.
        let _ = self.tx.send(FinalizedGroup {
            user_id: group.user_id,
            category: group.category,
            fragments: group.fragments,
        });
    }
}
