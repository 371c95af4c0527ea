//! Supervisor — keeps the update-receiving loop alive.
//!
//! The loop itself only returns by failing; the supervisor logs the failure
//! with a running restart count and re-enters after a fixed delay, forever.
//! This is a crash-resilience measure, not a correctness mechanism — per-
//! update handler errors are logged on their own worker tasks and never
//! bring the loop down.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{error, info};

use crate::intake::IntakeRouter;
use crate::telegram::TelegramClient;

/// Run the supervised update loop. Never returns.
pub async fn run(client: Arc<TelegramClient>, router: Arc<IntakeRouter>, restart_delay: Duration) {
    let mut restarts: u64 = 0;
    loop {
        if let Err(err) = poll_updates(&client, &router).await {
            restarts += 1;
            error!(
                error = %format!("{err:#}"),
                restarts,
                delay_secs = restart_delay.as_secs(),
                "Update loop crashed; restarting"
            );
        }
        tokio::time::sleep(restart_delay).await;
    }
}

/// Long-poll `getUpdates` and fan each update out to its own worker task.
///
/// Related updates (fragments of one media group, a decision racing a
/// duplicate tap) may land on different workers; every shared structure they
/// touch is safe for that.
async fn poll_updates(
    client: &Arc<TelegramClient>,
    router: &Arc<IntakeRouter>,
) -> anyhow::Result<()> {
    info!("Update loop listening");
    let mut offset: i64 = 0;

    loop {
        let updates = client
            .get_updates(offset)
            .await
            .context("getUpdates failed")?;

        for update in updates {
            offset = offset.max(update.update_id + 1);

            let Some(event) = update.into_event() else {
                continue;
            };

            let router = Arc::clone(router);
            tokio::spawn(async move {
                if let Err(e) = router.handle(event).await {
                    // Aborts this request only; no retry.
                    error!(error = %e, "Update handler failed");
                }
            });
        }
    }
}
