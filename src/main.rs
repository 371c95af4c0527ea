use std::path::Path;
use std::sync::Arc;

use curator::config::Config;
use curator::error::ConfigError;
use curator::intake::{IntakeRouter, MediaGroupCoalescer};
use curator::outbound::Outbound;
use curator::publish::Publisher;
use curator::review::ReviewWorkflow;
use curator::store::{LibSqlStore, SubmissionStore};
use curator::supervisor;
use curator::telegram::TelegramClient;
use curator::web;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = Config::from_env().map_err(|e| {
        eprintln!("Error: {e}");
        e
    })?;

    eprintln!("📮 curator v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Review chat: {}", config.review_chat);
    eprintln!("   Channel: {}", config.channel);
    eprintln!("   Pending limit: {}", config.pending_limit);
    eprintln!("   Categories: {}", config.categories.join(", "));
    eprintln!("   Database: {}", config.db_path);

    // ── Database ─────────────────────────────────────────────────────────
    let store: Arc<dyn SubmissionStore> = Arc::new(
        LibSqlStore::new_local(Path::new(&config.db_path))
            .await
            .map_err(|e| {
                eprintln!("Error: Failed to open database at {}: {e}", config.db_path);
                e
            })?,
    );

    // ── Transport + startup probes ───────────────────────────────────────
    // Fail fast: do not start accepting updates with a dead token or an
    // unreachable moderation surface.
    let client = Arc::new(TelegramClient::new(config.bot_token.clone()));
    client
        .probe_identity()
        .await
        .map_err(|e| ConfigError::ProbeFailed(format!("getMe: {e}")))?;
    client
        .probe_chat(&config.review_chat)
        .await
        .map_err(|e| {
            ConfigError::ProbeFailed(format!("moderation chat {}: {e}", config.review_chat))
        })?;
    let outbound: Arc<dyn Outbound> = client.clone();

    // ── Keep-alive endpoint ──────────────────────────────────────────────
    let _health_handle = web::spawn_health_server(config.health_port);

    // ── Pipeline ─────────────────────────────────────────────────────────
    let publisher = Arc::new(Publisher::new(
        Arc::clone(&outbound),
        Arc::clone(&store),
        config.channel.clone(),
    ));
    let review = Arc::new(ReviewWorkflow::new(
        Arc::clone(&outbound),
        Arc::clone(&store),
        publisher,
        config.review_chat.clone(),
    ));

    let (group_tx, mut group_rx) = tokio::sync::mpsc::unbounded_channel();
    let coalescer = MediaGroupCoalescer::new(config.group_window, group_tx);

    let router = Arc::new(IntakeRouter::new(
        config.clone(),
        Arc::clone(&store),
        outbound,
        coalescer,
        review,
    ));

    // Finalized media groups re-enter the shared acceptance path.
    {
        let router = Arc::clone(&router);
        tokio::spawn(async move {
            while let Some(group) = group_rx.recv().await {
                if let Err(e) = router.accept_group(group).await {
                    tracing::error!(error = %e, "Failed to accept finalized media group");
                }
            }
        });
    }

    supervisor::run(client, router, config.restart_delay).await;
    Ok(())
}
