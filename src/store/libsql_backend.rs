//! libSQL backend — async `SubmissionStore` implementation.
//!
//! A single connection is reused for all operations. The two
//! read-modify-write operations (`create_submission`, `decide`) run inside a
//! transaction and additionally hold the store-level write lock, so the
//! "read state, decide, write state" sequence is never interleaved with
//! another writer on the shared connection. Plain reads and single-statement
//! writes go straight to the connection.

use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, params};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::outbound::{MediaKind, MediaRef};
use crate::store::migrations;
use crate::store::traits::{
    Decision, PostStatus, PublishPayload, SubmissionOutcome, SubmissionStore,
};

/// libSQL submission store.
pub struct LibSqlStore {
    conn: Connection,
    /// Serializes the transactional read-modify-write operations.
    write_lock: Mutex<()>,
}

impl LibSqlStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Connection(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Connection(format!("Failed to open database: {e}")))?;
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Connection(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;
        info!(path = %path.display(), "Database opened");
        Ok(Self {
            conn,
            write_lock: Mutex::new(()),
        })
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Connection(format!("Failed to create in-memory database: {e}"))
            })?;
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Connection(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;
        Ok(Self {
            conn,
            write_lock: Mutex::new(()),
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

/// Read a post's status inside an open transaction/connection scope.
async fn read_status(
    conn: &Connection,
    post_id: &str,
) -> Result<Option<PostStatus>, DatabaseError> {
    let mut rows = conn
        .query(
            "SELECT status FROM posts WHERE id = ?1",
            params![post_id],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("read_status: {e}")))?;

    match rows.next().await {
        Ok(Some(row)) => {
            let raw: String = row
                .get(0)
                .map_err(|e| DatabaseError::Query(format!("read_status row: {e}")))?;
            PostStatus::parse(&raw).map(Some).ok_or_else(|| {
                DatabaseError::Query(format!("unknown post status {raw:?} for {post_id}"))
            })
        }
        Ok(None) => Ok(None),
        Err(e) => Err(DatabaseError::Query(format!("read_status: {e}"))),
    }
}

#[async_trait]
impl SubmissionStore for LibSqlStore {
    async fn register_user(&self, user_id: i64) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "INSERT INTO users (id, last_activity) VALUES (?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET last_activity = ?2",
                params![user_id, now],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("register_user: {e}")))?;
        Ok(())
    }

    async fn set_category(&self, user_id: i64, category: &str) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "INSERT INTO users (id, category, last_activity) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET category = ?2, last_activity = ?3",
                params![user_id, category, now],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("set_category: {e}")))?;
        debug!(user_id, category, "Category set");
        Ok(())
    }

    async fn category_of(&self, user_id: i64) -> Result<Option<String>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT category FROM users WHERE id = ?1",
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("category_of: {e}")))?;

        match rows.next().await {
            // A NULL category reads back as an error; treat it as unset.
            Ok(Some(row)) => Ok(row.get::<String>(0).ok()),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("category_of: {e}"))),
        }
    }

    async fn count_pending(&self, user_id: i64) -> Result<i64, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT COUNT(*) FROM posts WHERE user_id = ?1 AND status = 'pending'",
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("count_pending: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => row
                .get::<i64>(0)
                .map_err(|e| DatabaseError::Query(format!("count_pending row: {e}"))),
            Ok(None) => Ok(0),
            Err(e) => Err(DatabaseError::Query(format!("count_pending: {e}"))),
        }
    }

    async fn create_submission(
        &self,
        user_id: i64,
        category: &str,
        media: Option<&MediaRef>,
        text: Option<&str>,
        max_pending: i64,
    ) -> Result<SubmissionOutcome, DatabaseError> {
        let _guard = self.write_lock.lock().await;

        let tx = self
            .conn()
            .transaction()
            .await
            .map_err(|e| DatabaseError::Transaction(format!("create_submission begin: {e}")))?;

        // Re-check the pending count inside the transaction: this is the
        // moment the limit invariant is enforced.
        let mut rows = tx
            .query(
                "SELECT COUNT(*) FROM posts WHERE user_id = ?1 AND status = 'pending'",
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("create_submission count: {e}")))?;
        let pending: i64 = match rows.next().await {
            Ok(Some(row)) => row
                .get(0)
                .map_err(|e| DatabaseError::Query(format!("create_submission count row: {e}")))?,
            _ => 0,
        };
        drop(rows);

        if pending >= max_pending {
            tx.rollback()
                .await
                .map_err(|e| DatabaseError::Transaction(format!("create_submission abort: {e}")))?;
            debug!(user_id, pending, max_pending, "Submission over pending limit");
            return Ok(SubmissionOutcome::LimitReached);
        }

        let post_id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();
        tx.execute(
            "INSERT INTO posts (id, user_id, category, status, created_at)
             VALUES (?1, ?2, ?3, 'pending', ?4)",
            params![post_id.to_string(), user_id, category, now],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("create_submission post: {e}")))?;

        if let Some(media) = media {
            tx.execute(
                "INSERT INTO media (id, post_id, file_ref, kind) VALUES (?1, ?2, ?3, ?4)",
                params![
                    Uuid::new_v4().to_string(),
                    post_id.to_string(),
                    media.file_ref.as_str(),
                    media.kind.as_str(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("create_submission media: {e}")))?;
        }

        if let Some(text) = text {
            tx.execute(
                "INSERT INTO texts (post_id, content) VALUES (?1, ?2)",
                params![post_id.to_string(), text],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("create_submission text: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| DatabaseError::Transaction(format!("create_submission commit: {e}")))?;

        info!(post_id = %post_id, user_id, category, "Submission persisted");
        Ok(SubmissionOutcome::Accepted(post_id))
    }

    async fn decide(
        &self,
        post_id: Uuid,
        decision: Decision,
    ) -> Result<Option<PostStatus>, DatabaseError> {
        let _guard = self.write_lock.lock().await;

        let tx = self
            .conn()
            .transaction()
            .await
            .map_err(|e| DatabaseError::Transaction(format!("decide begin: {e}")))?;

        let id = post_id.to_string();
        let prior = read_status(&tx, &id).await?;

        match prior {
            Some(PostStatus::Pending) => {
                tx.execute(
                    "UPDATE posts SET status = ?1 WHERE id = ?2 AND status = 'pending'",
                    params![decision.target_status().as_str(), id],
                )
                .await
                .map_err(|e| DatabaseError::Query(format!("decide update: {e}")))?;
                tx.commit()
                    .await
                    .map_err(|e| DatabaseError::Transaction(format!("decide commit: {e}")))?;
                info!(post_id = %post_id, status = decision.target_status().as_str(), "Post decided");
            }
            _ => {
                // Stale decision or unknown id: nothing to write.
                tx.rollback()
                    .await
                    .map_err(|e| DatabaseError::Transaction(format!("decide abort: {e}")))?;
            }
        }

        Ok(prior)
    }

    async fn load_for_publish(&self, post_id: Uuid) -> Result<PublishPayload, DatabaseError> {
        let conn = self.conn();
        let id = post_id.to_string();

        let mut rows = conn
            .query(
                "SELECT user_id, category FROM posts WHERE id = ?1",
                params![id.clone()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("load_for_publish post: {e}")))?;
        let (user_id, category) = match rows.next().await {
            Ok(Some(row)) => {
                let user_id: i64 = row
                    .get(0)
                    .map_err(|e| DatabaseError::Query(format!("load_for_publish row: {e}")))?;
                let category: String = row
                    .get(1)
                    .map_err(|e| DatabaseError::Query(format!("load_for_publish row: {e}")))?;
                (user_id, category)
            }
            Ok(None) => {
                return Err(DatabaseError::NotFound {
                    entity: "post".into(),
                    id,
                });
            }
            Err(e) => return Err(DatabaseError::Query(format!("load_for_publish post: {e}"))),
        };

        let mut rows = conn
            .query(
                "SELECT content FROM texts WHERE post_id = ?1",
                params![id.clone()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("load_for_publish text: {e}")))?;
        let text: Option<String> = match rows.next().await {
            Ok(Some(row)) => Some(
                row.get(0)
                    .map_err(|e| DatabaseError::Query(format!("load_for_publish text row: {e}")))?,
            ),
            Ok(None) => None,
            Err(e) => return Err(DatabaseError::Query(format!("load_for_publish text: {e}"))),
        };

        let mut rows = conn
            .query(
                "SELECT file_ref, kind FROM media WHERE post_id = ?1",
                params![id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("load_for_publish media: {e}")))?;
        let media: Option<MediaRef> = match rows.next().await {
            Ok(Some(row)) => {
                let file_ref: String = row
                    .get(0)
                    .map_err(|e| DatabaseError::Query(format!("load_for_publish media row: {e}")))?;
                let kind_raw: String = row
                    .get(1)
                    .map_err(|e| DatabaseError::Query(format!("load_for_publish media row: {e}")))?;
                let kind = MediaKind::parse(&kind_raw).ok_or_else(|| {
                    DatabaseError::Query(format!("unknown media kind {kind_raw:?}"))
                })?;
                Some(MediaRef { kind, file_ref })
            }
            Ok(None) => None,
            Err(e) => return Err(DatabaseError::Query(format!("load_for_publish media: {e}"))),
        };

        Ok(PublishPayload {
            user_id,
            category,
            text,
            media,
        })
    }
}
