//! Persistence — submission store trait and the libSQL backend.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlStore;
pub use traits::{Decision, PostStatus, PublishPayload, SubmissionOutcome, SubmissionStore};
