//! Submission intake — event types, media-group coalescing, routing.

pub mod coalescer;
pub mod router;
pub mod types;

pub use coalescer::{FinalizedGroup, MediaGroupCoalescer};
pub use router::IntakeRouter;
pub use types::{Action, Command, ContentFragment, InboundEvent};
