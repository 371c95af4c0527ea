//! curator — submission intake and moderation bot.
//!
//! Users submit text, photos and videos over Telegram; each submission goes
//! through a human moderation step and, once approved, is republished to a
//! public channel with its category hashtag.

pub mod config;
pub mod error;
pub mod intake;
pub mod outbound;
pub mod publish;
pub mod review;
pub mod store;
pub mod supervisor;
pub mod telegram;
pub mod texts;
pub mod web;
