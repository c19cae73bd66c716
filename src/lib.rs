//! hubrelay polls RSSHub feeds on a schedule and relays new items to a
//! Telegram chat.
//!
//! The pieces, in pipeline order:
//!
//! - [`feed`] - fetch and normalize feed snapshots (network or fixtures)
//! - [`dedup`] - remember which items were already delivered
//! - [`compose`] - render new items into size-bounded HTML messages
//! - [`sink`] - deliver messages (Telegram, or the log when simulating)
//! - [`dispatcher`] - one poll cycle over all feeds
//! - [`schedule`] / [`trigger`] - when cycles run
//! - [`config`] - file, environment and flag settings

pub mod compose;
pub mod config;
pub mod dedup;
pub mod dispatcher;
pub mod feed;
pub mod schedule;
pub mod sink;
pub mod trigger;
pub mod util;
