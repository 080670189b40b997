//! A858 stats bot library.
//!
//! Watches the A858 auto-analysis page for new posts, replies to each new
//! post on Reddit with its statistics, and forwards the bot account's
//! private messages by email.

pub mod bot;
pub mod cache;
pub mod composer;
pub mod config;
pub mod constants;
pub mod forwarder;
pub mod mailer;
pub mod quote;
pub mod reddit;
pub mod stats;
