#![forbid(unsafe_code)]

//! Shared building blocks for the tubegram Telegram bot.
//!
//! The binary only wires the dispatcher; everything that decides what the bot
//! says or which yt-dlp options it passes lives here so it can be tested
//! without talking to Telegram.

pub mod config;
pub mod failure;
pub mod handlers;
pub mod link_store;
pub mod links;
pub mod media;
pub mod outbox;
pub mod payload;
pub mod security;
pub mod texts;
pub mod ytdlp;
