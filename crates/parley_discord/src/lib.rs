//! Parley Discord - Discord Bot Integration
//!
//! Connects the Parley responder to Discord: decides which messages are
//! addressed to the bot, reads reply chains and threads through the HTTP
//! API, delivers chunked replies and serves the slash commands.

pub mod bot;
pub mod convert;
pub mod error;
pub mod slash_commands;
pub mod source;

pub use bot::{ParleyBot, ParleyEventHandler, TriggerFacts};
pub use error::{DiscordError, Result};
pub use source::DiscordMessageSource;

// Re-export serenity for convenience
pub use serenity;
