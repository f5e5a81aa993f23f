//! Telegram context interface, re-exported from the command crate.
//!
//! `TelegramAppContext` is an alias for `roster_commands::CommandContext`, so
//! the adapter needs nothing beyond what the command handler needs.

pub use roster_commands::CommandContext as TelegramAppContext;
