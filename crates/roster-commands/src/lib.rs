//! `roster-commands`: channel-agnostic chat commands.
//!
//! Text in, reply text out. Arguments are validated before any storage call
//! and every failure becomes a user-facing reply, so a bad command never
//! takes the dispatcher down.

pub mod context;
pub mod error;
pub mod handler;
pub mod parse;
pub mod reply;

pub use context::CommandContext;
pub use error::UsageError;
pub use handler::handle_command;
pub use parse::{is_public_command, parse_command, Command};
