//! `roster-core`: shared types for the residency roster: the user record,
//! registration/expiry date rules, configuration and the notification payload
//! handed from the scheduler to channel adapters.

pub mod config;
pub mod dates;
pub mod error;
pub mod notify;
pub mod record;

pub use error::{CoreError, Result};
