//! Outbound notification payload, produced by the report router and the
//! startup announcement, consumed by the channel adapter's delivery task.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Where notifications go: a numeric chat id or a public `@channel`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotifyTarget {
    Id(i64),
    /// Channel username, stored with its leading `@`.
    Channel(String),
}

impl NotifyTarget {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if let Ok(id) = raw.parse::<i64>() {
            return Ok(NotifyTarget::Id(id));
        }
        match raw.strip_prefix('@') {
            Some(name) if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') => {
                Ok(NotifyTarget::Channel(raw.to_string()))
            }
            _ => Err(CoreError::Config(format!(
                "notify chat {raw:?} is neither a numeric chat id nor an @channel name"
            ))),
        }
    }
}

impl fmt::Display for NotifyTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotifyTarget::Id(id) => write!(f, "{id}"),
            NotifyTarget::Channel(name) => write!(f, "{name}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// Origin of the message (`"startup"`, a job name), used for logging.
    pub source: String,
    pub target: NotifyTarget,
    /// Plain-text body. Splitting into transport-sized chunks is the adapter's job.
    pub text: String,
}

impl Notification {
    pub fn new(source: impl Into<String>, target: NotifyTarget, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target,
            text: text.into(),
        }
    }
}
