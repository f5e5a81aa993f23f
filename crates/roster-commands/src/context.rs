//! What a channel host provides to the command handler.

use chrono::NaiveDate;
use roster_core::config::ReportConfig;
use roster_store::{ExpiryScanner, RecordService};

/// Implemented by the bot's application state and by test fixtures.
pub trait CommandContext: Send + Sync {
    fn records(&self) -> &RecordService;
    fn scanner(&self) -> &ExpiryScanner;
    fn report(&self) -> &ReportConfig;

    /// Reference day for expiry classification.
    fn today(&self) -> NaiveDate;
}
