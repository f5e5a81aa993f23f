use chrono::{Local, NaiveDate};
use tracing::warn;

use roster_commands::CommandContext;
use roster_core::config::{ReportConfig, RosterConfig};
use roster_core::notify::NotifyTarget;
use roster_store::{ExpiryScanner, RecordService};

/// Shared state handed to the Telegram adapter and the report router.
pub struct AppState {
    pub config: RosterConfig,
    records: RecordService,
    scanner: ExpiryScanner,
    notify: Option<NotifyTarget>,
}

impl AppState {
    /// A malformed notify chat is logged and turns off startup and report
    /// messages; commands keep working.
    pub fn new(config: RosterConfig, records: RecordService) -> Self {
        let scanner = ExpiryScanner::new(records.clone(), config.report.window_days);
        let notify = config.telegram.notify_target().unwrap_or_else(|e| {
            warn!(error = %e, "notify chat ignored; reports are disabled");
            None
        });
        Self {
            config,
            records,
            scanner,
            notify,
        }
    }

    /// Chat that receives the startup message and scheduled reports.
    pub fn notify_target(&self) -> Option<&NotifyTarget> {
        self.notify.as_ref()
    }
}

impl CommandContext for AppState {
    fn records(&self) -> &RecordService {
        &self.records
    }

    fn scanner(&self) -> &ExpiryScanner {
        &self.scanner
    }

    fn report(&self) -> &ReportConfig {
        &self.config.report
    }

    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}
