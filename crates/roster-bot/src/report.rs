//! Scheduled expiry report: turns fired scheduler jobs into notifications for
//! the configured chat.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use roster_commands::CommandContext;
use roster_core::config::ReportConfig;
use roster_core::notify::Notification;
use roster_scheduler::{FiredJob, Schedule};

use crate::app::AppState;

pub const JOB_NAME: &str = "expiry-report";

/// Marks scheduled messages apart from command replies.
pub const PREFIX: &str = "[report]";

pub const STARTUP_TEXT: &str = "Roster bot started.";

pub fn schedule(config: &ReportConfig) -> Schedule {
    Schedule {
        first_delay_secs: config.first_delay_secs,
        every_secs: config.interval_secs,
    }
}

/// Scan and render with the scheduled cap. A failed scan becomes an error
/// message so the chat still hears about it.
pub async fn scheduled_report<C: CommandContext>(ctx: &C) -> String {
    match ctx.scanner().scan(ctx.today()).await {
        Ok(report) => {
            info!(
                expired = report.expired.len(),
                soon = report.soon.len(),
                "scheduled report ready"
            );
            format!("{PREFIX} {}", report.render(ctx.report().scheduled_cap))
        }
        Err(e) => {
            error!(error = %e, "scheduled expiry scan failed");
            format!("{PREFIX} Error: {e}")
        }
    }
}

/// Queue the startup message for the notify chat. Returns false when nothing
/// was queued.
pub async fn announce_startup(state: &AppState, notify_tx: &mpsc::Sender<Notification>) -> bool {
    let Some(target) = state.notify_target() else {
        return false;
    };
    let startup = Notification::new("startup", target.clone(), STARTUP_TEXT);
    if notify_tx.send(startup).await.is_err() {
        warn!(%target, "notification channel closed, startup message dropped");
        return false;
    }
    true
}

/// Receives fired jobs until the scheduler stops.
pub async fn run_report_router(
    state: Arc<AppState>,
    mut fired_rx: mpsc::Receiver<FiredJob>,
    notify_tx: mpsc::Sender<Notification>,
) {
    while let Some(job) = fired_rx.recv().await {
        if job.name != JOB_NAME {
            warn!(job = %job.name, "report router: unknown job ignored");
            continue;
        }
        let Some(target) = state.notify_target().cloned() else {
            warn!(job = %job.name, run = job.run, "no notify chat configured, report skipped");
            continue;
        };

        let text = scheduled_report(state.as_ref()).await;
        if notify_tx
            .send(Notification::new(JOB_NAME, target, text))
            .await
            .is_err()
        {
            warn!(job = %job.name, "notification channel closed, report dropped");
        }
    }
    info!("report router stopped");
}
