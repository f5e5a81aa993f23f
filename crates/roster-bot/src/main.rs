use std::sync::Arc;

use clap::Parser;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use roster_core::config::RosterConfig;
use roster_core::notify::Notification;
use roster_scheduler::{FiredJob, SchedulerEngine};
use roster_store::mysql::MySqlConnector;
use roster_store::{ConnectionManager, RecordService, RetryPolicy};
use roster_telegram::adapter::TelegramAdapter;

mod app;
mod report;

/// Residency registration tracker: Telegram bot over MySQL.
#[derive(Debug, Parser)]
#[command(name = "roster-bot", version, about)]
struct Args {
    /// Path to the TOML config file (falls back to ROSTER_CONFIG, then roster.toml).
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env must be loaded before the filter and config read the environment
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("ignoring unreadable .env: {e}");
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "roster_bot=info,roster_store=info,roster_scheduler=info,\
                 roster_telegram=info,roster_commands=info"
                    .into()
            }),
        )
        .init();

    // load config: --config > ROSTER_CONFIG env > roster.toml
    let args = Args::parse();
    let config_path = args.config.or_else(|| std::env::var("ROSTER_CONFIG").ok());
    let config = RosterConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        RosterConfig::default()
    });

    let manager = Arc::new(open_storage(&config).await);
    let records = RecordService::new(Arc::clone(&manager));
    let state = Arc::new(app::AppState::new(config, records));

    // Fired-job channel: SchedulerEngine → report router
    let (fired_tx, fired_rx) = mpsc::channel::<FiredJob>(16);
    // Delivery channel: report router / startup → Telegram proactive delivery
    let (notify_tx, notify_rx) = mpsc::channel::<Notification>(64);

    let mut engine = SchedulerEngine::new(Some(fired_tx));
    let job = engine.add_job(report::JOB_NAME, report::schedule(&state.config.report))?;
    info!(job_id = job.id, job = %job.name, schedule = ?job.schedule, "expiry report scheduled");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let engine_task = tokio::spawn(engine.run(shutdown_rx));
    let router_task = tokio::spawn(report::run_report_router(
        Arc::clone(&state),
        fired_rx,
        notify_tx.clone(),
    ));

    match TelegramAdapter::new(&state.config.telegram, Arc::clone(&state)) {
        Ok(adapter) => {
            match adapter.verify().await {
                Ok(username) => info!(%username, "Telegram bot token verified"),
                Err(e) => warn!(error = %e, "Telegram getMe failed; polling will keep retrying"),
            }
            report::announce_startup(&state, &notify_tx).await;
            drop(notify_tx);
            info!("Roster bot running; press Ctrl-C to stop");
            adapter.run(Some(notify_rx)).await;
        }
        Err(e) => {
            warn!(error = %e, "Telegram disabled; only the scheduler is running");
            drop(notify_rx);
            drop(notify_tx);
            tokio::signal::ctrl_c().await?;
        }
    }

    info!("shutting down");
    let _ = shutdown_tx.send(true);
    if let Err(e) = engine_task.await {
        warn!(error = %e, "scheduler task failed");
    }
    if let Err(e) = router_task.await {
        warn!(error = %e, "report router task failed");
    }
    manager.close().await;
    Ok(())
}

/// Connect to MySQL when the database section is complete; otherwise run with
/// storage disabled so `/chatid` and `/help` still work.
async fn open_storage(config: &RosterConfig) -> ConnectionManager {
    match config.database.settings() {
        Ok(settings) => {
            info!(
                host = %settings.host,
                port = settings.port,
                database = %settings.database,
                tls = settings.ca_file.is_some(),
                "connecting to MySQL"
            );
            let policy = RetryPolicy::from_config(&config.database);
            ConnectionManager::start(Arc::new(MySqlConnector::new(settings)), policy).await
        }
        Err(e) => {
            warn!(error = %e, "storage disabled; record commands will report it");
            ConnectionManager::unconfigured()
        }
    }
}
