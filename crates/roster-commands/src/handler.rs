use tracing::{debug, info, warn};

use crate::context::CommandContext;
use crate::parse::{parse_command, Command};
use crate::reply;

/// Handle one chat message.
///
/// Returns `Some(reply)` for a recognized command (including usage errors and
/// storage failures), `None` for anything else.
pub async fn handle_command<C: CommandContext>(text: &str, chat_id: i64, ctx: &C) -> Option<String> {
    let command = match parse_command(text)? {
        Ok(command) => command,
        Err(usage) => {
            debug!(chat_id, error = %usage, "command rejected");
            return Some(usage.to_string());
        }
    };
    info!(chat_id, command = command.name(), "handling command");
    Some(execute(command, chat_id, ctx).await)
}

async fn execute<C: CommandContext>(command: Command, chat_id: i64, ctx: &C) -> String {
    let records = ctx.records();
    match command {
        Command::Start | Command::Help => reply::HELP.to_string(),

        Command::ChatId => reply::chat_id(chat_id),

        Command::PingDb => match records.health_check().await {
            Ok(value) => reply::health(value),
            Err(e) => {
                warn!(error = %e, "health check failed");
                format!("DB error: {e}")
            }
        },

        Command::CreateUser(new) => match records.create(&new).await {
            Ok(record) => reply::created(&record),
            Err(e) => {
                warn!(national_id = %new.national_id, error = %e, "createuser failed");
                reply::storage_error(&e)
            }
        },

        Command::DeleteUser { national_id } => match records.delete(&national_id).await {
            Ok(true) => reply::deleted(&national_id),
            Ok(false) => reply::not_found(&national_id),
            Err(e) => {
                warn!(%national_id, error = %e, "deleteuser failed");
                reply::storage_error(&e)
            }
        },

        Command::Renew {
            national_id,
            registration,
        } => match records.renew(&national_id, registration).await {
            Ok(Some((registration, expiry))) => reply::renewed(&national_id, registration, expiry),
            Ok(None) => reply::not_found(&national_id),
            Err(e) => {
                warn!(%national_id, error = %e, "renew failed");
                reply::storage_error(&e)
            }
        },

        Command::Check {
            national_id: Some(national_id),
        } => match records.check_one(&national_id, ctx.today()).await {
            Ok(Some(status)) => reply::status(&status),
            Ok(None) => reply::not_found(&national_id),
            Err(e) => {
                warn!(%national_id, error = %e, "check failed");
                reply::storage_error(&e)
            }
        },

        Command::Check { national_id: None } => match ctx.scanner().scan(ctx.today()).await {
            Ok(report) => report.render(ctx.report().on_demand_cap),
            Err(e) => {
                warn!(error = %e, "expiry scan failed");
                reply::storage_error(&e)
            }
        },
    }
}
