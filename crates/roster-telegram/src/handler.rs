//! Telegram message handler registered in the teloxide Dispatcher.

use std::sync::Arc;

use teloxide::prelude::*;
use tracing::{debug, info};

use roster_commands::{handle_command, is_public_command};
use roster_core::config::TelegramConfig;

use crate::allow::{self, Caller};
use crate::context::TelegramAppContext;
use crate::send;

/// Main message handler registered in the teloxide Dispatcher.
///
/// Runs for every incoming `Message`. Performs:
/// 1. Bot-message filter
/// 2. Command filter (plain chatter is ignored)
/// 3. Allowlist check for everything but `/start`, `/help`, `/chatid`
/// 4. Command execution in a spawned task, so a slow database never stalls
///    the dispatcher
pub async fn handle_message<C: TelegramAppContext + 'static>(
    bot: Bot,
    msg: Message,
    ctx: Arc<C>,
    config: TelegramConfig,
) -> ResponseResult<()> {
    // 1. Ignore messages from other bots.
    if msg.from.as_ref().is_some_and(|u| u.is_bot) {
        return Ok(());
    }

    // 2. Only commands are handled.
    let text = msg.text().unwrap_or("").trim().to_string();
    if !text.starts_with('/') {
        return Ok(());
    }

    // 3. Allowlist check.
    let caller = msg
        .from
        .as_ref()
        .map(|u| Caller::new(u.username.clone().unwrap_or_default(), u.id.0.to_string()))
        .unwrap_or_default();
    if !is_public_command(&text) && !allow::is_allowed(&config.allow_users, &caller) {
        info!(username = %caller.username, user_id = %caller.user_id, "Telegram: command from user not in allowlist ignored");
        return Ok(());
    }

    // 4. Run the command off the dispatcher task.
    let chat_id = msg.chat.id;
    tokio::spawn(async move {
        match handle_command(&text, chat_id.0, ctx.as_ref()).await {
            Some(reply) => send::send_response(&bot, chat_id.into(), &reply).await,
            None => debug!(chat_id = chat_id.0, "Telegram: unknown command ignored"),
        }
    });

    Ok(())
}
