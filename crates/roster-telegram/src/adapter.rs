//! Telegram channel adapter.
//!
//! Wraps a teloxide `Bot` + `Dispatcher` and drives the long-polling event loop
//! until Ctrl-C. Reconnects automatically on transport errors.

use std::sync::Arc;

use teloxide::prelude::*;
use tokio::sync::mpsc;
use tracing::info;

use roster_core::config::TelegramConfig;
use roster_core::notify::Notification;

use crate::context::TelegramAppContext;
use crate::error::TelegramError;
use crate::handler::handle_message;

/// Telegram channel adapter. Long polling, no public URL required.
pub struct TelegramAdapter<C: TelegramAppContext + 'static> {
    ctx: Arc<C>,
    config: TelegramConfig,
    bot: Bot,
}

impl<C: TelegramAppContext + 'static> TelegramAdapter<C> {
    /// Fails with [`TelegramError::NoToken`] when no bot token is configured.
    pub fn new(config: &TelegramConfig, ctx: Arc<C>) -> Result<Self, TelegramError> {
        let bot = Bot::new(bot_token(config)?);
        Ok(Self {
            ctx,
            config: config.clone(),
            bot,
        })
    }

    /// Check the token against Telegram; returns the bot's username.
    pub async fn verify(&self) -> Result<String, TelegramError> {
        let me = self.bot.get_me().await?;
        Ok(me.user.username.clone().unwrap_or_default())
    }

    /// Connect to Telegram and drive the long-polling loop.
    ///
    /// Returns after Ctrl-C. If `delivery_rx` is `Some`, a proactive delivery
    /// task is spawned for it.
    pub async fn run(self, delivery_rx: Option<mpsc::Receiver<Notification>>) {
        if let Some(rx) = delivery_rx {
            tokio::spawn(crate::proactive::run_telegram_delivery(self.bot.clone(), rx));
        }

        info!("Telegram: starting long-polling dispatcher");

        let handler = Update::filter_message().endpoint(handle_message::<C>);

        Dispatcher::builder(self.bot, handler)
            .dependencies(dptree::deps![self.ctx, self.config])
            .default_handler(|_upd| async {})
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;

        info!("Telegram: dispatcher stopped");
    }
}

fn bot_token(config: &TelegramConfig) -> Result<&str, TelegramError> {
    config
        .bot_token
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(TelegramError::NoToken)
}
