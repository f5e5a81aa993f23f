//! Proactive Telegram delivery: sends reports and announcements to chats.

use teloxide::prelude::*;
use teloxide::types::Recipient;
use tokio::sync::mpsc;
use tracing::{debug, info};

use roster_core::notify::{Notification, NotifyTarget};

/// Background task that receives notifications and delivers them to Telegram chats.
///
/// Spawned once in `adapter.rs` when the adapter starts.
/// Runs until every sender is dropped.
pub async fn run_telegram_delivery(bot: Bot, mut rx: mpsc::Receiver<Notification>) {
    while let Some(notification) = rx.recv().await {
        debug!(source = %notification.source, target = %notification.target, "telegram: delivering notification");
        crate::send::send_response(&bot, recipient(&notification.target), &notification.text).await;
        info!(source = %notification.source, target = %notification.target, "telegram: notification delivered");
    }

    info!("telegram delivery task exiting (channel closed)");
}

pub fn recipient(target: &NotifyTarget) -> Recipient {
    match target {
        NotifyTarget::Id(id) => Recipient::Id(ChatId(*id)),
        NotifyTarget::Channel(name) => Recipient::ChannelUsername(name.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_target_is_a_chat_id() {
        assert!(matches!(
            recipient(&NotifyTarget::Id(-1_001_234)),
            Recipient::Id(ChatId(-1_001_234))
        ));
    }

    #[test]
    fn channel_target_keeps_its_username() {
        match recipient(&NotifyTarget::Channel("@roster_channel".into())) {
            Recipient::ChannelUsername(name) => assert_eq!(name, "@roster_channel"),
            other => panic!("unexpected recipient {other:?}"),
        }
    }
}
