//! Outbound text for command replies and reports.
//!
//! Everything is sent as plain text, so names and IDs are never parsed as
//! markup. Long reports are cut into several messages.

use std::time::Duration;

use teloxide::prelude::*;
use teloxide::types::Recipient;
use tracing::warn;

/// Characters per message, a little under Telegram's 4096.
pub const CHUNK_MAX: usize = 4090;

/// Split `text` into messages of at most [`CHUNK_MAX`] characters, breaking on
/// line boundaries. A single longer line is split on spaces, or hard-split
/// when it has none.
pub fn split_chunks(text: &str) -> Vec<String> {
    if text.chars().count() <= CHUNK_MAX {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split('\n') {
        for piece in split_long_line(line) {
            let len = piece.chars().count();
            let cost = if current.is_empty() { len } else { len + 1 };
            if !current.is_empty() && current_len + cost > CHUNK_MAX {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if !current.is_empty() {
                current.push('\n');
                current_len += 1;
            }
            current.push_str(piece);
            current_len += len;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn split_long_line(line: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut rest = line;
    while rest.chars().count() > CHUNK_MAX {
        let cut = rest
            .char_indices()
            .nth(CHUNK_MAX)
            .map_or(rest.len(), |(i, _)| i);
        let split_at = rest[..cut].rfind(' ').filter(|&i| i > 0).unwrap_or(cut);
        pieces.push(&rest[..split_at]);
        rest = rest[split_at..].trim_start();
    }
    pieces.push(rest);
    pieces
}

const CHUNK_GAP: Duration = Duration::from_millis(100);

/// Deliver `text` to `chat`, one message per chunk with a short pause in
/// between. Failures are logged per chunk; the rest is still sent.
pub async fn send_response(bot: &Bot, chat: Recipient, text: &str) {
    let chunks = split_chunks(text);
    let total = chunks.len();
    for (index, chunk) in chunks.into_iter().enumerate() {
        if index > 0 {
            tokio::time::sleep(CHUNK_GAP).await;
        }
        if let Err(e) = bot.send_message(chat.clone(), chunk).await {
            warn!(error = %e, ?chat, chunk = index + 1, total, "Telegram: send failed");
        }
    }
}
