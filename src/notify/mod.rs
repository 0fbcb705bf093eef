//! Delivery of announcements.
//!
//! [`Notifier`] is the seam between the poller and the chat platform:
//! [`ChannelNotifier`] posts to the configured Discord channel through
//! serenity's REST client, [`LogNotifier`] prints instead (`--dry-run`).

pub mod format;

use serenity::builder::{CreateAllowedMentions, CreateMessage};
use serenity::http::Http;
use serenity::model::id::ChannelId;
use std::future::Future;
use std::io::Write;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Discord API error: {0}")]
    Discord(#[from] serenity::Error),
    #[error("Notifier unavailable: {0}")]
    Unavailable(String),
}

/// Sends one chat message.
pub trait Notifier: Send + Sync {
    fn send(&self, content: &str) -> impl Future<Output = Result<(), NotifyError>> + Send;
}

/// Posts to a fixed Discord channel.
#[derive(Clone)]
pub struct ChannelNotifier {
    http: Arc<Http>,
    channel: ChannelId,
}

impl ChannelNotifier {
    /// `channel_id` must be non-zero (enforced by `Config::validate`).
    pub fn new(http: Arc<Http>, channel_id: u64) -> Self {
        Self {
            http,
            channel: ChannelId::new(channel_id),
        }
    }
}

/// Builds a message whose text never pings anyone: feed content may contain
/// `@everyone`, user or role mentions.
pub fn silent_message(content: &str) -> CreateMessage {
    CreateMessage::new()
        .content(content)
        .allowed_mentions(CreateAllowedMentions::new())
}

impl Notifier for ChannelNotifier {
    async fn send(&self, content: &str) -> Result<(), NotifyError> {
        let message = self
            .channel
            .send_message(&self.http, silent_message(content))
            .await?;
        tracing::debug!(channel = %self.channel, message = %message.id, "Posted notification");
        Ok(())
    }
}

/// Prints messages to stdout instead of sending them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    async fn send(&self, content: &str) -> Result<(), NotifyError> {
        tracing::debug!(chars = content.chars().count(), "Dry-run notification");
        let mut out = std::io::stdout().lock();
        writeln!(out, "{content}\n").map_err(|e| NotifyError::Unavailable(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_silent_message_allows_no_mentions() {
        let message = silent_message("**[items] @everyone new drop** <@&42> <@7>");
        let body = serde_json::to_value(&message).unwrap();

        assert_eq!(body["content"], json!("**[items] @everyone new drop** <@&42> <@7>"));
        assert_eq!(body["allowed_mentions"]["parse"], json!([]));
        assert_eq!(body["allowed_mentions"]["users"], json!([]));
        assert_eq!(body["allowed_mentions"]["roles"], json!([]));
    }

    #[tokio::test]
    async fn test_log_notifier_prints() {
        LogNotifier.send("hello").await.unwrap();
    }
}
