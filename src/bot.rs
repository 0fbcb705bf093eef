//! Discord gateway event handling.
//!
//! The gateway connection itself is serenity's. This module only reacts to
//! `ready` (start the poller once) and to the two chat commands.
use serenity::async_trait;
use serenity::model::channel::Message;
use serenity::model::gateway::Ready;
use serenity::model::mention::Mentionable;
use serenity::prelude::*;
use std::sync::Mutex;

use crate::notify::ChannelNotifier;
use crate::poller::{PollSettings, Poller};
use crate::snapshot::FeedStores;

/// Gateway intents the bot needs: message events and their content.
pub fn intents() -> GatewayIntents {
    GatewayIntents::GUILD_MESSAGES | GatewayIntents::DIRECT_MESSAGES | GatewayIntents::MESSAGE_CONTENT
}

/// Chat commands understood by the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Ping,
    Hello,
}

impl Command {
    /// Parses `<prefix><name>` at the start of a message. Trailing arguments are ignored.
    pub fn parse(prefix: &str, content: &str) -> Option<Self> {
        let rest = content.trim_start().strip_prefix(prefix)?;
        let name = rest.split(char::is_whitespace).next()?;
        match name {
            "ping" => Some(Command::Ping),
            "hello" => Some(Command::Hello),
            _ => None,
        }
    }
}

/// Everything the poller needs that only becomes usable once connected.
pub struct PollerSeed {
    pub settings: PollSettings,
    pub client: reqwest::Client,
    pub store: FeedStores,
    pub channel_id: u64,
}

pub struct Handler {
    prefix: String,
    /// Taken on the first `ready`; reconnects find it empty.
    seed: Mutex<Option<PollerSeed>>,
}

impl Handler {
    pub fn new(prefix: impl Into<String>, seed: PollerSeed) -> Self {
        Self {
            prefix: prefix.into(),
            seed: Mutex::new(Some(seed)),
        }
    }

    fn take_seed(&self) -> Option<PollerSeed> {
        match self.seed.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        tracing::info!("{} has connected to Discord!", ready.user.name);

        let Some(seed) = self.take_seed() else {
            tracing::debug!("Gateway reconnected, poller already running");
            return;
        };

        let notifier = ChannelNotifier::new(ctx.http.clone(), seed.channel_id);
        let poller = Poller::new(seed.settings, seed.client, notifier, seed.store);
        tokio::spawn(poller.run());
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }

        let Some(command) = Command::parse(&self.prefix, &msg.content) else {
            return;
        };

        let reply = match command {
            Command::Ping => "Pong!".to_string(),
            Command::Hello => format!("Hello {}!", msg.author.mention()),
        };

        if let Err(e) = msg.channel_id.say(&ctx.http, reply).await {
            tracing::warn!(command = ?command, error = %e, "Failed to reply to command");
        }
    }
}
