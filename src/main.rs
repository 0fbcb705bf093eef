use anyhow::{Context, Result};
use clap::Parser;
use secrecy::{ExposeSecret, SecretString};
use serenity::http::Http;
use serenity::Client;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use feedwatch::bot::{self, Handler, PollerSeed};
use feedwatch::config::{Config, ConfigError, SnapshotMode};
use feedwatch::notify::{ChannelNotifier, LogNotifier, Notifier};
use feedwatch::poller::{CycleReport, FeedOutcome, PollSettings, Poller};
use feedwatch::snapshot::FeedStores;

const USER_AGENT: &str = concat!("feedwatch/", env!("CARGO_PKG_VERSION"));

#[derive(Parser, Debug)]
#[command(
    name = "feedwatch",
    about = "Discord bot that announces new records from game-data feeds"
)]
struct Args {
    /// Path to the TOML config file
    #[arg(long, short, value_name = "FILE", default_value = "feedwatch.toml")]
    config: PathBuf,

    /// Run a single poll cycle and exit
    #[arg(long)]
    once: bool,

    /// Print notifications instead of sending them (no Discord access, no token needed)
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn,feedwatch=info")),
        )
        .init();

    // .env is optional; real environment variables win
    if let Ok(path) = dotenv::dotenv() {
        tracing::debug!(path = %path.display(), "Loaded .env");
    }

    let args = Args::parse();

    let config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    if let Err(e) = config.validate() {
        eprintln!("Error: {e}");
        eprintln!(
            "Check {} (feedwatch.example.toml documents every key).",
            args.config.display()
        );
        std::process::exit(1);
    }

    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(10))
        .build()
        .context("Failed to build HTTP client")?;
    let settings = PollSettings::from(&config);
    let store = FeedStores::new(config.cache_dir.clone());

    if args.once {
        for feed in config.feeds.iter().filter(|f| f.snapshot == SnapshotMode::Memory) {
            tracing::warn!(feed = %feed.name, "In-memory snapshot: a single cycle only seeds the baseline");
        }
    }

    if args.dry_run {
        tracing::info!("Dry run: notifications are printed, not sent");
        return run_local(Poller::new(settings, client, LogNotifier, store), args.once).await;
    }

    let token = match config.bot_token() {
        Ok(token) => token,
        Err(ConfigError::MissingToken(var)) => {
            eprintln!("Error: {var} environment variable not set!");
            eprintln!("Please set your Discord bot token to run this bot.");
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    if args.once {
        // REST only: a single cycle does not need a gateway session
        let http = Arc::new(Http::new(token.expose_secret()));
        let notifier = ChannelNotifier::new(http, config.channel_id);
        return run_local(Poller::new(settings, client, notifier, store), true).await;
    }

    run_gateway(&config, token, settings, client, store).await
}

/// Runs the poller without a gateway connection.
async fn run_local<N: Notifier>(mut poller: Poller<N, FeedStores>, once: bool) -> Result<()> {
    if once {
        let report = poller.run_cycle().await;
        print_summary(&report);
        if !report.feeds.is_empty() && report.failures() == report.feeds.len() {
            anyhow::bail!("every feed failed");
        }
        return Ok(());
    }

    tokio::select! {
        _ = poller.run() => {}
        _ = tokio::signal::ctrl_c() => tracing::info!("Shutting down"),
    }
    Ok(())
}

/// Connects to the gateway; the handler starts the poller on first `ready`.
async fn run_gateway(
    config: &Config,
    token: SecretString,
    settings: PollSettings,
    client: reqwest::Client,
    store: FeedStores,
) -> Result<()> {
    let handler = Handler::new(
        config.command_prefix.clone(),
        PollerSeed {
            settings,
            client,
            store,
            channel_id: config.channel_id,
        },
    );

    let mut discord = Client::builder(token.expose_secret(), bot::intents())
        .event_handler(handler)
        .await
        .context("Failed to create Discord client")?;

    let shard_manager = discord.shard_manager.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutting down");
            shard_manager.shutdown_all().await;
        }
    });

    discord.start().await.context("Discord client stopped")?;
    Ok(())
}

fn print_summary(report: &CycleReport) {
    for feed in &report.feeds {
        let line = match &feed.outcome {
            FeedOutcome::Baseline { records } => format!("baseline of {records} records"),
            FeedOutcome::Notified { new, sent, failed } => {
                format!("{new} new, {sent} messages sent, {failed} failed")
            }
            FeedOutcome::Empty => "no records returned".to_string(),
            FeedOutcome::Failed(error) => format!("failed: {error}"),
        };
        println!("{}: {}", feed.feed, line);
    }
}
