//! The periodic fetch → diff → notify → persist cycle.
//!
//! A single task owns the [`Poller`] and with it all seen-identifier state,
//! so there is no locking. Feeds are processed one after another within a
//! cycle. A failing feed is logged and skipped; its snapshot is left alone
//! and the next tick retries it.
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::time::MissedTickBehavior;

use crate::config::{Config, FeedSpec};
use crate::diff::{diff_records, Diff};
use crate::feed::{fetch_feed, parse_records, ParseResult};
use crate::notify::{format, Notifier};
use crate::snapshot::SnapshotStore;

/// What happened to one feed during a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedOutcome {
    /// First observation; `records` identifiers stored without announcing.
    Baseline { records: usize },
    /// Compared against the previous snapshot.
    Notified {
        new: usize,
        sent: usize,
        failed: usize,
    },
    /// The fetch parsed to zero records; previous snapshot kept.
    Empty,
    /// Fetch, parse or snapshot failure, rendered for logging.
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct FeedReport {
    pub feed: String,
    pub outcome: FeedOutcome,
}

#[derive(Debug, Clone)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub feeds: Vec<FeedReport>,
}

impl CycleReport {
    pub fn total_new(&self) -> usize {
        self.feeds
            .iter()
            .map(|f| match f.outcome {
                FeedOutcome::Notified { new, .. } => new,
                _ => 0,
            })
            .sum()
    }

    pub fn failures(&self) -> usize {
        self.feeds
            .iter()
            .filter(|f| matches!(f.outcome, FeedOutcome::Failed(_)))
            .count()
    }
}

/// Poller settings derived from [`Config`].
#[derive(Debug, Clone)]
pub struct PollSettings {
    pub feeds: Vec<FeedSpec>,
    pub interval: Duration,
    pub request_timeout: Duration,
    /// 0 = unlimited.
    pub max_notifications_per_cycle: usize,
}

impl From<&Config> for PollSettings {
    fn from(config: &Config) -> Self {
        Self {
            feeds: config.feeds.clone(),
            interval: Duration::from_secs(config.interval_minutes * 60),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            max_notifications_per_cycle: config.max_notifications_per_cycle,
        }
    }
}

pub struct Poller<N, S> {
    settings: PollSettings,
    client: reqwest::Client,
    notifier: N,
    store: S,
}

impl<N: Notifier, S: SnapshotStore> Poller<N, S> {
    pub fn new(settings: PollSettings, client: reqwest::Client, notifier: N, store: S) -> Self {
        Self {
            settings,
            client,
            notifier,
            store,
        }
    }

    #[cfg(test)]
    pub(crate) fn store(&self) -> &S {
        &self.store
    }

    /// Runs cycles forever at the configured interval. The first cycle starts immediately.
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.settings.interval);
        // A slow cycle pushes the schedule back instead of firing a burst
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            feeds = self.settings.feeds.len(),
            interval_secs = self.settings.interval.as_secs(),
            "Poller started"
        );

        loop {
            ticker.tick().await;
            self.run_cycle().await;
        }
    }

    /// Processes every feed once.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let started_at = Utc::now();
        let mut feeds = Vec::with_capacity(self.settings.feeds.len());

        for index in 0..self.settings.feeds.len() {
            let feed = self.settings.feeds[index].clone();
            let outcome = self.poll_feed(&feed).await;

            match &outcome {
                FeedOutcome::Failed(error) => {
                    tracing::error!(feed = %feed.name, error = %error, "Feed poll failed, retrying next cycle");
                }
                FeedOutcome::Empty => {
                    tracing::warn!(feed = %feed.name, "Feed returned no records, keeping previous snapshot");
                }
                FeedOutcome::Baseline { records } => {
                    tracing::info!(feed = %feed.name, records = records, "Seeded baseline");
                }
                FeedOutcome::Notified { new, sent, failed } => {
                    tracing::info!(feed = %feed.name, new = new, sent = sent, failed = failed, "Feed polled");
                }
            }

            feeds.push(FeedReport {
                feed: feed.name,
                outcome,
            });
        }

        let report = CycleReport { started_at, feeds };
        tracing::info!(
            started_at = %report.started_at.to_rfc3339(),
            new = report.total_new(),
            failures = report.failures(),
            "Cycle complete"
        );
        report
    }

    async fn poll_feed(&mut self, feed: &FeedSpec) -> FeedOutcome {
        let bytes = match fetch_feed(&self.client, &feed.url, self.settings.request_timeout).await {
            Ok(bytes) => bytes,
            Err(e) => return FeedOutcome::Failed(e.to_string()),
        };

        let ParseResult { records, skipped } = match parse_records(&bytes, feed) {
            Ok(result) => result,
            Err(e) => return FeedOutcome::Failed(e.to_string()),
        };

        if skipped > 0 {
            tracing::warn!(feed = %feed.name, skipped = skipped, "Rows without content or with duplicate ids skipped");
        }

        if records.is_empty() {
            return FeedOutcome::Empty;
        }

        let previous = match self.store.load(feed) {
            Ok(previous) => previous,
            Err(e) => {
                // Re-seed rather than announce a whole feed as new
                tracing::warn!(feed = %feed.name, error = %e, "Unreadable snapshot, treating as first run");
                None
            }
        };

        let diff = diff_records(previous.as_ref(), &records);

        let outcome = match &diff {
            Diff::Baseline { .. } => FeedOutcome::Baseline {
                records: diff.seen().len(),
            },
            Diff::Changes { .. } => {
                let new = diff.new_records();
                let (sent, failed) = self.announce(feed, new).await;
                FeedOutcome::Notified {
                    new: new.len(),
                    sent,
                    failed,
                }
            }
        };

        if let Err(e) = self.store.save(feed, &records) {
            return FeedOutcome::Failed(format!("failed to save snapshot: {e}"));
        }

        outcome
    }

    /// Sends one message per new record, respecting the per-cycle cap.
    /// Returns `(sent, failed)` message counts.
    async fn announce(&self, feed: &FeedSpec, new: &[crate::feed::Record]) -> (usize, usize) {
        let cap = match self.settings.max_notifications_per_cycle {
            0 => new.len(),
            cap => cap.min(new.len()),
        };

        let mut messages: Vec<String> = new[..cap]
            .iter()
            .map(|record| format::render(feed, record))
            .collect();
        if cap < new.len() {
            messages.push(format::overflow(feed, new.len() - cap));
        }

        let mut sent = 0;
        let mut failed = 0;
        for message in &messages {
            match self.notifier.send(message).await {
                Ok(()) => sent += 1,
                Err(e) => {
                    failed += 1;
                    tracing::error!(feed = %feed.name, error = %e, "Failed to send notification");
                }
            }
        }
        (sent, failed)
    }
}
