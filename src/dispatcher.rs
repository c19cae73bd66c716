//! The poll cycle.
//!
//! A cycle walks the configured feeds in order. For each feed it fetches a
//! snapshot, ranks the items newest first, keeps the ones not delivered
//! before, composes them into one message and sends the chunks in sequence.
//! A failing feed or a failing send is logged and recorded in the
//! [`CycleReport`]; it never stops the rest of the cycle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::compose::MessageComposer;
use crate::dedup::DedupTracker;
use crate::feed::{FeedItem, FeedSource};
use crate::sink::{MessageFormat, OutboundSink};

/// Outcome of one feed within a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedOutcome {
    Delivered {
        fetched: usize,
        new_items: usize,
        chunks_sent: usize,
        chunks_failed: usize,
    },
    FetchFailed(String),
}

/// Per-feed results of a completed cycle, in feed order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub feeds: Vec<(String, FeedOutcome)>,
}

impl CycleReport {
    pub fn fetch_failures(&self) -> usize {
        self.feeds
            .iter()
            .filter(|(_, o)| matches!(o, FeedOutcome::FetchFailed(_)))
            .count()
    }

    pub fn new_items(&self) -> usize {
        self.feeds
            .iter()
            .map(|(_, o)| match o {
                FeedOutcome::Delivered { new_items, .. } => *new_items,
                FeedOutcome::FetchFailed(_) => 0,
            })
            .sum()
    }

    pub fn chunks_failed(&self) -> usize {
        self.feeds
            .iter()
            .map(|(_, o)| match o {
                FeedOutcome::Delivered { chunks_failed, .. } => *chunks_failed,
                FeedOutcome::FetchFailed(_) => 0,
            })
            .sum()
    }
}

/// Orders items newest first.
///
/// Items without a timestamp sort as if published at the Unix epoch. The sort
/// is stable, so equal timestamps keep feed order. With `limit`, only the
/// first `limit` items survive.
pub fn rank_items(mut items: Vec<FeedItem>, limit: Option<usize>) -> Vec<FeedItem> {
    let effective = |item: &FeedItem| {
        item.published_at
            .map_or((0, 0), |t| (t.timestamp(), t.timestamp_subsec_nanos()))
    };
    items.sort_by(|a, b| effective(b).cmp(&effective(a)));
    if let Some(limit) = limit {
        items.truncate(limit);
    }
    items
}

/// Resets the in-progress flag when a cycle ends, including on panic.
struct CycleGuard<'a>(&'a AtomicBool);

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Dispatcher {
    feeds: Vec<String>,
    channel_id: String,
    source: Arc<dyn FeedSource>,
    sink: Arc<dyn OutboundSink>,
    composer: MessageComposer,
    tracker: Mutex<DedupTracker>,
    max_items_per_feed: Option<usize>,
    in_progress: AtomicBool,
}

impl Dispatcher {
    pub fn new(
        feeds: Vec<String>,
        channel_id: impl Into<String>,
        source: Arc<dyn FeedSource>,
        sink: Arc<dyn OutboundSink>,
    ) -> Self {
        Self {
            feeds,
            channel_id: channel_id.into(),
            source,
            sink,
            composer: MessageComposer::default(),
            tracker: Mutex::new(DedupTracker::new()),
            max_items_per_feed: None,
            in_progress: AtomicBool::new(false),
        }
    }

    pub fn with_tracker(mut self, tracker: DedupTracker) -> Self {
        self.tracker = Mutex::new(tracker);
        self
    }

    pub fn with_composer(mut self, composer: MessageComposer) -> Self {
        self.composer = composer;
        self
    }

    pub fn with_max_items_per_feed(mut self, limit: Option<usize>) -> Self {
        self.max_items_per_feed = limit;
        self
    }

    pub fn feeds(&self) -> &[String] {
        &self.feeds
    }

    /// Number of fingerprints currently remembered.
    pub fn seen_count(&self) -> usize {
        self.tracker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_running(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    /// Runs one full pass over all feeds.
    ///
    /// Returns `None` without doing anything if another cycle is still
    /// running.
    pub async fn run_cycle(&self) -> Option<CycleReport> {
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!("Previous cycle still running, skipping this trigger");
            return None;
        }
        let _guard = CycleGuard(&self.in_progress);

        tracing::info!(feeds = self.feeds.len(), "Checking feeds for updates");
        let mut report = CycleReport::default();

        for identifier in &self.feeds {
            let outcome = self.process_feed(identifier).await;
            report.feeds.push((identifier.clone(), outcome));
        }

        tracing::info!(
            new_items = report.new_items(),
            fetch_failures = report.fetch_failures(),
            chunks_failed = report.chunks_failed(),
            "Cycle complete"
        );
        Some(report)
    }

    async fn process_feed(&self, identifier: &str) -> FeedOutcome {
        let mut feed = match self.source.fetch(identifier).await {
            Ok(feed) => feed,
            Err(e) => {
                tracing::error!(feed = %identifier, error = %e, "Failed to fetch feed");
                return FeedOutcome::FetchFailed(e.to_string());
            }
        };

        let fetched = feed.items.len();
        let ranked = rank_items(std::mem::take(&mut feed.items), self.max_items_per_feed);

        // Lock scope ends before any await
        let fresh = self
            .tracker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .filter_new(ranked);

        tracing::info!(
            feed = %identifier,
            fetched = fetched,
            new_items = fresh.len(),
            "Feed checked"
        );

        let mut chunks_sent = 0;
        let mut chunks_failed = 0;
        if !fresh.is_empty() {
            let chunks = self.composer.build(&feed, &fresh);
            let total = chunks.len();
            for (n, chunk) in chunks.iter().enumerate() {
                match self
                    .sink
                    .send(&self.channel_id, &chunk.text, MessageFormat::Html)
                    .await
                {
                    Ok(()) => chunks_sent += 1,
                    Err(e) => {
                        chunks_failed += 1;
                        tracing::error!(
                            feed = %identifier,
                            chunk = n + 1,
                            of = total,
                            error = %e,
                            "Failed to send message chunk"
                        );
                    }
                }
            }
        }

        FeedOutcome::Delivered {
            fetched,
            new_items: fresh.len(),
            chunks_sent,
            chunks_failed,
        }
    }
}
