//! Bounded in-memory record of already-delivered items.
//!
//! Items are identified by a fingerprint of their title and link. The record
//! keeps at most [`SEEN_CAPACITY`] keys; when an insertion pushes it past that,
//! the oldest keys are dropped so that only the [`SEEN_RETAIN`] most recently
//! inserted remain. State lives only in process memory and starts empty on
//! every restart.

use std::collections::{HashSet, VecDeque};

use crate::feed::FeedItem;

/// Maximum number of fingerprints held at once.
pub const SEEN_CAPACITY: usize = 1000;
/// Number of fingerprints kept after an overflow.
pub const SEEN_RETAIN: usize = 500;

/// Fingerprint of an item for novelty checks.
///
/// Title and link are joined with NUL. The parser strips control characters
/// from both fields, so the separator cannot occur inside either one.
pub fn seen_key(item: &FeedItem) -> String {
    format!("{}\u{0}{}", item.title, item.link)
}

/// Decides which items are new and remembers them.
#[derive(Debug, Default)]
pub struct DedupTracker {
    order: VecDeque<String>,
    keys: HashSet<String>,
    bypass: bool,
}

impl DedupTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// A tracker that treats every item as new and records nothing.
    pub fn bypassed() -> Self {
        Self {
            bypass: true,
            ..Self::default()
        }
    }

    pub fn is_bypassed(&self) -> bool {
        self.bypass
    }

    /// Returns the items not seen before, in input order, and records them.
    ///
    /// Duplicates within `items` itself are also collapsed to the first one.
    pub fn filter_new(&mut self, items: Vec<FeedItem>) -> Vec<FeedItem> {
        if self.bypass {
            tracing::debug!(count = items.len(), "Dedup bypassed, passing all items");
            return items;
        }

        let mut fresh = Vec::with_capacity(items.len());
        for item in items {
            let key = seen_key(&item);
            if self.keys.contains(&key) {
                tracing::debug!(title = %item.title, "Item already sent, skipping");
                continue;
            }
            self.insert(key);
            fresh.push(item);
        }
        fresh
    }

    pub fn contains(&self, item: &FeedItem) -> bool {
        self.keys.contains(&seen_key(item))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn insert(&mut self, key: String) {
        self.keys.insert(key.clone());
        self.order.push_back(key);

        if self.order.len() > SEEN_CAPACITY {
            let evict = self.order.len() - SEEN_RETAIN;
            for old in self.order.drain(..evict) {
                self.keys.remove(&old);
            }
            tracing::debug!(evicted = evict, retained = SEEN_RETAIN, "Seen set trimmed");
        }
    }
}
