/// Crawl state definitions and frontier rules
///
/// `CrawlState` is the plain data that survives restarts. `Frontier` owns the
/// rules deciding which URLs may enter it, expressed through `VisitedKey`s.
use crate::url::identity_of;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

/// Normalized identity of an archive page
///
/// Several URL spellings can denote the same logical page; deduplication
/// always goes through this key, never through raw URL strings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VisitedKey(String);

impl VisitedKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VisitedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VisitedKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Persistent crawl progress
///
/// The serialized field names match the on-disk format of earlier harvests so
/// their state files can be resumed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrawlState {
    /// URLs waiting to be fetched, in breadth-first order
    #[serde(rename = "urls_to_crawl")]
    pending: VecDeque<String>,

    /// Keys of pages that have been fully processed
    #[serde(rename = "crawled_urls")]
    visited: BTreeSet<VisitedKey>,

    /// URLs that answered 404
    #[serde(rename = "errors_404")]
    failed_permanently: Vec<String>,

    /// URLs given up on after too many failed passes
    #[serde(default)]
    abandoned: Vec<String>,

    /// How many times each key went back to the frontier after a failed fetch
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    requeue_counts: BTreeMap<VisitedKey, u32>,

    /// SHA-256 of the configuration the state was last written under
    #[serde(default, skip_serializing_if = "Option::is_none")]
    config_hash: Option<String>,
}

impl CrawlState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> &VecDeque<String> {
        &self.pending
    }

    pub fn visited(&self) -> &BTreeSet<VisitedKey> {
        &self.visited
    }

    pub fn failed_permanently(&self) -> &[String] {
        &self.failed_permanently
    }

    pub fn abandoned(&self) -> &[String] {
        &self.abandoned
    }

    pub fn is_visited(&self, key: &VisitedKey) -> bool {
        self.visited.contains(key)
    }

    /// Removes the head of the frontier
    pub fn pop_pending(&mut self) -> Option<String> {
        self.pending.pop_front()
    }

    pub fn requeue_count(&self, key: &VisitedKey) -> u32 {
        self.requeue_counts.get(key).copied().unwrap_or(0)
    }

    pub fn config_hash(&self) -> Option<&str> {
        self.config_hash.as_deref()
    }

    pub fn set_config_hash(&mut self, hash: impl Into<String>) {
        self.config_hash = Some(hash.into());
    }
}

/// Outcome of sending a failed URL back to the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requeue {
    /// Appended to the tail; carries the number of re-queues so far
    Queued(u32),
    /// Ceiling reached; moved to the abandoned list
    Abandoned,
}

/// Admission rules for the crawl frontier
///
/// All mutations of `CrawlState` that depend on URL identity go through here
/// so that the dedup invariant holds: `pending` never holds a URL whose key
/// is visited, failed, or abandoned.
#[derive(Debug, Clone)]
pub struct Frontier {
    key_param: String,
}

impl Frontier {
    /// Creates frontier rules keyed on the given query parameter
    pub fn new(key_param: impl Into<String>) -> Self {
        Self {
            key_param: key_param.into(),
        }
    }

    /// Computes the identity of a URL
    pub fn normalize(&self, url: &str) -> VisitedKey {
        VisitedKey(identity_of(url, &self.key_param))
    }

    /// Appends `url` unless its key is visited, pending, or closed
    ///
    /// Returns true if the URL was appended.
    pub fn enqueue_if_new(&self, state: &mut CrawlState, url: &str) -> bool {
        let key = self.normalize(url);

        if state.visited.contains(&key) || self.is_closed(state, &key) {
            return false;
        }

        if state.pending.iter().any(|p| self.normalize(p) == key) {
            return false;
        }

        state.pending.push_back(url.to_string());
        true
    }

    /// Marks the key of `url` as visited; marking twice is a no-op
    ///
    /// Returns true if the key was newly inserted.
    pub fn mark_visited(&self, state: &mut CrawlState, url: &str) -> bool {
        let key = self.normalize(url);
        state.requeue_counts.remove(&key);
        state.visited.insert(key)
    }

    /// Records a 404 for `url`; each URL is recorded at most once
    pub fn record_not_found(&self, state: &mut CrawlState, url: &str) {
        let key = self.normalize(url);
        state.requeue_counts.remove(&key);
        if !state.failed_permanently.iter().any(|u| u == url) {
            state.failed_permanently.push(url.to_string());
        }
    }

    /// Sends a URL whose fetch attempts ran out back to the tail of the frontier
    ///
    /// After `max_requeues` re-queues the URL is abandoned instead.
    pub fn requeue(&self, state: &mut CrawlState, url: &str, max_requeues: u32) -> Requeue {
        let key = self.normalize(url);
        let count = state.requeue_count(&key);

        if count >= max_requeues {
            state.requeue_counts.remove(&key);
            if !state.abandoned.iter().any(|u| u == url) {
                state.abandoned.push(url.to_string());
            }
            return Requeue::Abandoned;
        }

        state.requeue_counts.insert(key, count + 1);
        state.pending.push_back(url.to_string());
        Requeue::Queued(count + 1)
    }

    /// Abandons a URL immediately, e.g. one that can never be requested
    pub fn abandon(&self, state: &mut CrawlState, url: &str) {
        let key = self.normalize(url);
        state.requeue_counts.remove(&key);
        if !state.abandoned.iter().any(|u| u == url) {
            state.abandoned.push(url.to_string());
        }
    }

    fn is_closed(&self, state: &CrawlState, key: &VisitedKey) -> bool {
        state
            .failed_permanently
            .iter()
            .chain(state.abandoned.iter())
            .any(|u| &self.normalize(u) == key)
    }
}
