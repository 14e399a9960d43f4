//! Output traits and types
//!
//! This module defines the emission interface the crawl loop hands posts to,
//! the output error type, and the summary shown by `--stats`.

use crate::extract::Post;
use crate::output::CrawlStats;
use crate::state::CrawlState;
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Receives every post extracted during the crawl
///
/// Implementations must be idempotent per post: a page whose processing was
/// interrupted before it was marked visited is fetched again on resume and
/// its posts are emitted a second time.
pub trait PostSink {
    /// Persists one post
    fn emit(&mut self, post: &Post) -> OutputResult<()>;
}

/// Snapshot of crawl progress for display
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrawlSummary {
    pub pages_pending: usize,
    pub pages_visited: usize,
    pub pages_not_found: usize,
    pub pages_abandoned: usize,
    pub total_posts: u64,
    pub posts_per_year: BTreeMap<String, u64>,
}

impl CrawlSummary {
    pub fn new(state: &CrawlState, stats: &CrawlStats) -> Self {
        Self {
            pages_pending: state.pending().len(),
            pages_visited: state.visited().len(),
            pages_not_found: state.failed_permanently().len(),
            pages_abandoned: state.abandoned().len(),
            total_posts: stats.total_count(),
            posts_per_year: stats.counts_by_year().clone(),
        }
    }

    /// Returns true once nothing is left to fetch
    pub fn is_complete(&self) -> bool {
        self.pages_pending == 0
    }

    /// Share of finished pages that were fetched successfully, as a percentage
    pub fn success_rate(&self) -> f64 {
        let finished = self.pages_visited + self.pages_not_found + self.pages_abandoned;
        if finished == 0 {
            return 0.0;
        }
        (self.pages_visited as f64 / finished as f64) * 100.0
    }
}
