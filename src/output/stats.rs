//! Post statistics accumulated over a crawl
//!
//! `CrawlStats` only ever grows: every extracted post adds one to its year
//! and one record to the flat list. It is persisted next to the crawl state
//! after every processed page.

use crate::extract::Post;
use crate::output::CrawlSummary;
use crate::state::{JsonStore, StateError, StateResult, VisitedKey};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One line of the dates and titles report
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PostRecord {
    /// Publication timestamp as extracted, possibly empty
    pub date: String,
    pub title: String,
}

/// Per-year counts and the flat list of posts seen so far
///
/// Invariant: `total_count == sum(counts_by_year) == records.len()`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrawlStats {
    #[serde(rename = "articles_per_year")]
    counts_by_year: BTreeMap<String, u64>,

    #[serde(rename = "total_articles")]
    total_count: u64,

    #[serde(rename = "articles")]
    records: Vec<PostRecord>,

    /// Pages whose posts are already counted
    ///
    /// Stats are written before the crawl state, so a crash between the two
    /// writes replays a page whose posts are already in here.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    counted_pages: BTreeSet<VisitedKey>,
}

impl CrawlStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counts_by_year(&self) -> &BTreeMap<String, u64> {
        &self.counts_by_year
    }

    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    pub fn records(&self) -> &[PostRecord] {
        &self.records
    }

    /// Folds a batch of posts into the statistics
    pub fn update(&mut self, posts: &[Post]) {
        for post in posts {
            *self.counts_by_year.entry(post.year.clone()).or_insert(0) += 1;
            self.records.push(PostRecord {
                date: post.published.clone(),
                title: post.title.clone(),
            });
        }
        self.total_count += posts.len() as u64;
    }

    /// Counts the posts of one page, once
    ///
    /// Returns false, leaving the stats untouched, if the page was counted
    /// before.
    pub fn record_page(&mut self, page: &VisitedKey, posts: &[Post]) -> bool {
        if posts.is_empty() {
            return true;
        }
        if !self.counted_pages.insert(page.clone()) {
            return false;
        }
        self.update(posts);
        true
    }

    pub fn is_counted(&self, page: &VisitedKey) -> bool {
        self.counted_pages.contains(page)
    }

    /// Checks the conservation invariant
    ///
    /// Returns a description of the mismatch if the counts disagree.
    pub fn check_consistency(&self) -> Result<(), String> {
        let per_year: u64 = self.counts_by_year.values().sum();
        let records = self.records.len() as u64;

        if self.total_count == per_year && per_year == records {
            Ok(())
        } else {
            Err(format!(
                "total {} / per-year sum {} / records {}",
                self.total_count, per_year, records
            ))
        }
    }
}

/// Loads stats from `store`, rejecting a file whose counts disagree
pub fn load_stats(store: &JsonStore<CrawlStats>) -> StateResult<CrawlStats> {
    let stats = store.load()?;
    stats
        .check_consistency()
        .map_err(|reason| StateError::Inconsistent {
            path: store.path().to_path_buf(),
            reason,
        })?;
    Ok(stats)
}

/// Prints progress and post statistics to stdout
pub fn print_statistics(summary: &CrawlSummary) {
    println!("=== Harvest Statistics ===\n");

    println!("Pages:");
    println!("  Visited: {}", summary.pages_visited);
    println!("  Pending: {}", summary.pages_pending);
    println!("  Not found (404): {}", summary.pages_not_found);
    println!("  Abandoned: {}", summary.pages_abandoned);
    println!("  Success rate: {:.1}%", summary.success_rate());
    println!();

    println!("Posts: {}", summary.total_posts);
    for (year, count) in &summary.posts_per_year {
        println!("  {}: {}", year, count);
    }
    println!();

    if summary.is_complete() {
        println!("Crawl complete.");
    } else {
        println!("Crawl incomplete, rerun to resume.");
    }
}
