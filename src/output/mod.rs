//! Output module for harvested posts and crawl reports
//!
//! This module handles:
//! - Accumulating post statistics across the crawl
//! - Writing each post as Markdown and HTML files
//! - Regenerating the plain-text reports after every step

mod posts;
mod report;
pub mod stats;
mod traits;

pub use posts::{file_stem, PostWriter};
pub use report::{format_report, write_report, write_url_list};
pub use stats::{load_stats, print_statistics, CrawlStats, PostRecord};
pub use traits::{CrawlSummary, OutputError, OutputResult, PostSink};

use crate::config::OutputConfig;
use crate::state::CrawlState;
use std::path::Path;

/// Regenerates every plain-text report from the current state and stats
pub fn write_reports(
    config: &OutputConfig,
    state: &CrawlState,
    stats: &CrawlStats,
) -> OutputResult<()> {
    write_report(stats, Path::new(&config.report_path))?;
    write_url_list(state.failed_permanently(), Path::new(&config.errors_path))?;
    write_url_list(state.abandoned(), Path::new(&config.abandoned_path))?;
    Ok(())
}
