//! Plain-text reports regenerated after every step
//!
//! - the dates and titles report: per-year counts, a blank line, then one
//!   `YYYY-MM-DD HH:MM title` line per post in chronological order
//! - URL lists: one URL per line (404s, abandoned pages)

use crate::output::stats::{CrawlStats, PostRecord};
use crate::output::traits::{OutputError, OutputResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::fs;
use std::path::Path;

/// Formats the dates and titles report
pub fn format_report(stats: &CrawlStats) -> String {
    let mut out = String::new();

    for (year, count) in stats.counts_by_year() {
        out.push_str(&format!("{}, {} posts\n", year, count));
    }
    out.push('\n');

    let mut records: Vec<(Option<NaiveDateTime>, &PostRecord)> = stats
        .records()
        .iter()
        .map(|r| (parse_timestamp(&r.date), r))
        .collect();

    // Stable: posts sharing a timestamp keep discovery order; undated last
    records.sort_by(|a, b| match (a.0, b.0) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });

    for (timestamp, record) in records {
        let when = match timestamp {
            Some(ts) => ts.format("%Y-%m-%d %H:%M").to_string(),
            None if record.date.trim().is_empty() => "unknown".to_string(),
            None => record.date.trim().to_string(),
        };
        out.push_str(&format!("{} {}\n", when, record.title));
    }

    out
}

/// Parses an ISO-8601 timestamp, keeping its local wall-clock time
fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_local());
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt);
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Rewrites the dates and titles report
pub fn write_report(stats: &CrawlStats, path: &Path) -> OutputResult<()> {
    write_file(path, &format_report(stats))
}

/// Rewrites a newline-delimited URL list
pub fn write_url_list(urls: &[String], path: &Path) -> OutputResult<()> {
    let mut content = String::new();
    for url in urls {
        content.push_str(url);
        content.push('\n');
    }
    write_file(path, &content)
}

fn write_file(path: &Path, content: &str) -> OutputResult<()> {
    fs::write(path, content).map_err(|source| OutputError::Write {
        path: path.to_path_buf(),
        source,
    })
}
