//! Crawler module for archive page fetching and crawl coordination
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with retry and backoff
//! - The crawl lifecycle phases
//! - The step-by-step crawl loop with persistence after every step

mod coordinator;
mod fetcher;
mod phase;

pub use coordinator::{Coordinator, StepOutcome};
pub use fetcher::{
    build_http_client, parse_retry_after, FetchError, FetchOutcome, Fetcher, RetryPolicy,
    TransientFailure,
};
pub use phase::CrawlPhase;

use crate::config::Config;
use crate::HarvestError;

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Load the persisted state and stats, or seed the frontier
/// 2. Build the HTTP client
/// 3. Step through the frontier until it drains or the run is interrupted
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `config_hash` - Hash of the configuration file, stored alongside the state
/// * `fresh` - Whether to discard previous state first
///
/// # Returns
///
/// The phase the crawl stopped in: `Draining` when finished, `Suspended`
/// when interrupted.
pub async fn crawl(
    config: Config,
    config_hash: &str,
    fresh: bool,
) -> Result<CrawlPhase, HarvestError> {
    let mut coordinator = Coordinator::new(config, fresh)?;
    coordinator.set_config_hash(config_hash);
    coordinator.run().await
}
