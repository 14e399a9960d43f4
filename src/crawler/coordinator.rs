//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the crawl loop that coordinates:
//! - Loading (or seeding) the persisted crawl state and statistics
//! - Popping frontier entries in breadth-first order
//! - Fetching, extracting, and emitting posts
//! - Persisting state, stats, and reports after every step
//! - Stopping when the frontier drains or the run is interrupted

use crate::config::Config;
use crate::crawler::{CrawlPhase, FetchError, FetchOutcome, Fetcher};
use crate::extract::{PostExtractor, WordPressExtractor};
use crate::output::{load_stats, write_reports, CrawlStats, PostSink, PostWriter};
use crate::state::{CrawlState, Frontier, JsonStore, Requeue};
use crate::HarvestError;
use std::time::Instant;

/// What a single step did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Page fetched; its posts were emitted and its links enqueued
    Processed {
        url: String,
        posts: usize,
        new_links: usize,
    },

    /// Page was already visited under another spelling
    Skipped { url: String },

    /// Page answered 404 and was recorded as a permanent failure
    NotFound { url: String },

    /// Fetch attempts ran out; the page went back to the tail of the frontier
    Requeued { url: String, requeues: u32 },

    /// Page was given up on
    Abandoned { url: String },

    /// Nothing left to do
    Drained,
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Config,
    fetcher: Fetcher,
    extractor: Box<dyn PostExtractor>,
    sink: Box<dyn PostSink>,
    frontier: Frontier,
    state_store: JsonStore<CrawlState>,
    stats_store: JsonStore<CrawlStats>,
    state: CrawlState,
    stats: CrawlStats,
    phase: CrawlPhase,
}

impl Coordinator {
    /// Creates a coordinator with the WordPress extractor and the file writer
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `fresh` - Whether to discard the persisted state and stats first
    pub fn new(config: Config, fresh: bool) -> Result<Self, HarvestError> {
        if fresh {
            tracing::info!("Discarding previous crawl state");
            JsonStore::<CrawlState>::new(&config.output.state_path).remove()?;
            JsonStore::<CrawlStats>::new(&config.output.stats_path).remove()?;
        }

        let fetcher = Fetcher::from_config(&config)?;
        let extractor = WordPressExtractor::new(&config.extract)?;
        let sink = PostWriter::new(&config.output.posts_dir)?;

        Self::with_collaborators(config, fetcher, Box::new(extractor), Box::new(sink))
    }

    /// Creates a coordinator from explicit collaborators and loads persisted state
    ///
    /// A first run (nothing pending, nothing visited) is seeded with the
    /// configured start URL. Corrupt or inconsistent files are fatal.
    pub fn with_collaborators(
        config: Config,
        fetcher: Fetcher,
        extractor: Box<dyn PostExtractor>,
        sink: Box<dyn PostSink>,
    ) -> Result<Self, HarvestError> {
        let frontier = Frontier::new(&config.crawler.key_param);
        let state_store = JsonStore::new(&config.output.state_path);
        let stats_store = JsonStore::new(&config.output.stats_path);

        let (state, stats) = load_records(&state_store, &stats_store, &frontier, &config)?;

        Ok(Self {
            config,
            fetcher,
            extractor,
            sink,
            frontier,
            state_store,
            stats_store,
            state,
            stats,
            phase: CrawlPhase::Idle,
        })
    }

    /// Records the configuration hash, warning if it differs from the stored one
    pub fn set_config_hash(&mut self, hash: &str) {
        if let Some(previous) = self.state.config_hash() {
            if previous != hash {
                tracing::warn!(
                    previous,
                    current = hash,
                    "Configuration changed since the last run"
                );
            }
        }
        self.state.set_config_hash(hash);
    }

    pub fn phase(&self) -> CrawlPhase {
        self.phase
    }

    pub fn state(&self) -> &CrawlState {
        &self.state
    }

    pub fn stats(&self) -> &CrawlStats {
        &self.stats
    }

    /// Runs until the frontier drains or the process is interrupted
    pub async fn run(&mut self) -> Result<CrawlPhase, HarvestError> {
        self.run_until(None).await
    }

    /// Runs at most `max_steps` steps
    pub async fn run_steps(&mut self, max_steps: usize) -> Result<CrawlPhase, HarvestError> {
        self.run_until(Some(max_steps)).await
    }

    async fn run_until(&mut self, limit: Option<usize>) -> Result<CrawlPhase, HarvestError> {
        if self.phase.is_finished() {
            return Ok(self.phase);
        }

        self.transition(CrawlPhase::Running)?;
        tracing::info!(
            pending = self.state.pending().len(),
            visited = self.state.visited().len(),
            posts = self.stats.total_count(),
            "Crawl running"
        );

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        let start_time = Instant::now();
        let mut steps = 0usize;

        loop {
            if self.state.pending().is_empty() {
                tracing::info!("Frontier is empty, crawl complete");
                self.transition(CrawlPhase::Draining)?;
                break;
            }

            if limit.is_some_and(|max| steps >= max) {
                tracing::info!(steps, "Step limit reached, suspending");
                self.transition(CrawlPhase::Suspended)?;
                break;
            }

            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    tracing::info!("Interrupt received, suspending");
                    self.suspend()?;
                    break;
                }
                outcome = self.step() => {
                    outcome?;
                    steps += 1;
                }
            }

            if steps % 10 == 0 {
                tracing::info!(
                    "Progress: {} steps, {} pending, {} posts, {:.1}s elapsed",
                    steps,
                    self.state.pending().len(),
                    self.stats.total_count(),
                    start_time.elapsed().as_secs_f64()
                );
            }
        }

        tracing::info!(
            phase = %self.phase,
            steps,
            visited = self.state.visited().len(),
            not_found = self.state.failed_permanently().len(),
            abandoned = self.state.abandoned().len(),
            posts = self.stats.total_count(),
            "Crawl stopped after {:?}",
            start_time.elapsed()
        );

        Ok(self.phase)
    }

    /// Processes the head of the frontier
    ///
    /// Every outcome except `Drained` ends with state, stats, and reports
    /// persisted. If the step fails, the in-memory records are reset to the
    /// last persisted ones, so the popped URL is pending again.
    pub async fn step(&mut self) -> Result<StepOutcome, HarvestError> {
        let Some(url) = self.state.pop_pending() else {
            return Ok(StepOutcome::Drained);
        };

        match self.process(url).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                tracing::error!(error = %err, "Step failed, restoring last persisted state");
                self.restore()?;
                Err(err)
            }
        }
    }

    async fn process(&mut self, url: String) -> Result<StepOutcome, HarvestError> {
        let key = self.frontier.normalize(&url);
        if self.state.is_visited(&key) {
            tracing::debug!(url = %url, key = %key, "Already visited, skipping");
            self.persist()?;
            return Ok(StepOutcome::Skipped { url });
        }

        tracing::debug!(url = %url, key = %key, "Processing");

        let outcome = match self.fetcher.fetch(&url).await {
            Ok(FetchOutcome::Document(document)) => {
                let posts = self.extractor.extract_posts(&document);
                let links = self.extractor.extract_followup_links(&document);
                drop(document);

                for post in &posts {
                    self.sink.emit(post)?;
                }
                if !self.stats.record_page(&key, &posts) {
                    tracing::info!(url = %url, key = %key, "Posts already counted, not counting again");
                }

                self.frontier.mark_visited(&mut self.state, &url);
                let new_links = links
                    .iter()
                    .filter(|link| self.frontier.enqueue_if_new(&mut self.state, link))
                    .count();

                tracing::info!(url = %url, posts = posts.len(), new_links, "Processed page");
                StepOutcome::Processed {
                    url,
                    posts: posts.len(),
                    new_links,
                }
            }

            Ok(FetchOutcome::NotFound) => {
                self.frontier.record_not_found(&mut self.state, &url);
                tracing::warn!(url = %url, "Recorded as not found");
                StepOutcome::NotFound { url }
            }

            Err(FetchError::Exhausted { attempts, last, .. }) => {
                let max_requeues = self.config.crawler.max_requeues;
                match self.frontier.requeue(&mut self.state, &url, max_requeues) {
                    Requeue::Queued(requeues) => {
                        tracing::warn!(
                            url = %url,
                            attempts,
                            requeues,
                            error = %last,
                            "Fetch failed, moved to the back of the frontier"
                        );
                        StepOutcome::Requeued { url, requeues }
                    }
                    Requeue::Abandoned => {
                        tracing::error!(
                            url = %url,
                            max_requeues,
                            error = %last,
                            "Fetch keeps failing, abandoning"
                        );
                        StepOutcome::Abandoned { url }
                    }
                }
            }

            Err(err @ FetchError::InvalidUrl { .. }) => {
                tracing::error!(url = %url, error = %err, "Cannot fetch, abandoning");
                self.frontier.abandon(&mut self.state, &url);
                StepOutcome::Abandoned { url }
            }
        };

        self.persist()?;
        Ok(outcome)
    }

    /// Writes stats, state, and reports
    ///
    /// Stats are written before state. A crash between the two renames
    /// replays the page on resume; its posts are not counted twice because
    /// the stats remember which pages they already hold.
    fn persist(&self) -> Result<(), HarvestError> {
        self.stats_store.save(&self.stats)?;
        self.state_store.save(&self.state)?;
        write_reports(&self.config.output, &self.state, &self.stats)?;
        tracing::trace!(
            pending = self.state.pending().len(),
            "Persisted crawl state"
        );
        Ok(())
    }

    /// Moves to `Suspended`, dropping any in-flight step
    fn suspend(&mut self) -> Result<(), HarvestError> {
        self.transition(CrawlPhase::Suspended)?;
        self.restore()
    }

    /// Replaces the in-memory records with the persisted ones
    ///
    /// Afterwards they match exactly what a restarted process would see.
    fn restore(&mut self) -> Result<(), HarvestError> {
        let (state, stats) = load_records(
            &self.state_store,
            &self.stats_store,
            &self.frontier,
            &self.config,
        )?;
        let hash = self.state.config_hash().map(str::to_string);
        self.state = state;
        self.stats = stats;
        if let Some(hash) = hash {
            self.state.set_config_hash(hash);
        }
        Ok(())
    }

    fn transition(&mut self, to: CrawlPhase) -> Result<(), HarvestError> {
        if !self.phase.can_transition_to(to) {
            return Err(HarvestError::InvalidTransition {
                from: self.phase,
                to,
            });
        }
        tracing::debug!(from = %self.phase, to = %to, "Phase change");
        self.phase = to;
        Ok(())
    }
}

/// Loads state and stats, seeding the frontier on a first run
fn load_records(
    state_store: &JsonStore<CrawlState>,
    stats_store: &JsonStore<CrawlStats>,
    frontier: &Frontier,
    config: &Config,
) -> Result<(CrawlState, CrawlStats), HarvestError> {
    let mut state = state_store.load()?;
    let stats = load_stats(stats_store)?;

    if state.pending().is_empty() && state.visited().is_empty() {
        if frontier.enqueue_if_new(&mut state, &config.crawler.start_url) {
            tracing::info!(url = %config.crawler.start_url, "Seeded frontier");
        }
    } else {
        tracing::info!(
            pending = state.pending().len(),
            visited = state.visited().len(),
            "Resuming from {}",
            state_store.path().display()
        );
    }

    Ok((state, stats))
}
