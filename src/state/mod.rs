//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlState`: the frontier, the visited keys, and the failure logs
//! - `Frontier`: admission rules deciding which URLs may enter the frontier
//! - `JsonStore`: crash-consistent JSON persistence shared by state and stats

mod crawl_state;
mod store;

// Re-export main types
pub use crawl_state::{CrawlState, Frontier, Requeue, VisitedKey};
pub use store::{JsonStore, StateError, StateResult};
