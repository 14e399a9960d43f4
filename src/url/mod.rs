//! URL handling module for Archive-Harvest
//!
//! This module derives page identities from URLs and resolves the links found
//! on archive pages against the page they came from.

mod normalize;
mod resolve;

// Re-export main functions
pub use normalize::{identity_of, normalize_url};
pub use resolve::resolve_link;
