//! Post extraction boundary
//!
//! The crawl loop only knows this module through [`PostExtractor`]: given a
//! fetched [`Document`] it asks for the posts on the page and for the archive
//! pages to visit next. Everything about a particular site's markup lives in
//! an implementation of that trait.

mod convert;
mod wordpress;

pub use convert::html_to_markdown;
pub use wordpress::WordPressExtractor;

use scraper::Html;
use url::Url;

/// A fetched and parsed archive page
#[derive(Debug)]
pub struct Document {
    /// Final URL the body was served from, used to resolve relative links
    pub url: Url,

    /// Parsed HTML tree
    pub html: Html,
}

impl Document {
    pub fn parse(url: Url, body: &str) -> Self {
        Self {
            url,
            html: Html::parse_document(body),
        }
    }
}

/// A single post found on an archive page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    /// Site-assigned identifier (the article element's `id`)
    pub id: String,

    pub title: String,

    /// Body converted to Markdown
    pub content_markdown: String,

    /// Body as it appeared in the page
    pub content_html: String,

    /// ISO-8601 publication timestamp, or empty when the page has none
    pub published: String,

    /// Four-digit year taken from `published`, or `"unknown"`
    pub year: String,
}

impl Post {
    /// Derives the `year` field from an ISO-8601 timestamp
    pub fn year_of(published: &str) -> String {
        match published.get(..4) {
            Some(year) if year.chars().all(|c| c.is_ascii_digit()) => year.to_string(),
            _ => "unknown".to_string(),
        }
    }
}

/// Site-specific extraction used by the crawl loop
pub trait PostExtractor {
    /// Returns every post embedded in the document, in page order
    fn extract_posts(&self, document: &Document) -> Vec<Post>;

    /// Returns absolute URLs of further archive index pages
    fn extract_followup_links(&self, document: &Document) -> Vec<String>;
}
