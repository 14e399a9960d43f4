//! Extractor for WordPress monthly archive pages
//!
//! The default selectors match the classic WordPress markup:
//!
//! ```html
//! <div id="content">
//!   <article id="post-42">
//!     <a rel="bookmark">Title</a>
//!     <div class="entry-content">...</div>
//!     <footer class="entry-meta"><time class="entry-date" datetime="..."></time></footer>
//!   </article>
//! </div>
//! <aside id="flexo-archives-3"><a href="?m=201903">March 2019</a></aside>
//! ```

use crate::config::ExtractConfig;
use crate::extract::{html_to_markdown, Document, Post, PostExtractor};
use crate::url::resolve_link;
use crate::ConfigError;
use scraper::{ElementRef, Selector};

/// Title used when a post has no bookmark link
const UNTITLED: &str = "No Title";

/// CSS-selector driven extractor for WordPress archive pages
#[derive(Debug, Clone)]
pub struct WordPressExtractor {
    content: Selector,
    article: Selector,
    title: Selector,
    body: Selector,
    date: Selector,
    archive_link: Selector,
}

impl WordPressExtractor {
    /// Compiles the configured selectors
    pub fn new(config: &ExtractConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            content: compile("content-selector", &config.content_selector)?,
            article: compile("article-selector", &config.article_selector)?,
            title: compile("title-selector", &config.title_selector)?,
            body: compile("body-selector", &config.body_selector)?,
            date: compile("date-selector", &config.date_selector)?,
            archive_link: compile("archive-link-selector", &config.archive_link_selector)?,
        })
    }

    fn parse_article(&self, article: ElementRef<'_>) -> Option<Post> {
        let id = article.value().attr("id")?.to_string();

        let title = article
            .select(&self.title)
            .next()
            .map(|a| a.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| UNTITLED.to_string());

        let content_html = article
            .select(&self.body)
            .next()
            .map(|body| body.html())
            .unwrap_or_default();
        let content_markdown = html_to_markdown(&content_html);

        let published = article
            .select(&self.date)
            .next()
            .map(|time| {
                time.value()
                    .attr("datetime")
                    .map(str::to_string)
                    .unwrap_or_else(|| time.text().collect::<String>())
                    .trim()
                    .to_string()
            })
            .unwrap_or_default();

        let year = Post::year_of(&published);

        Some(Post {
            id,
            title,
            content_markdown,
            content_html,
            published,
            year,
        })
    }
}

impl PostExtractor for WordPressExtractor {
    fn extract_posts(&self, document: &Document) -> Vec<Post> {
        let Some(content) = document.html.select(&self.content).next() else {
            return Vec::new();
        };

        content
            .select(&self.article)
            .filter_map(|article| self.parse_article(article))
            .collect()
    }

    fn extract_followup_links(&self, document: &Document) -> Vec<String> {
        document
            .html
            .select(&self.archive_link)
            .filter_map(|a| a.value().attr("href"))
            .filter_map(|href| resolve_link(href, &document.url))
            .collect()
    }
}

fn compile(field: &'static str, selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector).map_err(|_| ConfigError::InvalidSelector {
        field,
        selector: selector.to_string(),
    })
}
