use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Archive-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub extract: ExtractConfig,
}

/// Crawl loop configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Seed URL the frontier starts from on a first run
    #[serde(rename = "start-url")]
    pub start_url: String,

    /// Query parameter that identifies a logical archive page
    #[serde(rename = "key-param", default = "default_key_param")]
    pub key_param: String,

    /// How many times a URL may go back to the frontier after exhausting
    /// its fetch attempts before it is abandoned
    #[serde(rename = "max-requeues", default = "default_max_requeues")]
    pub max_requeues: u32,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl CrawlerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Fetch retry policy
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per fetch, including the first
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Lower bound of the computed backoff (seconds)
    #[serde(rename = "min-backoff-secs", default = "default_min_backoff")]
    pub min_backoff_secs: u64,

    /// Upper bound of the computed backoff (seconds)
    #[serde(rename = "max-backoff-secs", default = "default_max_backoff")]
    pub max_backoff_secs: u64,

    /// Multiplier applied to the doubling sequence
    #[serde(rename = "backoff-multiplier", default = "default_backoff_multiplier")]
    pub backoff_multiplier: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            min_backoff_secs: default_min_backoff(),
            max_backoff_secs: default_max_backoff(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url", default)]
    pub contact_url: Option<String>,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email", default)]
    pub contact_email: Option<String>,
}

impl UserAgentConfig {
    /// Formats the User-Agent header: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        let contact: Vec<String> = [
            self.contact_url.as_ref().map(|u| format!("+{}", u)),
            self.contact_email.clone(),
        ]
        .into_iter()
        .flatten()
        .collect();

        if contact.is_empty() {
            format!("{}/{}", self.crawler_name, self.crawler_version)
        } else {
            format!(
                "{}/{} ({})",
                self.crawler_name,
                self.crawler_version,
                contact.join("; ")
            )
        }
    }
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "Archive-Harvest".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: None,
            contact_email: None,
        }
    }
}

/// Output locations
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Crawl state file (frontier, visited keys, failures)
    #[serde(rename = "state-path", default = "default_state_path")]
    pub state_path: String,

    /// Post statistics file
    #[serde(rename = "stats-path", default = "default_stats_path")]
    pub stats_path: String,

    /// Human-readable dates and titles report
    #[serde(rename = "report-path", default = "default_report_path")]
    pub report_path: String,

    /// Newline-delimited list of URLs that returned 404
    #[serde(rename = "errors-path", default = "default_errors_path")]
    pub errors_path: String,

    /// Newline-delimited list of URLs given up after repeated failures
    #[serde(rename = "abandoned-path", default = "default_abandoned_path")]
    pub abandoned_path: String,

    /// Directory receiving one Markdown and one HTML file per post
    #[serde(rename = "posts-dir", default = "default_posts_dir")]
    pub posts_dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            state_path: default_state_path(),
            stats_path: default_stats_path(),
            report_path: default_report_path(),
            errors_path: default_errors_path(),
            abandoned_path: default_abandoned_path(),
            posts_dir: default_posts_dir(),
        }
    }
}

/// CSS selectors used by the archive page extractor
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractConfig {
    /// Container holding the posts of an archive page
    #[serde(rename = "content-selector", default = "default_content_selector")]
    pub content_selector: String,

    /// One element per post, must carry an `id` attribute
    #[serde(rename = "article-selector", default = "default_article_selector")]
    pub article_selector: String,

    #[serde(rename = "title-selector", default = "default_title_selector")]
    pub title_selector: String,

    #[serde(rename = "body-selector", default = "default_body_selector")]
    pub body_selector: String,

    #[serde(rename = "date-selector", default = "default_date_selector")]
    pub date_selector: String,

    /// Anchors pointing at further archive index pages
    #[serde(rename = "archive-link-selector", default = "default_archive_link_selector")]
    pub archive_link_selector: String,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            content_selector: default_content_selector(),
            article_selector: default_article_selector(),
            title_selector: default_title_selector(),
            body_selector: default_body_selector(),
            date_selector: default_date_selector(),
            archive_link_selector: default_archive_link_selector(),
        }
    }
}

fn default_key_param() -> String {
    "m".to_string()
}

fn default_max_requeues() -> u32 {
    10
}

fn default_request_timeout() -> u64 {
    60
}

fn default_max_attempts() -> u32 {
    5
}

fn default_min_backoff() -> u64 {
    30
}

fn default_max_backoff() -> u64 {
    300
}

fn default_backoff_multiplier() -> u64 {
    5
}

fn default_state_path() -> String {
    "crawl_state.json".to_string()
}

fn default_stats_path() -> String {
    "crawl_stats.json".to_string()
}

fn default_report_path() -> String {
    "post_dates_titles.txt".to_string()
}

fn default_errors_path() -> String {
    "errors_404.txt".to_string()
}

fn default_abandoned_path() -> String {
    "abandoned_urls.txt".to_string()
}

fn default_posts_dir() -> String {
    "blog_posts".to_string()
}

fn default_content_selector() -> String {
    "div#content".to_string()
}

fn default_article_selector() -> String {
    "article[id]".to_string()
}

fn default_title_selector() -> String {
    "a[rel='bookmark']".to_string()
}

fn default_body_selector() -> String {
    "div.entry-content".to_string()
}

fn default_date_selector() -> String {
    "footer.entry-meta time.entry-date".to_string()
}

fn default_archive_link_selector() -> String {
    "aside#flexo-archives-3 a[href]".to_string()
}
