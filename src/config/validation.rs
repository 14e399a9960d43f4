use crate::config::types::{
    Config, CrawlerConfig, ExtractConfig, OutputConfig, RetryConfig, UserAgentConfig,
};
use crate::ConfigError;
use scraper::Selector;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_retry_config(&config.retry)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_extract_config(&config.extract)?;
    Ok(())
}

/// Validates crawl loop configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.start_url).map_err(|e| {
        ConfigError::InvalidUrl(format!("Invalid start-url '{}': {}", config.start_url, e))
    })?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "start-url '{}' must use http or https",
            config.start_url
        )));
    }

    if config.key_param.trim().is_empty() {
        return Err(ConfigError::Validation(
            "key-param cannot be empty".to_string(),
        ));
    }

    if config.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request-timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates the retry policy bounds
fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "max-attempts must be >= 1, got {}",
            config.max_attempts
        )));
    }

    if config.min_backoff_secs > config.max_backoff_secs {
        return Err(ConfigError::Validation(format!(
            "min-backoff-secs ({}) cannot exceed max-backoff-secs ({})",
            config.min_backoff_secs, config.max_backoff_secs
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler-name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler-name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    if let Some(contact_url) = &config.contact_url {
        Url::parse(contact_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact-url: {}", e)))?;
    }

    if let Some(email) = &config.contact_email {
        validate_email(email)?;
    }

    Ok(())
}

/// Validates output locations
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("state-path", &config.state_path),
        ("stats-path", &config.stats_path),
        ("report-path", &config.report_path),
        ("errors-path", &config.errors_path),
        ("abandoned-path", &config.abandoned_path),
        ("posts-dir", &config.posts_dir),
    ] {
        if value.is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
        }
    }

    if config.state_path == config.stats_path {
        return Err(ConfigError::Validation(
            "state-path and stats-path must differ".to_string(),
        ));
    }

    Ok(())
}

/// Checks that every extractor selector parses
fn validate_extract_config(config: &ExtractConfig) -> Result<(), ConfigError> {
    for (field, selector) in [
        ("content-selector", &config.content_selector),
        ("article-selector", &config.article_selector),
        ("title-selector", &config.title_selector),
        ("body-selector", &config.body_selector),
        ("date-selector", &config.date_selector),
        ("archive-link-selector", &config.archive_link_selector),
    ] {
        if Selector::parse(selector).is_err() {
            return Err(ConfigError::InvalidSelector {
                field,
                selector: selector.clone(),
            });
        }
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !parts[1].contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
