use scraper::Html;

/// Converts an HTML fragment to Markdown
///
/// Falls back to the fragment's plain text if conversion fails.
pub fn html_to_markdown(html: &str) -> String {
    htmd::convert(html).unwrap_or_else(|e| {
        tracing::warn!("Markdown conversion failed, keeping plain text: {}", e);
        let fragment = Html::parse_fragment(html);
        fragment.root_element().text().collect::<String>()
    })
}
