use crate::{UrlError, UrlResult};
use url::Url;

/// List of tracking query parameters to remove during normalization
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "mc_eid",
];

/// Returns the identity string of an archive page URL
///
/// Archive mirrors serve the same logical page under many hosts and path
/// prefixes, but keep the query parameter that selects the archive period.
/// When `key_param` is present with a non-empty value, that value alone is
/// the identity. Otherwise the identity falls back to the normalized URL,
/// and to the trimmed input if the URL cannot be parsed at all.
///
/// # Examples
///
/// ```
/// use archive_harvest::url::identity_of;
///
/// let a = identity_of("https://web.archive.org/web/2024/http://blog.example.com/?m=201903", "m");
/// let b = identity_of("http://blog.example.com/?m=201903", "m");
/// assert_eq!(a, "201903");
/// assert_eq!(a, b);
/// ```
pub fn identity_of(url_str: &str, key_param: &str) -> String {
    let url = match normalize_url(url_str) {
        Ok(url) => url,
        Err(_) => return url_str.trim().to_string(),
    };

    let key = url
        .query_pairs()
        .find(|(name, _)| name == key_param)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty());

    key.unwrap_or_else(|| url.to_string())
}

/// Normalizes a URL for identity comparison
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Accept only HTTP and HTTPS
/// 3. Lowercase the host
/// 4. Remove fragment (everything after #)
/// 5. Remove tracking query parameters
/// 6. Sort remaining query parameters alphabetically
/// 7. Remove empty query string (trailing ?)
///
/// The path is kept as-is: archive mirrors embed the original URL in it,
/// including its `//`.
pub fn normalize_url(url_str: &str) -> UrlResult<Url> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    // `Url` already lowercases registered domains; IP hosts need no change
    if url.host_str().is_none() {
        return Err(UrlError::MissingHost);
    }

    url.set_fragment(None);

    if url.query().is_some() {
        let params = filter_and_sort_query_params(&url);
        if params.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut()
                .clear()
                .extend_pairs(params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
    }

    Ok(url)
}

/// Filters out tracking parameters and sorts remaining query parameters
fn filter_and_sort_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    params.sort();
    params
}

/// Checks if a query parameter is a tracking parameter
fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key) || key.starts_with("utm_")
}
