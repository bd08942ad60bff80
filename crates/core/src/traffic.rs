//! Traffic-source classification and page-path normalization.

use url::Url;

/// Referrer domains classified as social traffic.
const SOCIAL_DOMAINS: &[&str] = &[
    "facebook.com",
    "twitter.com",
    "linkedin.com",
    "instagram.com",
    "youtube.com",
    "tiktok.com",
    "pinterest.com",
    "reddit.com",
];

/// Referrer domains classified as organic search traffic.
const SEARCH_DOMAINS: &[&str] = &[
    "google.com",
    "bing.com",
    "yahoo.com",
    "duckduckgo.com",
    "baidu.com",
    "yandex.com",
];

/// Determines the traffic source for a page view.
///
/// A UTM source always wins; otherwise the referrer domain decides:
/// no referrer is direct, known social/search domains classify as such,
/// anything else parseable is a referral, unparseable is unknown.
pub fn classify(referrer_url: Option<&str>, utm_source: Option<&str>) -> String {
    if let Some(source) = utm_source {
        if !source.is_empty() {
            return source.to_string();
        }
    }

    let referrer = match referrer_url {
        Some(r) if !r.is_empty() => r,
        _ => return "direct".to_string(),
    };

    let domain = match Url::parse(referrer) {
        Ok(url) => match url.host_str() {
            Some(host) => host.to_ascii_lowercase(),
            None => return "unknown".to_string(),
        },
        Err(_) => return "unknown".to_string(),
    };

    if SOCIAL_DOMAINS.iter().any(|d| domain.contains(d)) {
        return "social".to_string();
    }
    if SEARCH_DOMAINS.iter().any(|d| domain.contains(d)) {
        return "organic".to_string();
    }

    "referral".to_string()
}

/// Strips the query string and fragment from a page URL, yielding the path.
pub fn page_path(page_url: &str) -> String {
    match Url::parse(page_url) {
        Ok(url) => url.path().to_string(),
        // Relative or malformed URL: fall back to a plain query strip.
        Err(_) => {
            let stripped = page_url.split(['?', '#']).next().unwrap_or("/");
            if stripped.is_empty() {
                "/".to_string()
            } else {
                stripped.to_string()
            }
        }
    }
}
