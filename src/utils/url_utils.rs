//! URL helpers shared by the planner, guardrails, and tool dispatcher.

use url::Url;

/// Check if a URL is one the driver can navigate to.
///
/// Rejects `data:`, `javascript:`, `mailto:` and anything that isn't http(s).
#[must_use]
pub fn is_valid_url(url: &str) -> bool {
    if url.is_empty() {
        return false;
    }
    if url.starts_with("data:") || url.starts_with("javascript:") || url.starts_with("mailto:") {
        return false;
    }
    match Url::parse(url) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https"),
        Err(_) => false,
    }
}

/// Extract the host from a URL, if any.
#[must_use]
pub fn extract_host(url: &str) -> Option<String> {
    Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_owned))
}

/// Normalize a URL pattern for the planner's learned-score table: host + path
/// with numeric segments and long hex-like ids replaced by `*`.
#[must_use]
pub fn url_pattern(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return url.to_string();
    };
    let host = parsed.host_str().unwrap_or("");
    let segments: Vec<String> = parsed
        .path_segments()
        .map(|segs| {
            segs.map(|seg| {
                if seg.is_empty() {
                    seg.to_string()
                } else if seg.chars().all(|c| c.is_ascii_digit()) {
                    "*".to_string()
                } else if seg.len() >= 16 && seg.chars().all(|c| c.is_ascii_hexdigit()) {
                    "*".to_string()
                } else {
                    seg.to_string()
                }
            })
            .collect()
        })
        .unwrap_or_default();
    format!("{host}/{}", segments.join("/"))
}

/// Known binary/non-HTML extensions the planner's eligibility filter skips.
const BINARY_EXTENSIONS: &[&str] = &[
    "pdf", "zip", "png", "jpg", "jpeg", "gif", "svg", "webp", "ico", "mp4", "mp3", "wav", "avi",
    "mov", "exe", "dmg", "gz", "tar", "7z", "rar", "woff", "woff2", "ttf", "eot", "bin", "iso",
];

/// True if the URL's path extension is a known binary type the planner should not enqueue.
#[must_use]
pub fn has_binary_extension(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let Some(last_segment) = parsed.path_segments().and_then(|mut s| s.next_back()) else {
        return false;
    };
    match last_segment.rsplit_once('.') {
        Some((_, ext)) => BINARY_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()),
        None => false,
    }
}
