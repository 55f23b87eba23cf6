//! `Accept` header checks

use axum::http::HeaderMap;
use axum::http::header::ACCEPT;

const HTML_TYPES: [&str; 2] = ["text/html", "application/xhtml+xml"];

/// True when the client explicitly accepts an HTML media type.
///
/// Wildcards do not count, so `curl` and other `*/*` clients get text.
pub fn accepts_html(headers: &HeaderMap) -> bool {
    headers
        .get_all(ACCEPT)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(range_accepts_html)
}

fn range_accepts_html(range: &str) -> bool {
    let mut parts = range.split(';');
    let media_type = parts.next().unwrap_or_default().trim();
    if !HTML_TYPES
        .iter()
        .any(|html| media_type.eq_ignore_ascii_case(html))
    {
        return false;
    }
    // q=0 means "not acceptable"
    !parts.any(|param| match param.split_once('=') {
        Some((name, quality)) if name.trim().eq_ignore_ascii_case("q") => quality
            .trim()
            .parse::<f32>()
            .map(|q| q <= 0.0)
            .unwrap_or(false),
        _ => false,
    })
}
