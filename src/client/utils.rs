//! Client utility functions
//!
//! Pure, stateless helpers for building requests and checking responses.

use reqwest::Url;

use super::error::ApiError;

/// Checks a response Content-Type header for application/json
///
/// Accepts:
/// - `application/json`
/// - `application/json; charset=utf-8`
///
/// Rejects:
/// - `text/html` (proxies and error pages)
/// - `application/jsonp`
/// - Malformed media types
pub fn parse_content_type(content_type: &str) -> Result<mime::Mime, ApiError> {
    let media_type: mime::Mime = content_type
        .parse()
        .map_err(|_| ApiError::Decode(format!("invalid Content-Type: {}", content_type)))?;

    if media_type.type_() != mime::APPLICATION || media_type.subtype() != mime::JSON {
        return Err(ApiError::Decode(format!(
            "Content-Type must be application/json, got: {}/{}",
            media_type.type_(),
            media_type.subtype()
        )));
    }

    Ok(media_type)
}

/// Normalizes the API base so relative joins keep its path ("/api" -> "/api/")
pub fn normalize_base_url(base_url: &str) -> Result<Url, ApiError> {
    let trimmed = base_url.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    };

    Url::parse(&with_slash)
        .map_err(|e| ApiError::Decode(format!("invalid base URL '{}': {}", base_url, e)))
}

/// Joins a relative resource path onto the normalized base
pub fn join_path(base: &Url, path: &str) -> Result<Url, ApiError> {
    base.join(path.trim_start_matches('/'))
        .map_err(|e| ApiError::Decode(format!("invalid resource path '{}': {}", path, e)))
}
