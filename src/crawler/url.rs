//! URL validation for listing links and fetch targets
//!
//! Only absolute `http`/`https` URLs are accepted. Relative links are not
//! resolved against the listing page; they are reported as
//! [`ValidationRejection::RelativeUrl`] so the caller can count them.

use url::{ParseError, Url};

use crate::utils::error::ValidationRejection;

/// Parse `raw` and require an absolute http(s) URL with a host
///
/// # Errors
///
/// Returns the matching [`ValidationRejection`] for empty, relative,
/// malformed or non-http(s) input
///
/// # Examples
///
/// ```
/// use newsdrift::crawler::url::validate_absolute_http;
///
/// assert!(validate_absolute_http("https://news.sina.com.cn/c/1.shtml").is_ok());
/// assert!(validate_absolute_http("/c/1.shtml").is_err());
/// assert!(validate_absolute_http("javascript:void(0)").is_err());
/// ```
pub fn validate_absolute_http(raw: &str) -> Result<Url, ValidationRejection> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationRejection::EmptyUrl);
    }

    let url = Url::parse(trimmed).map_err(|e| match e {
        ParseError::RelativeUrlWithoutBase => ValidationRejection::RelativeUrl(trimmed.to_string()),
        other => ValidationRejection::MalformedUrl(format!("{trimmed}: {other}")),
    })?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(ValidationRejection::UnsupportedScheme(scheme.to_string())),
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(ValidationRejection::MalformedUrl(trimmed.to_string()));
    }

    Ok(url)
}
