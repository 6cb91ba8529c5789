use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONNECTION, USER_AGENT};

use crate::error::{Error, Result};

/// Desktop Chrome user agent the Sina front page is served to
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

pub const DEFAULT_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";

pub const DEFAULT_ACCEPT_LANGUAGE: &str =
    "zh-CN,zh;q=0.8,zh-TW;q=0.7,zh-HK;q=0.5,en-US;q=0.3,en;q=0.2";

/// Build the fixed header set sent with every attempt
///
/// `Accept` and `Connection` are constant; the user agent and language
/// preference come from configuration.
///
/// # Errors
///
/// Returns `Error::Config` if either value is not a valid header value
///
/// # Examples
///
/// ```
/// use newsdrift::crawler::headers::{build_default_headers, DEFAULT_ACCEPT_LANGUAGE};
///
/// let headers = build_default_headers("Mozilla/5.0", DEFAULT_ACCEPT_LANGUAGE).unwrap();
/// assert_eq!(headers.get("connection").unwrap(), "keep-alive");
/// ```
pub fn build_default_headers(user_agent: &str, accept_language: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();

    headers.insert(USER_AGENT, header_value("user_agent", user_agent)?);
    headers.insert(ACCEPT, HeaderValue::from_static(DEFAULT_ACCEPT));
    headers.insert(ACCEPT_LANGUAGE, header_value("accept_language", accept_language)?);
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));

    Ok(headers)
}

fn header_value(field: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| Error::config(format!("{field} is not a valid header value: {e}")))
}
