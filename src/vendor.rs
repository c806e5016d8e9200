// src/vendor.rs
// Shared request plumbing for the third-party API clients

use crate::error::VendorError;
use backoff::{future::retry, ExponentialBackoff};
use serde::de::DeserializeOwned;
use std::time::Duration;

fn retry_policy() -> ExponentialBackoff {
    ExponentialBackoff {
        initial_interval: Duration::from_millis(500),
        max_interval: Duration::from_secs(10),
        multiplier: 2.0,
        max_elapsed_time: Some(Duration::from_secs(60)),
        ..Default::default()
    }
}

/// Upper bound for a single vendor request, body included
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// How a failed request may be repeated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryMode {
    /// Reads and status checks: any transient failure is retried
    Idempotent,
    /// Job-creating calls: only retried when the vendor cannot have accepted the job
    Submission,
}

impl RetryMode {
    pub fn should_retry(self, err: &VendorError) -> bool {
        match self {
            RetryMode::Idempotent => err.is_transient(),
            RetryMode::Submission => err.is_safe_to_resubmit(),
        }
    }
}

/// Send a request built by `make_request`, retrying transient failures
/// (connection errors, timeouts, 429 and 5xx) with exponential backoff.
/// Non-success responses that are not transient are returned immediately.
pub async fn send_with_retry<F>(vendor: &'static str, make_request: F) -> Result<reqwest::Response, VendorError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    send_with_mode(vendor, RetryMode::Idempotent, make_request).await
}

/// Like [`send_with_retry`] for calls that create a vendor job. A gateway
/// error or timeout may mean the job already exists, so only connection
/// failures and 429s are retried.
pub async fn submit_with_retry<F>(vendor: &'static str, make_request: F) -> Result<reqwest::Response, VendorError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    send_with_mode(vendor, RetryMode::Submission, make_request).await
}

pub async fn send_with_mode<F>(
    vendor: &'static str,
    mode: RetryMode,
    make_request: F,
) -> Result<reqwest::Response, VendorError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let make_request = &make_request;

    let operation = move || async move {
        let response = make_request()
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                let err = VendorError::http(vendor, e);
                if mode.should_retry(&err) {
                    tracing::warn!("{} connection error (retrying): {}", vendor, err);
                    backoff::Error::transient(err)
                } else {
                    backoff::Error::permanent(err)
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        let err = VendorError::Api {
            vendor,
            status: status.as_u16(),
            body,
        };

        if mode.should_retry(&err) {
            tracing::warn!("{} returned {} (retrying)", vendor, status);
            Err(backoff::Error::transient(err))
        } else {
            tracing::error!("{}", err);
            Err(backoff::Error::permanent(err))
        }
    };

    retry(retry_policy(), operation).await
}

/// Read a response body as JSON, keeping the raw text in the error on failure
pub async fn read_json<T: DeserializeOwned>(
    vendor: &'static str,
    response: reqwest::Response,
) -> Result<T, VendorError> {
    let text = response
        .text()
        .await
        .map_err(|e| VendorError::http(vendor, e))?;

    serde_json::from_str(&text).map_err(|e| {
        VendorError::decode(vendor, format!("{}. Response: {}", e, truncate(&text, 500)))
    })
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

/// First string found at any of the given JSON pointers
pub fn first_str<'a>(value: &'a serde_json::Value, pointers: &[&str]) -> Option<&'a str> {
    pointers
        .iter()
        .filter_map(|p| value.pointer(p))
        .filter_map(|v| v.as_str())
        .find(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_first_str_prefers_earlier_pointer() {
        let value = json!({"video": {"url": "https://a"}, "image": {"url": "https://b"}});
        assert_eq!(first_str(&value, &["/video/url", "/image/url"]), Some("https://a"));
        assert_eq!(first_str(&value, &["/missing", "/image/url"]), Some("https://b"));
        assert_eq!(first_str(&value, &["/missing"]), None);
    }

    #[test]
    fn test_first_str_skips_empty_strings() {
        let value = json!({"text": "", "caption": "hello"});
        assert_eq!(first_str(&value, &["/text", "/caption"]), Some("hello"));
    }

    fn api(status: u16) -> VendorError {
        VendorError::Api {
            vendor: "test",
            status,
            body: String::new(),
        }
    }

    #[test]
    fn test_submissions_only_retry_throttling() {
        assert!(RetryMode::Submission.should_retry(&api(429)));
        assert!(!RetryMode::Submission.should_retry(&api(502)));
        assert!(!RetryMode::Submission.should_retry(&api(504)));
        assert!(RetryMode::Idempotent.should_retry(&api(502)));
        assert!(!RetryMode::Idempotent.should_retry(&api(400)));
    }

    #[test]
    fn test_truncate_long_text() {
        assert_eq!(truncate("abcdef", 3), "abc...");
        assert_eq!(truncate("abc", 3), "abc");
    }
}
