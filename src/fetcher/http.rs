//! Shared HTTP client and response helpers.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};

use crate::error::SyncError;

/// Build a reqwest client with the given per-request timeout.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, SyncError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .pool_max_idle_per_host(4)
        .default_headers(json_headers())
        .build()
        .map_err(SyncError::Network)
}

/// Headers for the JSON console API.
pub fn json_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers
}

/// Map a non-success status to an error, pulling the backend's `error`
/// field out of the body when present.
pub fn status_to_error(status: u16, body: &str) -> SyncError {
    let message = extract_error_field(body).unwrap_or_else(|| body.trim().to_string());
    SyncError::api(status, message)
}

fn extract_error_field(body: &str) -> Option<String> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
}
