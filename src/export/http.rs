//! HTTP client for the OTLP/HTTP exporters (binary protobuf).

use crate::core::{Headers, OtelgenError, Result};
use crate::endpoint::Endpoint;
use reqwest::header::{HeaderName, HeaderValue};
use std::collections::HashMap;
use std::time::Duration;

/// Path of the trace export route
pub const TRACES_PATH: &str = "/v1/traces";
/// Path of the metrics export route
pub const METRICS_PATH: &str = "/v1/metrics";
/// Path of the logs export route
pub const LOGS_PATH: &str = "/v1/logs";

/// Build the reqwest client; nothing is sent until the first export.
pub fn client(endpoint: &Endpoint, skip_tls_verify: bool, timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .use_rustls_tls()
        .min_tls_version(reqwest::tls::Version::TLS_1_2)
        .danger_accept_invalid_certs(endpoint.secure && skip_tls_verify)
        .build()
        .map_err(|e| OtelgenError::exporter(format!("HTTP client setup failed: {}", e)))
}

/// Full URL for an export route
pub fn signal_url(endpoint: &Endpoint, path: &str) -> String {
    format!("{}{}", endpoint.base_uri(), path)
}

/// Validate headers as HTTP request headers.
pub fn header_map(headers: &Headers) -> Result<HashMap<String, String>> {
    let mut map = HashMap::with_capacity(headers.len());
    for (key, value) in headers.iter() {
        HeaderName::from_bytes(key.as_bytes())
            .map_err(|e| OtelgenError::exporter(format!("invalid header name {:?}: {}", key, e)))?;
        HeaderValue::from_str(value)
            .map_err(|e| OtelgenError::exporter(format!("invalid value for header {:?}: {}", key, e)))?;
        map.insert(key.to_string(), value.to_string());
    }
    Ok(map)
}
