//! gRPC channel for the OTLP/gRPC exporters.

use super::tls;
use crate::core::{Headers, OtelgenError, Result};
use crate::endpoint::Endpoint;
use hyper_util::client::legacy::connect::HttpConnector;
use std::time::Duration;
use tonic::metadata::{MetadataKey, MetadataMap, MetadataValue};
use tonic::transport::Channel;

const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(10);
const KEEPALIVE_TIMEOUT: Duration = Duration::from_secs(5);

/// Validate headers as gRPC metadata.
pub fn metadata(headers: &Headers) -> Result<MetadataMap> {
    let mut map = MetadataMap::with_capacity(headers.len());
    for (key, value) in headers.iter() {
        let name = MetadataKey::from_bytes(key.as_bytes())
            .map_err(|e| OtelgenError::exporter(format!("invalid header name {:?}: {}", key, e)))?;
        let value = MetadataValue::try_from(value)
            .map_err(|e| OtelgenError::exporter(format!("invalid value for header {:?}: {}", key, e)))?;
        map.insert(name, value);
    }
    Ok(map)
}

/// Connect eagerly so setup problems surface before the first tick.
///
/// Secure endpoints go through rustls, with certificate checks disabled
/// when `skip_tls_verify` is set. Every call on the channel is bounded by
/// `export_timeout`.
pub async fn connect(
    endpoint: &Endpoint,
    skip_tls_verify: bool,
    connect_timeout: Duration,
    export_timeout: Duration,
) -> Result<Channel> {
    let builder = tonic::transport::Endpoint::from_shared(endpoint.base_uri())?
        .connect_timeout(connect_timeout)
        .timeout(export_timeout)
        .http2_keep_alive_interval(KEEPALIVE_INTERVAL)
        .keep_alive_timeout(KEEPALIVE_TIMEOUT)
        .keep_alive_while_idle(true);

    let channel = if endpoint.secure {
        let mut http = HttpConnector::new();
        http.enforce_http(false);
        http.set_connect_timeout(Some(connect_timeout));

        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_tls_config(tls::client_config(skip_tls_verify)?)
            .https_only()
            .enable_http2()
            .wrap_connector(http);

        builder.connect_with_connector(connector).await?
    } else {
        builder.connect().await?
    };

    tracing::debug!("gRPC channel connected to {}", endpoint);
    Ok(channel)
}
