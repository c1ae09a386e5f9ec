//! Connectivity checks run before a verbose generation run.
//!
//! Both probes report problems as errors for the caller to log; neither is
//! meant to stop the run.

use super::{ExporterFactory, Provider, Purpose, SCOPE_NAME};
use crate::core::{OtelgenError, Result};
use crate::endpoint::Endpoint;
use crate::payload::trace::connection_test_span;
use opentelemetry::trace::TracerProvider as _;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Bound on the raw TCP dial
pub const TCP_PROBE_TIMEOUT: Duration = Duration::from_secs(5);
/// Bound on exporting the connection-test span
pub const PROBE_FLUSH_TIMEOUT: Duration = Duration::from_secs(15);
/// Bound on shutting the probe provider down
pub const PROBE_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Dial `host:port` over plain TCP.
pub async fn probe_tcp(endpoint: &Endpoint) -> Result<()> {
    let address = endpoint.address();
    tracing::debug!("Testing TCP connection to {}", address);

    match timeout(TCP_PROBE_TIMEOUT, TcpStream::connect(address.as_str())).await {
        Ok(Ok(_stream)) => {
            tracing::debug!("TCP connection to {} succeeded", address);
            Ok(())
        },
        Ok(Err(e)) => Err(OtelgenError::network(format!(
            "TCP connection to {} failed: {}",
            address, e
        ))),
        Err(_) => Err(OtelgenError::timeout(TCP_PROBE_TIMEOUT)),
    }
}

/// Export a single `connection-test` span through a short-lived provider.
pub async fn probe_trace_export(factory: &ExporterFactory) -> Result<()> {
    let provider = factory.tracer_provider(Purpose::Probe).await?;
    connection_test_span(&provider.tracer(SCOPE_NAME));

    tracing::debug!("Sending connection-test span to {}", factory.endpoint());
    let exported = provider.flush_within(PROBE_FLUSH_TIMEOUT).await;

    if let Err(e) = provider.shutdown_within(PROBE_SHUTDOWN_TIMEOUT).await {
        tracing::warn!("Probe provider shutdown failed: {}", e);
    }

    exported?;
    tracing::debug!("Connection-test span exported");
    Ok(())
}
