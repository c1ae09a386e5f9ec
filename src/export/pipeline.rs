//! SDK providers wired to the OTLP exporters.
//!
//! Spans and log records go through batch processors, metric instruments
//! through a periodic reader. Provider flush and shutdown block on the
//! batch worker, so [`Provider`] runs them on the blocking pool under a
//! timeout.

use crate::core::{OtelgenError, Result};
use async_trait::async_trait;
use opentelemetry_sdk::logs::{self as sdk_logs, BatchLogProcessor, LoggerProvider};
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::trace::{self as sdk_trace, BatchSpanProcessor, TracerProvider};
use opentelemetry_sdk::{runtime, Resource};
use std::time::Duration;
use tokio::time::Instant;

/// Batching knobs shared by the span and log processors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchConfig {
    /// Records per export call
    pub max_batch_size: usize,
    /// Records that may wait in the queue before new ones are dropped
    pub max_queue_size: usize,
    /// Flush interval for partial batches
    pub scheduled_delay: Duration,
    /// Bound on one export call
    pub export_timeout: Duration,
}

impl BatchConfig {
    /// Span batching
    pub fn traces() -> Self {
        Self {
            max_batch_size: 512,
            max_queue_size: 2048,
            scheduled_delay: Duration::from_secs(2),
            export_timeout: Duration::from_secs(30),
        }
    }

    /// Single connection-test span, exported within `export_timeout`
    pub fn connection_test(export_timeout: Duration) -> Self {
        Self {
            export_timeout,
            ..Self::traces()
        }
    }

    /// Log batching for a configured batch size
    pub fn logs(batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            max_batch_size: batch_size,
            max_queue_size: batch_size.saturating_mul(2),
            scheduled_delay: Duration::from_secs(1),
            export_timeout: Duration::from_secs(30),
        }
    }

    fn span_config(&self) -> sdk_trace::BatchConfig {
        sdk_trace::BatchConfigBuilder::default()
            .with_max_queue_size(self.max_queue_size)
            .with_max_export_batch_size(self.max_batch_size)
            .with_scheduled_delay(self.scheduled_delay)
            .with_max_export_timeout(self.export_timeout)
            .build()
    }

    fn log_config(&self) -> sdk_logs::BatchConfig {
        sdk_logs::BatchConfigBuilder::default()
            .with_max_queue_size(self.max_queue_size)
            .with_max_export_batch_size(self.max_batch_size)
            .with_scheduled_delay(self.scheduled_delay)
            .with_max_export_timeout(self.export_timeout)
            .build()
    }
}

/// Metric collection knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderConfig {
    /// Collection and export interval
    pub interval: Duration,
    /// Bound on one collect-and-export cycle
    pub timeout: Duration,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Tracer provider exporting through a batch span processor
pub fn tracer_provider(
    exporter: opentelemetry_otlp::SpanExporter,
    resource: Resource,
    batch: &BatchConfig,
) -> TracerProvider {
    let processor = BatchSpanProcessor::builder(exporter, runtime::Tokio)
        .with_batch_config(batch.span_config())
        .build();

    TracerProvider::builder()
        .with_span_processor(processor)
        .with_config(sdk_trace::Config::default().with_resource(resource))
        .build()
}

/// Logger provider exporting through a batch log processor
pub fn logger_provider(
    exporter: opentelemetry_otlp::LogExporter,
    resource: Resource,
    batch: &BatchConfig,
) -> LoggerProvider {
    let processor = BatchLogProcessor::builder(exporter, runtime::Tokio)
        .with_batch_config(batch.log_config())
        .build();

    LoggerProvider::builder()
        .with_resource(resource)
        .with_log_processor(processor)
        .build()
}

/// Meter provider collected by a periodic reader
pub fn meter_provider(
    exporter: opentelemetry_otlp::MetricExporter,
    resource: Resource,
    config: &ReaderConfig,
) -> SdkMeterProvider {
    let reader = PeriodicReader::builder(exporter, runtime::Tokio)
        .with_interval(config.interval)
        .with_timeout(config.timeout)
        .build();

    SdkMeterProvider::builder()
        .with_resource(resource)
        .with_reader(reader)
        .build()
}

/// A provider that can be flushed and shut down.
///
/// The `*_blocking` methods wait on the SDK worker and must not run on a
/// runtime thread; callers use the bounded async variants.
#[async_trait]
pub trait Provider: Clone + Send + Sync + 'static {
    /// Export everything buffered so far
    fn flush_blocking(&self) -> Result<()>;

    /// Flush, then stop the exporter
    fn shutdown_blocking(&self) -> Result<()>;

    /// [`Provider::flush_blocking`] bounded by `timeout`
    async fn flush_within(&self, timeout: Duration) -> Result<()> {
        let provider = self.clone();
        bounded(timeout, move || provider.flush_blocking()).await
    }

    /// [`Provider::shutdown_blocking`] bounded by `timeout`
    async fn shutdown_within(&self, timeout: Duration) -> Result<()> {
        let provider = self.clone();
        bounded(timeout, move || provider.shutdown_blocking()).await
    }
}

async fn bounded<F>(timeout: Duration, f: F) -> Result<()>
where
    F: FnOnce() -> Result<()> + Send + 'static,
{
    match tokio::time::timeout(timeout, tokio::task::spawn_blocking(f)).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => Err(OtelgenError::export(format!("provider task failed: {}", e))),
        Err(_) => Err(OtelgenError::timeout(timeout)),
    }
}

/// Flush then shut down, both within one `timeout`.
///
/// Shutdown is attempted even when the flush fails; the first error wins.
pub async fn drain<P: Provider>(provider: &P, timeout: Duration) -> Result<()> {
    let deadline = Instant::now() + timeout;
    let flushed = provider.flush_within(timeout).await;
    if let Err(e) = &flushed {
        tracing::warn!("Flush before shutdown failed: {}", e);
    }

    let remaining = deadline.saturating_duration_since(Instant::now());
    let shut_down = if remaining.is_zero() {
        Err(OtelgenError::timeout(timeout))
    } else {
        provider.shutdown_within(remaining).await
    };
    flushed.and(shut_down)
}

#[async_trait]
impl Provider for TracerProvider {
    fn flush_blocking(&self) -> Result<()> {
        for result in self.force_flush() {
            result.map_err(|e| OtelgenError::export(format!("span flush failed: {}", e)))?;
        }
        Ok(())
    }

    fn shutdown_blocking(&self) -> Result<()> {
        self.shutdown()
            .map_err(|e| OtelgenError::export(format!("tracer provider shutdown failed: {}", e)))
    }
}

#[async_trait]
impl Provider for LoggerProvider {
    fn flush_blocking(&self) -> Result<()> {
        for result in self.force_flush() {
            result.map_err(|e| OtelgenError::export(format!("log flush failed: {}", e)))?;
        }
        Ok(())
    }

    fn shutdown_blocking(&self) -> Result<()> {
        self.shutdown()
            .map_err(|e| OtelgenError::export(format!("logger provider shutdown failed: {}", e)))
    }
}

#[async_trait]
impl Provider for SdkMeterProvider {
    fn flush_blocking(&self) -> Result<()> {
        self.force_flush()
            .map_err(|e| OtelgenError::export(format!("metric flush failed: {}", e)))
    }

    fn shutdown_blocking(&self) -> Result<()> {
        self.shutdown()
            .map_err(|e| OtelgenError::export(format!("meter provider shutdown failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Provider whose flush and shutdown take a fixed wall-clock time.
    #[derive(Clone)]
    struct SlowProvider {
        flush: Duration,
        shutdown: Duration,
        shutdowns: Arc<AtomicUsize>,
    }

    impl SlowProvider {
        fn new(flush_ms: u64, shutdown_ms: u64) -> Self {
            Self {
                flush: Duration::from_millis(flush_ms),
                shutdown: Duration::from_millis(shutdown_ms),
                shutdowns: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl Provider for SlowProvider {
        fn flush_blocking(&self) -> Result<()> {
            std::thread::sleep(self.flush);
            Ok(())
        }

        fn shutdown_blocking(&self) -> Result<()> {
            std::thread::sleep(self.shutdown);
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_presets() {
        let traces = BatchConfig::traces();
        assert_eq!(traces.max_batch_size, 512);
        assert_eq!(traces.max_queue_size, 2048);
        assert_eq!(traces.scheduled_delay, Duration::from_secs(2));

        let logs = BatchConfig::logs(100);
        assert_eq!(logs.max_batch_size, 100);
        assert_eq!(logs.max_queue_size, 200);
        assert_eq!(logs.scheduled_delay, Duration::from_secs(1));
        assert_eq!(BatchConfig::logs(0).max_batch_size, 1);

        let test = BatchConfig::connection_test(Duration::from_secs(15));
        assert_eq!(test.export_timeout, Duration::from_secs(15));

        let reader = ReaderConfig::default();
        assert_eq!(reader.interval, Duration::from_secs(2));
        assert_eq!(reader.timeout, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_bounded_call_times_out() {
        let provider = SlowProvider::new(300, 0);
        let err = provider
            .flush_within(Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, OtelgenError::Timeout { timeout_ms: 50 }));
    }

    #[tokio::test]
    async fn test_drain_completes_within_budget() {
        let provider = SlowProvider::new(10, 10);
        drain(&provider, Duration::from_secs(5)).await.unwrap();
        assert_eq!(provider.shutdowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_drain_shares_one_deadline() {
        // Each step alone fits the budget, both together do not
        let provider = SlowProvider::new(250, 250);
        let started = std::time::Instant::now();

        let result = drain(&provider, Duration::from_millis(400)).await;

        assert!(result.is_err());
        assert!(started.elapsed() < Duration::from_millis(480));
    }

    #[tokio::test]
    async fn test_sdk_providers_shut_down_without_exporting() {
        let provider = TracerProvider::builder().build();
        provider.flush_within(Duration::from_secs(1)).await.unwrap();
        provider.shutdown_within(Duration::from_secs(1)).await.unwrap();
    }
}
