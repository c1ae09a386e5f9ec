//! OTLP export pipeline.
//!
//! [`ExporterFactory`] is the single place exporters are built, whether for
//! the verbose connectivity check or the real run. It opens the transport
//! (a tonic channel or a reqwest client, both on rustls), hands it to the
//! `opentelemetry-otlp` exporters and wraps those in SDK providers:
//! - a batch span processor for traces
//! - a batch log processor for logs
//! - a periodic reader for metrics

pub mod grpc;
pub mod http;
pub mod pipeline;
pub mod probe;
pub mod tls;

pub use pipeline::{drain, BatchConfig, Provider, ReaderConfig};
pub use probe::{probe_tcp, probe_trace_export};

use crate::core::{GenerationConfig, Headers, OtelgenError, Result};
use crate::endpoint::Endpoint;
use opentelemetry::KeyValue;
use opentelemetry_otlp::{
    LogExporter, MetricExporter, Protocol as OtlpProtocol, SpanExporter, WithExportConfig,
    WithHttpConfig, WithTonicConfig,
};
use opentelemetry_sdk::logs::LoggerProvider;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::TracerProvider;
use opentelemetry_sdk::Resource;
use opentelemetry_semantic_conventions::resource::{SERVICE_NAME, SERVICE_VERSION};
use std::collections::HashMap;
use std::time::Duration;
use tonic::metadata::MetadataMap;
use tonic::transport::Channel;

/// Instrumentation scope name on every exported batch
pub const SCOPE_NAME: &str = "otelgen";
/// `service.version` resource attribute
pub const SERVICE_VERSION_VALUE: &str = "1.0.0";
/// Bound on exporter construction, including the gRPC connect
pub const CONSTRUCTION_TIMEOUT: Duration = Duration::from_secs(10);
/// Bound on one export request
pub const EXPORT_TIMEOUT: Duration = Duration::from_secs(30);

/// Why an exporter is being built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    /// Short-lived connectivity check exporting one span
    Probe,
    /// The generation run itself
    Run,
}

impl Purpose {
    fn export_timeout(self) -> Duration {
        match self {
            Purpose::Probe => probe::PROBE_FLUSH_TIMEOUT,
            Purpose::Run => EXPORT_TIMEOUT,
        }
    }
}

enum Transport {
    Grpc {
        channel: Channel,
        metadata: MetadataMap,
    },
    Http {
        client: reqwest::Client,
        headers: HashMap<String, String>,
    },
}

/// An open OTLP transport, ready to back per-signal exporters.
pub struct OtlpExporter {
    transport: Transport,
    endpoint: Endpoint,
    export_timeout: Duration,
}

impl OtlpExporter {
    /// True when exports go over gRPC
    pub fn is_grpc(&self) -> bool {
        matches!(self.transport, Transport::Grpc { .. })
    }

    /// Bound on one export request
    pub fn export_timeout(&self) -> Duration {
        self.export_timeout
    }

    /// Span exporter over this transport
    pub fn span_exporter(&self) -> Result<SpanExporter> {
        match &self.transport {
            Transport::Grpc { channel, metadata } => SpanExporter::builder()
                .with_tonic()
                .with_channel(channel.clone())
                .with_metadata(metadata.clone())
                .with_timeout(self.export_timeout)
                .build(),
            Transport::Http { client, headers } => SpanExporter::builder()
                .with_http()
                .with_http_client(client.clone())
                .with_endpoint(self::http::signal_url(&self.endpoint, self::http::TRACES_PATH))
                .with_headers(headers.clone())
                .with_protocol(OtlpProtocol::HttpBinary)
                .with_timeout(self.export_timeout)
                .build(),
        }
        .map_err(|e| OtelgenError::exporter(format!("span exporter: {}", e)))
    }

    /// Log exporter over this transport
    pub fn log_exporter(&self) -> Result<LogExporter> {
        match &self.transport {
            Transport::Grpc { channel, metadata } => LogExporter::builder()
                .with_tonic()
                .with_channel(channel.clone())
                .with_metadata(metadata.clone())
                .with_timeout(self.export_timeout)
                .build(),
            Transport::Http { client, headers } => LogExporter::builder()
                .with_http()
                .with_http_client(client.clone())
                .with_endpoint(self::http::signal_url(&self.endpoint, self::http::LOGS_PATH))
                .with_headers(headers.clone())
                .with_protocol(OtlpProtocol::HttpBinary)
                .with_timeout(self.export_timeout)
                .build(),
        }
        .map_err(|e| OtelgenError::exporter(format!("log exporter: {}", e)))
    }

    /// Metric exporter over this transport
    pub fn metric_exporter(&self) -> Result<MetricExporter> {
        match &self.transport {
            Transport::Grpc { channel, metadata } => MetricExporter::builder()
                .with_tonic()
                .with_channel(channel.clone())
                .with_metadata(metadata.clone())
                .with_timeout(self.export_timeout)
                .build(),
            Transport::Http { client, headers } => MetricExporter::builder()
                .with_http()
                .with_http_client(client.clone())
                .with_endpoint(self::http::signal_url(&self.endpoint, self::http::METRICS_PATH))
                .with_headers(headers.clone())
                .with_protocol(OtlpProtocol::HttpBinary)
                .with_timeout(self.export_timeout)
                .build(),
        }
        .map_err(|e| OtelgenError::exporter(format!("metric exporter: {}", e)))
    }
}

/// Builds OTLP exporters and providers from a run's configuration.
#[derive(Debug, Clone)]
pub struct ExporterFactory {
    endpoint: Endpoint,
    headers: Headers,
    skip_tls_verify: bool,
    service_name: String,
}

impl ExporterFactory {
    /// Factory for the given configuration
    pub fn new(config: &GenerationConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            headers: config.headers.clone(),
            skip_tls_verify: config.skip_tls_verify,
            service_name: config.service_name.clone(),
        }
    }

    /// Endpoint exporters will talk to
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Resource describing the generating service
    pub fn resource(&self) -> Resource {
        Resource::new(vec![
            KeyValue::new(SERVICE_NAME, self.service_name.clone()),
            KeyValue::new(SERVICE_VERSION, SERVICE_VERSION_VALUE),
        ])
    }

    /// Open the transport, connecting eagerly for gRPC.
    ///
    /// Fails with a setup error within [`CONSTRUCTION_TIMEOUT`].
    pub async fn build(&self, purpose: Purpose) -> Result<OtlpExporter> {
        tracing::debug!(
            "Building {:?} exporter: protocol={}, address={}, secure={}, headers={}",
            purpose,
            self.endpoint.protocol,
            self.endpoint.address(),
            self.endpoint.secure,
            self.headers
        );
        if self.skip_tls_verify && self.endpoint.secure {
            tracing::debug!("TLS certificate verification disabled");
        }

        let export_timeout = purpose.export_timeout();
        let transport =
            match tokio::time::timeout(CONSTRUCTION_TIMEOUT, self.transport(export_timeout)).await {
                Ok(Ok(transport)) => transport,
                Ok(Err(e)) => {
                    return Err(OtelgenError::exporter(format!(
                        "failed to create exporter for {}: {}",
                        self.endpoint, e
                    )))
                },
                Err(_) => {
                    return Err(OtelgenError::exporter(format!(
                        "timed out after {:?} creating exporter for {}",
                        CONSTRUCTION_TIMEOUT, self.endpoint
                    )))
                },
            };

        tracing::debug!("Exporter ready for {}", self.endpoint);

        Ok(OtlpExporter {
            transport,
            endpoint: self.endpoint.clone(),
            export_timeout,
        })
    }

    /// Tracer provider batching spans to the endpoint
    pub async fn tracer_provider(&self, purpose: Purpose) -> Result<TracerProvider> {
        let exporter = self.build(purpose).await?;
        let batch = match purpose {
            Purpose::Probe => BatchConfig::connection_test(exporter.export_timeout()),
            Purpose::Run => BatchConfig::traces(),
        };
        Ok(pipeline::tracer_provider(
            exporter.span_exporter()?,
            self.resource(),
            &batch,
        ))
    }

    /// Logger provider batching `batch_size` records per export
    pub async fn logger_provider(&self, batch_size: usize) -> Result<LoggerProvider> {
        let exporter = self.build(Purpose::Run).await?;
        Ok(pipeline::logger_provider(
            exporter.log_exporter()?,
            self.resource(),
            &BatchConfig::logs(batch_size),
        ))
    }

    /// Meter provider collected every [`ReaderConfig::interval`]
    pub async fn meter_provider(&self) -> Result<SdkMeterProvider> {
        let exporter = self.build(Purpose::Run).await?;
        Ok(pipeline::meter_provider(
            exporter.metric_exporter()?,
            self.resource(),
            &ReaderConfig::default(),
        ))
    }

    async fn transport(&self, export_timeout: Duration) -> Result<Transport> {
        if self.endpoint.is_grpc() {
            let metadata = grpc::metadata(&self.headers)?;
            let channel = grpc::connect(
                &self.endpoint,
                self.skip_tls_verify,
                CONSTRUCTION_TIMEOUT,
                export_timeout,
            )
            .await?;
            Ok(Transport::Grpc { channel, metadata })
        } else {
            let headers = self::http::header_map(&self.headers)?;
            let client = self::http::client(&self.endpoint, self.skip_tls_verify, export_timeout)?;
            Ok(Transport::Http { client, headers })
        }
    }
}
