//! Common test utilities: in-process OTLP collectors over gRPC and HTTP,
//! and a TLS front with a self-signed certificate.

#![allow(dead_code)]

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use opentelemetry_proto::tonic::collector::logs::v1::{
    logs_service_server::{LogsService, LogsServiceServer},
    ExportLogsServiceRequest, ExportLogsServiceResponse,
};
use opentelemetry_proto::tonic::collector::metrics::v1::{
    metrics_service_server::{MetricsService, MetricsServiceServer},
    ExportMetricsServiceRequest, ExportMetricsServiceResponse,
};
use opentelemetry_proto::tonic::collector::trace::v1::{
    trace_service_server::{TraceService, TraceServiceServer},
    ExportTraceServiceRequest, ExportTraceServiceResponse,
};
use opentelemetry_proto::tonic::common::v1::any_value::Value;
use opentelemetry_proto::tonic::common::v1::KeyValue;
use opentelemetry_proto::tonic::logs::v1::LogRecord;
use opentelemetry_proto::tonic::metrics::v1::{metric, Metric};
use opentelemetry_proto::tonic::resource::v1::Resource;
use opentelemetry_proto::tonic::trace::v1::Span;
use otelgen_lib::core::{GenerationConfig, GenerationConfigBuilder};
use parking_lot::Mutex;
use prost::Message;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::rustls;
use tokio_rustls::rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
use tokio_rustls::TlsAcceptor;
use tonic::transport::server::TcpIncoming;
use tonic::transport::Server;
use tonic::{Request, Response, Status};

/// Top-level keys every log body carries
pub const LOG_KEYS: [&str; 13] = [
    "timestamp",
    "level",
    "message",
    "service",
    "environment",
    "version",
    "host",
    "pod_id",
    "request_id",
    "trace_id",
    "span_id",
    "http",
    "user",
];

/// Keys that may additionally appear
pub const OPTIONAL_LOG_KEYS: [&str; 3] = ["error", "database", "payload_data"];

/// Header the test configurations send
pub const API_KEY: &str = "x-api-key";

/// One export request as the collector saw it.
#[derive(Debug, Clone)]
pub struct Received<T> {
    pub api_key: Option<String>,
    pub content_type: Option<String>,
    pub request: T,
}

/// Records every export request it is sent.
#[derive(Clone, Default)]
pub struct Collector {
    traces: Arc<Mutex<Vec<Received<ExportTraceServiceRequest>>>>,
    metrics: Arc<Mutex<Vec<Received<ExportMetricsServiceRequest>>>>,
    logs: Arc<Mutex<Vec<Received<ExportLogsServiceRequest>>>>,
}

impl Collector {
    pub fn trace_requests(&self) -> Vec<Received<ExportTraceServiceRequest>> {
        self.traces.lock().clone()
    }

    pub fn metric_requests(&self) -> Vec<Received<ExportMetricsServiceRequest>> {
        self.metrics.lock().clone()
    }

    pub fn log_requests(&self) -> Vec<Received<ExportLogsServiceRequest>> {
        self.logs.lock().clone()
    }

    /// Every span, in arrival order
    pub fn spans(&self) -> Vec<Span> {
        self.traces
            .lock()
            .iter()
            .flat_map(|r| r.request.resource_spans.iter())
            .flat_map(|rs| rs.scope_spans.iter())
            .flat_map(|ss| ss.spans.iter().cloned())
            .collect()
    }

    /// Every log record, in arrival order
    pub fn log_records(&self) -> Vec<LogRecord> {
        self.logs
            .lock()
            .iter()
            .flat_map(|r| r.request.resource_logs.iter())
            .flat_map(|rl| rl.scope_logs.iter())
            .flat_map(|sl| sl.log_records.iter().cloned())
            .collect()
    }

    /// Metrics of the most recent export
    pub fn last_metrics(&self) -> Vec<Metric> {
        self.metrics
            .lock()
            .last()
            .map(|r| {
                r.request
                    .resource_metrics
                    .iter()
                    .flat_map(|rm| rm.scope_metrics.iter())
                    .flat_map(|sm| sm.metrics.iter().cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Resources of every trace, metric and log request
    pub fn resources(&self) -> Vec<Resource> {
        let traces = self.traces.lock();
        let metrics = self.metrics.lock();
        let logs = self.logs.lock();
        traces
            .iter()
            .flat_map(|r| r.request.resource_spans.iter().map(|rs| rs.resource.clone()))
            .chain(
                metrics
                    .iter()
                    .flat_map(|r| r.request.resource_metrics.iter().map(|rm| rm.resource.clone())),
            )
            .chain(
                logs.iter()
                    .flat_map(|r| r.request.resource_logs.iter().map(|rl| rl.resource.clone())),
            )
            .flatten()
            .collect()
    }

    /// Every header value seen for [`API_KEY`]
    pub fn api_keys(&self) -> Vec<Option<String>> {
        let traces = self.traces.lock();
        let metrics = self.metrics.lock();
        let logs = self.logs.lock();
        traces
            .iter()
            .map(|r| r.api_key.clone())
            .chain(metrics.iter().map(|r| r.api_key.clone()))
            .chain(logs.iter().map(|r| r.api_key.clone()))
            .collect()
    }
}

fn grpc_received<T>(request: Request<T>) -> Received<T> {
    let text = |name: &str| {
        request
            .metadata()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let api_key = text(API_KEY);
    let content_type = text("content-type");
    Received {
        api_key,
        content_type,
        request: request.into_inner(),
    }
}

#[tonic::async_trait]
impl TraceService for Collector {
    async fn export(
        &self,
        request: Request<ExportTraceServiceRequest>,
    ) -> std::result::Result<Response<ExportTraceServiceResponse>, Status> {
        self.traces.lock().push(grpc_received(request));
        Ok(Response::new(ExportTraceServiceResponse::default()))
    }
}

#[tonic::async_trait]
impl MetricsService for Collector {
    async fn export(
        &self,
        request: Request<ExportMetricsServiceRequest>,
    ) -> std::result::Result<Response<ExportMetricsServiceResponse>, Status> {
        self.metrics.lock().push(grpc_received(request));
        Ok(Response::new(ExportMetricsServiceResponse::default()))
    }
}

#[tonic::async_trait]
impl LogsService for Collector {
    async fn export(
        &self,
        request: Request<ExportLogsServiceRequest>,
    ) -> std::result::Result<Response<ExportLogsServiceResponse>, Status> {
        self.logs.lock().push(grpc_received(request));
        Ok(Response::new(ExportLogsServiceResponse::default()))
    }
}

/// OTLP/gRPC collector on an ephemeral port.
pub async fn start_grpc_collector() -> (SocketAddr, Collector) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let incoming = TcpIncoming::from_listener(listener, true, None).unwrap();

    let collector = Collector::default();
    let server = Server::builder()
        .add_service(TraceServiceServer::new(collector.clone()))
        .add_service(MetricsServiceServer::new(collector.clone()))
        .add_service(LogsServiceServer::new(collector.clone()))
        .serve_with_incoming(incoming);
    tokio::spawn(server);

    (addr, collector)
}

fn http_received<T: Message + Default>(headers: &HeaderMap, body: Bytes) -> Option<Received<T>> {
    let text = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let request = T::decode(body).ok()?;
    Some(Received {
        api_key: text(API_KEY),
        content_type: text(header::CONTENT_TYPE.as_str()),
        request,
    })
}

fn protobuf_reply<R: Message + Default>() -> (StatusCode, [(header::HeaderName, &'static str); 1], Vec<u8>) {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/x-protobuf")],
        R::default().encode_to_vec(),
    )
}

async fn http_traces(
    State(collector): State<Collector>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, [(header::HeaderName, &'static str); 1], Vec<u8>) {
    match http_received(&headers, body) {
        Some(received) => {
            collector.traces.lock().push(received);
            protobuf_reply::<ExportTraceServiceResponse>()
        },
        None => (StatusCode::BAD_REQUEST, [(header::CONTENT_TYPE, "text/plain")], Vec::new()),
    }
}

async fn http_metrics(
    State(collector): State<Collector>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, [(header::HeaderName, &'static str); 1], Vec<u8>) {
    match http_received(&headers, body) {
        Some(received) => {
            collector.metrics.lock().push(received);
            protobuf_reply::<ExportMetricsServiceResponse>()
        },
        None => (StatusCode::BAD_REQUEST, [(header::CONTENT_TYPE, "text/plain")], Vec::new()),
    }
}

async fn http_logs(
    State(collector): State<Collector>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, [(header::HeaderName, &'static str); 1], Vec<u8>) {
    match http_received(&headers, body) {
        Some(received) => {
            collector.logs.lock().push(received);
            protobuf_reply::<ExportLogsServiceResponse>()
        },
        None => (StatusCode::BAD_REQUEST, [(header::CONTENT_TYPE, "text/plain")], Vec::new()),
    }
}

/// OTLP/HTTP collector on an ephemeral port, serving `/v1/{traces,metrics,logs}`.
pub async fn start_http_collector() -> (SocketAddr, Collector) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let collector = Collector::default();
    let app = Router::new()
        .route("/v1/traces", post(http_traces))
        .route("/v1/metrics", post(http_metrics))
        .route("/v1/logs", post(http_logs))
        .with_state(collector.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    (addr, collector)
}

/// TLS-terminating front for `backend`, using a fresh self-signed certificate
/// for `localhost` and offering `alpn`.
pub async fn start_tls_front(backend: SocketAddr, alpn: &[&[u8]]) -> SocketAddr {
    let rcgen::CertifiedKey { cert, key_pair } =
        rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_pair.serialize_der()));

    let mut config = rustls::ServerConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .unwrap()
    .with_no_client_auth()
    .with_single_cert(vec![cert.der().clone()], key)
    .unwrap();
    config.alpn_protocols = alpn.iter().map(|p| p.to_vec()).collect();
    let acceptor = TlsAcceptor::from(Arc::new(config));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                let Ok(mut tls) = acceptor.accept(stream).await else {
                    return;
                };
                let Ok(mut upstream) = TcpStream::connect(backend).await else {
                    return;
                };
                let _ = tokio::io::copy_bidirectional(&mut tls, &mut upstream).await;
            });
        }
    });

    addr
}

/// Run configuration against `endpoint` with the test API key.
pub fn config(endpoint: String, rate: u32, duration: Duration) -> GenerationConfig {
    GenerationConfigBuilder::new()
        .endpoint(endpoint)
        .service_name("integration")
        .rate(rate)
        .duration(duration)
        .batch_size(4)
        .header(API_KEY, "secret")
        .build()
        .unwrap()
}

/// String value of `key` among `attributes`
pub fn string_attribute(attributes: &[KeyValue], key: &str) -> Option<String> {
    attributes
        .iter()
        .find(|kv| kv.key == key)
        .and_then(|kv| kv.value.as_ref())
        .and_then(|v| match &v.value {
            Some(Value::StringValue(s)) => Some(s.clone()),
            _ => None,
        })
}

/// `service.name` of a resource
pub fn service_name(resource: &Resource) -> Option<String> {
    string_attribute(&resource.attributes, "service.name")
}

/// String body of a log record
pub fn body(record: &LogRecord) -> &str {
    match record.body.as_ref().and_then(|b| b.value.as_ref()) {
        Some(Value::StringValue(s)) => s,
        other => panic!("unexpected log body {:?}", other),
    }
}

/// Named metric's data
pub fn metric_data<'a>(metrics: &'a [Metric], name: &str) -> Option<&'a metric::Data> {
    metrics
        .iter()
        .find(|m| m.name == name)
        .and_then(|m| m.data.as_ref())
}
