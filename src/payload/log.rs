//! Synthetic structured log records.
//!
//! Each record body is a compact JSON document shaped like an API gateway
//! access log. When a target size is requested, a `payload_data` filler field
//! brings the serialized document close to that size.

use super::random_string;
use crate::core::Result;
use chrono::{SecondsFormat, Utc};
use opentelemetry::logs::{AnyValue, LogRecord as _, Logger, Severity};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Bytes reserved for the filler field name and JSON punctuation.
pub const PADDING_HEADROOM: u64 = 100;

const MESSAGES: [&str; 10] = [
    "Request processed successfully",
    "Database query executed",
    "Cache hit for key",
    "User authentication completed",
    "API request received",
    "Processing payment transaction",
    "Sending notification",
    "Background job started",
    "File uploaded successfully",
    "Configuration reloaded",
];

const ENDPOINTS: [&str; 8] = [
    "/api/v1/users",
    "/api/v1/orders",
    "/api/v1/products",
    "/api/v1/payments",
    "/api/v1/auth",
    "/api/v1/analytics",
    "/api/v1/notifications",
    "/api/v1/reports",
];

const HTTP_METHODS: [&str; 5] = ["GET", "POST", "PUT", "DELETE", "PATCH"];

const STATUS_CODES: [u16; 9] = [200, 201, 400, 401, 403, 404, 500, 502, 503];

const USER_AGENTS: [&str; 5] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 14_0 like Mac OS X) AppleWebKit/605.1.15",
    "okhttp/4.9.0",
    "axios/0.21.1",
];

const ERROR_MESSAGES: [&str; 8] = [
    "connection timeout",
    "invalid authentication token",
    "rate limit exceeded",
    "database connection failed",
    "service unavailable",
    "invalid request payload",
    "resource not found",
    "permission denied",
];

const ROLES: [&str; 4] = ["admin", "user", "guest", "developer"];

const DATABASES: [&str; 4] = ["users_db", "orders_db", "products_db", "analytics_db"];

const DATABASE_PROBABILITY: f64 = 0.3;

/// Log level of a synthetic record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    /// Debug
    Debug,
    /// Info
    Info,
    /// Warn
    Warn,
    /// Error
    Error,
}

impl LogLevel {
    /// Levels picked uniformly per record
    pub const ALL: [LogLevel; 4] = [LogLevel::Info, LogLevel::Warn, LogLevel::Error, LogLevel::Debug];

    /// Display string, also used as the OTLP severity text
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }

    /// OTLP severity number
    pub fn severity(self) -> Severity {
        match self {
            LogLevel::Debug => Severity::Debug,
            LogLevel::Info => Severity::Info,
            LogLevel::Warn => Severity::Warn,
            LogLevel::Error => Severity::Error,
        }
    }
}

/// HTTP request details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpSection {
    /// Request method
    pub method: String,
    /// Request path
    pub endpoint: String,
    /// Response status
    pub status_code: u16,
    /// Handling time in milliseconds
    pub duration_ms: u32,
    /// Client user agent
    pub user_agent: String,
    /// Client address in 10.0.0.0/8
    pub client_ip: String,
}

/// Calling user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSection {
    /// `user_<n>`
    pub id: String,
    /// Contact address
    pub email: String,
    /// One of admin, user, guest, developer
    pub role: String,
    /// `org_<n>`
    pub org_id: String,
}

/// Present only on ERROR records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorSection {
    /// Error class, serialized as `type`
    #[serde(rename = "type")]
    pub kind: String,
    /// Short error description
    pub message: String,
    /// Three newline-separated frames
    pub stack_trace: String,
    /// `ERR_<n>`
    pub code: String,
}

/// Present on roughly 30% of records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSection {
    /// Query time in milliseconds
    pub query_time_ms: u32,
    /// Rows touched by the query
    pub rows_affected: u32,
    /// Pool connection used
    pub connection_id: u32,
    /// Database name
    pub database: String,
}

/// Body of a synthetic log record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogDocument {
    /// RFC 3339 UTC time with nanoseconds
    pub timestamp: String,
    /// Record level
    pub level: LogLevel,
    /// Catalog message
    pub message: String,
    /// Always `api-gateway`
    pub service: String,
    /// Always `production`
    pub environment: String,
    /// Always `v1.2.3`
    pub version: String,
    /// `server-<n>`
    pub host: String,
    /// `pod-<n>-<random>`
    pub pod_id: String,
    /// `req-<random>-<unix seconds>`
    pub request_id: String,
    /// 32 random characters
    pub trace_id: String,
    /// 16 random characters
    pub span_id: String,
    /// Request details
    pub http: HttpSection,
    /// Calling user
    pub user: UserSection,
    /// Error details, ERROR records only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorSection>,
    /// Query details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseSection>,
    /// Filler bringing the body up to the requested size
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_data: Option<String>,
}

impl LogDocument {
    /// Compact JSON encoding.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Encode, adding a filler field when the document is shorter than `target`.
    ///
    /// The filler is `target - len - PADDING_HEADROOM` characters, so a padded
    /// document lands within `PADDING_HEADROOM` bytes below `target`.
    pub fn render<R: Rng + ?Sized>(&mut self, target: u64, rng: &mut R) -> Result<String> {
        let body = self.to_json()?;
        let current = body.len() as u64;
        if target == 0 || current >= target {
            return Ok(body);
        }

        let remaining = target.saturating_sub(current + PADDING_HEADROOM);
        if remaining == 0 {
            return Ok(body);
        }

        self.payload_data = Some(random_string(
            rng,
            usize::try_from(remaining).unwrap_or(usize::MAX),
        ));
        self.to_json()
    }
}

/// One generated log record before it is emitted.
#[derive(Debug, Clone)]
pub struct SyntheticLog {
    /// Level of the record
    pub level: LogLevel,
    /// Base message picked from the catalog
    pub message: &'static str,
    /// Serialized JSON body
    pub body: String,
    /// Record attributes: component, request_id, user_id
    pub attributes: Vec<(&'static str, String)>,
}

impl SyntheticLog {
    /// Emit through `logger`, stamped with the current time.
    pub fn emit<L: Logger>(self, logger: &L) {
        let now = SystemTime::now();
        let mut record = logger.create_log_record();
        record.set_timestamp(now);
        record.set_observed_timestamp(now);
        record.set_severity_number(self.level.severity());
        record.set_severity_text(self.level.as_str());
        record.set_body(AnyValue::from(self.body));
        for (key, value) in self.attributes {
            record.add_attribute(key, value);
        }
        logger.emit(record);
    }
}

/// Produces structured log records, optionally padded to a target size.
pub struct LogSynthesizer {
    payload_size: u64,
    rng: StdRng,
}

impl LogSynthesizer {
    /// Synthesizer targeting `payload_size` bytes per body (0 = unpadded).
    pub fn new(payload_size: u64) -> Self {
        Self::with_rng(payload_size, StdRng::from_entropy())
    }

    /// Synthesizer with a caller-provided random source.
    pub fn with_rng(payload_size: u64, rng: StdRng) -> Self {
        Self { payload_size, rng }
    }

    /// Produce one record.
    pub fn generate(&mut self) -> Result<SyntheticLog> {
        let message = *pick(&mut self.rng, &MESSAGES);
        let level = *pick(&mut self.rng, &LogLevel::ALL);

        let mut document = self.document(message, level);
        let body = document.render(self.payload_size, &mut self.rng)?;

        let request_id = format!("req-{}", random_string(&mut self.rng, 16));
        let user_id = format!("user_{}", self.rng.gen_range(0..10_000));

        Ok(SyntheticLog {
            level,
            message,
            body,
            attributes: vec![
                ("component", "otelgen".to_string()),
                ("request_id", request_id),
                ("user_id", user_id),
            ],
        })
    }

    /// Build an unpadded document for `message` at `level`.
    pub fn document(&mut self, message: &str, level: LogLevel) -> LogDocument {
        let rng = &mut self.rng;
        let now = Utc::now();

        let http = HttpSection {
            method: pick(rng, &HTTP_METHODS).to_string(),
            endpoint: pick(rng, &ENDPOINTS).to_string(),
            status_code: *pick(rng, &STATUS_CODES),
            duration_ms: rng.gen_range(0..5000),
            user_agent: pick(rng, &USER_AGENTS).to_string(),
            client_ip: format!(
                "10.{}.{}.{}",
                rng.gen_range(0..256),
                rng.gen_range(0..256),
                rng.gen_range(0..256)
            ),
        };

        let user = UserSection {
            id: format!("user_{}", rng.gen_range(0..10_000)),
            email: format!("user{}@example.com", rng.gen_range(0..10_000)),
            role: pick(rng, &ROLES).to_string(),
            org_id: format!("org_{}", rng.gen_range(0..100)),
        };

        let error = (level == LogLevel::Error).then(|| ErrorSection {
            kind: "ServiceError".to_string(),
            message: pick(rng, &ERROR_MESSAGES).to_string(),
            stack_trace: stack_trace(rng),
            code: format!("ERR_{}", rng.gen_range(0..9999)),
        });

        let database = rng.gen_bool(DATABASE_PROBABILITY).then(|| DatabaseSection {
            query_time_ms: rng.gen_range(0..1000),
            rows_affected: rng.gen_range(0..100),
            connection_id: rng.gen_range(0..50),
            database: pick(rng, &DATABASES).to_string(),
        });

        LogDocument {
            timestamp: now.to_rfc3339_opts(SecondsFormat::Nanos, true),
            level,
            message: message.to_string(),
            service: "api-gateway".to_string(),
            environment: "production".to_string(),
            version: "v1.2.3".to_string(),
            host: format!("server-{}", rng.gen_range(0..10)),
            pod_id: format!("pod-{}-{}", rng.gen_range(0..100), random_string(rng, 8)),
            request_id: format!("req-{}-{}", random_string(rng, 16), now.timestamp()),
            trace_id: random_string(rng, 32),
            span_id: random_string(rng, 16),
            http,
            user,
            error,
            database,
            payload_data: None,
        }
    }
}

fn pick<'a, T>(rng: &mut StdRng, items: &'a [T]) -> &'a T {
    // Catalogs are non-empty constants
    items.choose(rng).unwrap_or(&items[0])
}

fn stack_trace(rng: &mut StdRng) -> String {
    ["Handler.handle", "Processor.process", "Worker.run"]
        .iter()
        .map(|frame| {
            format!(
                "at com.example.service.{}({}.java:{})",
                frame,
                random_string(rng, 10),
                rng.gen_range(0..500)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
