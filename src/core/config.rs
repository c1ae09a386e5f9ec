//! Configuration management for otelgen.
//!
//! A run is described by a single immutable [`GenerationConfig`]. It is
//! assembled by [`GenerationConfigBuilder`] from, in increasing priority:
//! - built-in defaults
//! - an optional YAML file
//! - environment variables and CLI arguments
//!
//! and validated once on `build()`.

use crate::core::{OtelgenError, Result};
use crate::endpoint::{Endpoint, PortConvention};
use crate::payload::parse_size;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Default service name reported in the resource
pub const DEFAULT_SERVICE_NAME: &str = "otelgen";
/// Default generation rate per second
pub const DEFAULT_RATE: u32 = 1;
/// Default run duration
pub const DEFAULT_DURATION: Duration = Duration::from_secs(10);
/// Default maximum number of log records per export batch
pub const DEFAULT_BATCH_SIZE: usize = 512;

/// Ordered request headers applied to every export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    /// Empty header set
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a header, replacing an earlier value for the same key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }

    /// Iterate headers in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of headers
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no headers are set
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse a single `key=value` pair.
    pub fn parse_pair(pair: &str) -> Result<(String, String)> {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| OtelgenError::config(format!("invalid header {:?}: expected key=value", pair)))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(OtelgenError::config(format!("invalid header {:?}: empty key", pair)));
        }
        Ok((key.to_string(), value.trim().to_string()))
    }
}

impl std::str::FromStr for Headers {
    type Err = OtelgenError;

    /// Parse comma-separated `key=value` pairs.
    fn from_str(s: &str) -> Result<Self> {
        let mut headers = Headers::new();
        for pair in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = Headers::parse_pair(pair)?;
            headers.insert(key, value);
        }
        Ok(headers)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (k, v) in iter {
            headers.insert(k, v);
        }
        headers
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Values may carry credentials
        let keys: Vec<&str> = self.0.iter().map(|(k, _)| k.as_str()).collect();
        write!(f, "[{}]", keys.join(", "))
    }
}

/// Everything one generation run needs.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Resolved OTLP endpoint
    pub endpoint: Endpoint,
    /// `service.name` resource attribute
    pub service_name: String,
    /// Items generated per second
    pub rate: u32,
    /// How long to generate for
    pub duration: Duration,
    /// Target payload size in bytes, 0 when unset
    pub payload_size: u64,
    /// Maximum log records per export batch
    pub batch_size: usize,
    /// Headers sent with every export
    pub headers: Headers,
    /// Emit diagnostic output and run connectivity probes
    pub verbose: bool,
    /// Accept any server certificate on TLS transports
    pub skip_tls_verify: bool,
}

impl GenerationConfig {
    /// Tick period, `1s / rate`
    pub fn period(&self) -> Duration {
        Duration::from_secs(1) / self.rate.max(1)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.rate == 0 {
            return Err(OtelgenError::config("rate must be greater than 0"));
        }

        if Duration::from_secs(1) / self.rate < Duration::from_micros(1) {
            return Err(OtelgenError::config(format!(
                "rate {} is too high: tick period would be below 1µs",
                self.rate
            )));
        }

        if self.duration.is_zero() {
            return Err(OtelgenError::config("duration must be greater than 0"));
        }

        if self.batch_size == 0 {
            return Err(OtelgenError::config("batch_size must be greater than 0"));
        }

        if self.service_name.trim().is_empty() {
            return Err(OtelgenError::config("service name cannot be empty"));
        }

        Ok(())
    }
}

/// Settings readable from a YAML file. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// OTLP endpoint URL
    pub otlp_endpoint: Option<String>,
    /// Service name
    pub service: Option<String>,
    /// Items per second
    pub rate: Option<u32>,
    /// Run duration, e.g. `30s` or `5m`
    #[serde(with = "humantime_serde")]
    pub duration: Option<Duration>,
    /// Payload size literal, e.g. `1kb`
    pub payload_size: Option<String>,
    /// Log batch size
    pub batch_size: Option<usize>,
    /// Extra request headers
    pub headers: BTreeMap<String, String>,
    /// Diagnostic output
    pub verbose: Option<bool>,
    /// Skip TLS certificate verification
    pub insecure_skip_verify: Option<bool>,
    /// Default-port table
    pub port_convention: Option<PortConvention>,
}

/// Layered construction of a [`GenerationConfig`].
#[derive(Debug, Clone)]
pub struct GenerationConfigBuilder {
    endpoint: Option<String>,
    service_name: String,
    rate: u32,
    duration: Duration,
    payload_size: Option<String>,
    batch_size: usize,
    headers: Headers,
    verbose: bool,
    skip_tls_verify: bool,
    port_convention: PortConvention,
}

impl Default for GenerationConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GenerationConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        Self {
            endpoint: None,
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            rate: DEFAULT_RATE,
            duration: DEFAULT_DURATION,
            payload_size: None,
            batch_size: DEFAULT_BATCH_SIZE,
            headers: Headers::new(),
            verbose: false,
            skip_tls_verify: false,
            port_convention: PortConvention::default(),
        }
    }

    /// Layer settings from a YAML document over the current values
    pub fn from_yaml(self, yaml: &str) -> Result<Self> {
        let file: FileConfig = serde_yaml::from_str(yaml)
            .map_err(|e| OtelgenError::config(format!("Failed to parse YAML config: {}", e)))?;
        Ok(self.apply_file(file))
    }

    /// Layer settings from a parsed file over the current values
    pub fn apply_file(mut self, file: FileConfig) -> Self {
        if let Some(endpoint) = file.otlp_endpoint {
            self.endpoint = Some(endpoint);
        }
        if let Some(service) = file.service {
            self.service_name = service;
        }
        if let Some(rate) = file.rate {
            self.rate = rate;
        }
        if let Some(duration) = file.duration {
            self.duration = duration;
        }
        if let Some(size) = file.payload_size {
            self.payload_size = Some(size);
        }
        if let Some(batch_size) = file.batch_size {
            self.batch_size = batch_size;
        }
        for (key, value) in file.headers {
            self.headers.insert(key, value);
        }
        if let Some(verbose) = file.verbose {
            self.verbose = verbose;
        }
        if let Some(skip) = file.insecure_skip_verify {
            self.skip_tls_verify = skip;
        }
        if let Some(convention) = file.port_convention {
            self.port_convention = convention;
        }
        self
    }

    /// Set the endpoint URL
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the service name
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    /// Set the rate per second
    pub fn rate(mut self, rate: u32) -> Self {
        self.rate = rate;
        self
    }

    /// Set the run duration
    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Set the payload size literal
    pub fn payload_size(mut self, literal: impl Into<String>) -> Self {
        self.payload_size = Some(literal.into());
        self
    }

    /// Set the log batch size
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Add or replace one header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key, value);
        self
    }

    /// Add or replace several headers
    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in headers {
            self.headers.insert(k, v);
        }
        self
    }

    /// Set verbose mode
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Skip TLS certificate verification
    pub fn skip_tls_verify(mut self, skip: bool) -> Self {
        self.skip_tls_verify = skip;
        self
    }

    /// Choose the default-port table
    pub fn port_convention(mut self, convention: PortConvention) -> Self {
        self.port_convention = convention;
        self
    }

    /// Resolve, build and validate the configuration
    pub fn build(self) -> Result<GenerationConfig> {
        let raw = self
            .endpoint
            .ok_or_else(|| OtelgenError::config("an OTLP endpoint is required (--otlp-endpoint)"))?;
        let endpoint = Endpoint::parse_with(&raw, &self.port_convention.ports())?;

        let payload_size = match &self.payload_size {
            Some(literal) => parse_size(literal)?,
            None => 0,
        };

        let config = GenerationConfig {
            endpoint,
            service_name: self.service_name,
            rate: self.rate,
            duration: self.duration,
            payload_size,
            batch_size: self.batch_size,
            headers: self.headers,
            verbose: self.verbose,
            skip_tls_verify: self.skip_tls_verify,
        };
        config.validate()?;
        Ok(config)
    }
}
