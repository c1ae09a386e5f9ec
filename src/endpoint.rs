//! OTLP endpoint resolution.
//!
//! Normalizes `scheme://host[:port]` strings into an [`Endpoint`] for one of
//! the four supported transports: `grpc`, `grpcs`, `http` and `https`.

use crate::core::{OtelgenError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Transport protocol of an OTLP endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// Plaintext gRPC
    Grpc,
    /// gRPC over TLS
    Grpcs,
    /// Plaintext HTTP/protobuf
    Http,
    /// HTTP/protobuf over TLS
    Https,
}

impl Protocol {
    /// Scheme literal for this protocol
    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Grpc => "grpc",
            Protocol::Grpcs => "grpcs",
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }

    /// Whether this protocol runs over TLS
    pub fn is_secure(self) -> bool {
        matches!(self, Protocol::Grpcs | Protocol::Https)
    }

    /// Whether this protocol is gRPC-based
    pub fn is_grpc(self) -> bool {
        matches!(self, Protocol::Grpc | Protocol::Grpcs)
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Protocol {
    type Err = OtelgenError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "grpc" => Ok(Protocol::Grpc),
            "grpcs" => Ok(Protocol::Grpcs),
            "http" => Ok(Protocol::Http),
            "https" => Ok(Protocol::Https),
            _ => Err(OtelgenError::endpoint(format!(
                "unsupported protocol: {} (supported: grpc, grpcs, http, https)",
                s
            ))),
        }
    }
}

/// Port applied per protocol when the endpoint omits one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultPorts {
    /// Default for `grpc://`
    pub grpc: u16,
    /// Default for `grpcs://`
    pub grpcs: u16,
    /// Default for `http://`
    pub http: u16,
    /// Default for `https://`
    pub https: u16,
}

impl DefaultPorts {
    /// 443 everywhere except plaintext HTTP, as used by managed OTLP ingest.
    pub const MANAGED: DefaultPorts = DefaultPorts {
        grpc: 443,
        grpcs: 443,
        http: 80,
        https: 443,
    };

    /// The OTLP registry ports, 4317 for gRPC and 4318 for HTTP.
    pub const OTLP: DefaultPorts = DefaultPorts {
        grpc: 4317,
        grpcs: 4317,
        http: 4318,
        https: 4318,
    };

    /// Default port for a protocol
    pub fn for_protocol(&self, protocol: Protocol) -> u16 {
        match protocol {
            Protocol::Grpc => self.grpc,
            Protocol::Grpcs => self.grpcs,
            Protocol::Http => self.http,
            Protocol::Https => self.https,
        }
    }
}

impl Default for DefaultPorts {
    fn default() -> Self {
        Self::MANAGED
    }
}

/// Named default-port table, selectable from the command line or config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PortConvention {
    /// 443 for grpc/grpcs/https, 80 for http
    #[default]
    Managed,
    /// 4317 for grpc/grpcs, 4318 for http/https
    Otlp,
}

impl PortConvention {
    /// Port table for this convention
    pub fn ports(self) -> DefaultPorts {
        match self {
            PortConvention::Managed => DefaultPorts::MANAGED,
            PortConvention::Otlp => DefaultPorts::OTLP,
        }
    }
}

/// A resolved OTLP endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Transport protocol
    pub protocol: Protocol,
    /// Host name or address, without brackets for IPv6
    pub host: String,
    /// Port, verbatim from the input or the protocol default
    pub port: String,
    /// True exactly for `grpcs` and `https`
    pub secure: bool,
    /// Whether `port` came from the default table
    pub default_port: bool,
}

/// Port text after the host, if any; IPv6 literals keep their colons.
fn explicit_port(authority: &str) -> Option<&str> {
    let host_port = authority.rsplit_once('@').map_or(authority, |(_, rest)| rest);
    let after_host = match host_port.rfind(']') {
        Some(end) => &host_port[end + 1..],
        None => host_port,
    };
    after_host
        .rsplit_once(':')
        .map(|(_, port)| port)
        .filter(|port| !port.is_empty())
}

impl Endpoint {
    /// Resolve an endpoint using the managed default-port table.
    pub fn parse(raw: &str) -> Result<Self> {
        Self::parse_with(raw, &DefaultPorts::default())
    }

    /// Resolve an endpoint with an explicit default-port table.
    pub fn parse_with(raw: &str, defaults: &DefaultPorts) -> Result<Self> {
        if raw.is_empty() {
            return Err(OtelgenError::endpoint("endpoint cannot be empty"));
        }

        let uri: http::Uri = raw
            .parse()
            .map_err(|e| OtelgenError::endpoint(format!("failed to parse endpoint: {}", e)))?;

        let scheme = uri.scheme_str().unwrap_or_default();
        let protocol: Protocol = scheme.parse()?;

        let host = uri
            .host()
            .map(|h| h.trim_start_matches('[').trim_end_matches(']'))
            .unwrap_or_default();
        if host.is_empty() {
            return Err(OtelgenError::endpoint("host cannot be empty"));
        }

        let explicit = uri.authority().and_then(|a| explicit_port(a.as_str()));
        let (port, default_port) = match explicit {
            Some(port) => {
                port.parse::<u16>()
                    .map_err(|_| OtelgenError::endpoint(format!("invalid port {:?}", port)))?;
                (port.to_string(), false)
            },
            None => (defaults.for_protocol(protocol).to_string(), true),
        };

        Ok(Endpoint {
            protocol,
            host: host.to_string(),
            port,
            secure: protocol.is_secure(),
            default_port,
        })
    }

    /// `host:port`, as dialed by both gRPC and HTTP transports
    pub fn address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Whether the protocol is gRPC-based
    pub fn is_grpc(&self) -> bool {
        self.protocol.is_grpc()
    }

    /// Whether the protocol is HTTP-based
    pub fn is_http(&self) -> bool {
        !self.protocol.is_grpc()
    }

    /// Base URI the underlying client dials (`http` or `https` scheme)
    pub fn base_uri(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{}://{}", scheme, self.address())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.protocol, self.address())
    }
}

impl std::str::FromStr for Endpoint {
    type Err = OtelgenError;

    fn from_str(s: &str) -> Result<Self> {
        Endpoint::parse(s)
    }
}
