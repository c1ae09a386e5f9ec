use thiserror::Error;

#[derive(Error, Debug)]
pub enum OtelgenError {
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Invalid size: {0}")]
    InvalidSize(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Exporter setup error: {0}")]
    Exporter(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("GRPC transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Timeout error: operation took longer than {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

/// Result type alias for otelgen operations
pub type Result<T> = std::result::Result<T, OtelgenError>;

impl OtelgenError {
    /// Creates a new invalid endpoint error
    pub fn endpoint<S: Into<String>>(msg: S) -> Self {
        Self::InvalidEndpoint(msg.into())
    }

    /// Creates a new invalid size error
    pub fn size<S: Into<String>>(msg: S) -> Self {
        Self::InvalidSize(msg.into())
    }

    /// Creates a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a new exporter setup error
    pub fn exporter<S: Into<String>>(msg: S) -> Self {
        Self::Exporter(msg.into())
    }

    /// Creates a new export error for a failed flush or shutdown
    pub fn export<S: Into<String>>(msg: S) -> Self {
        Self::Export(msg.into())
    }

    /// Creates a new network error
    pub fn network<S: Into<String>>(msg: S) -> Self {
        Self::Network(msg.into())
    }

    /// Creates a timeout error from the elapsed bound
    pub fn timeout(bound: std::time::Duration) -> Self {
        Self::Timeout {
            timeout_ms: u64::try_from(bound.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Returns the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidEndpoint(_) | Self::InvalidSize(_) | Self::Config(_) => "config",
            Self::Exporter(_) | Self::Transport(_) => "setup",
            Self::Export(_) => "export",
            Self::Network(_) => "network",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
            Self::Timeout { .. } => "timeout",
        }
    }
}
