//! Core configuration and error handling for otelgen.
//!
//! Everything here is independent of the telemetry signal being generated.

#![warn(missing_docs)]

pub mod config;
pub mod error;

// Re-export commonly used types
pub use config::{FileConfig, GenerationConfig, GenerationConfigBuilder, Headers};
pub use error::{OtelgenError, Result};
