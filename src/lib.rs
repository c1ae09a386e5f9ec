//! otelgen - synthetic OpenTelemetry traffic generator.
//!
//! otelgen produces traces, metrics or logs at a fixed rate for a fixed
//! duration and ships them to an OTLP endpoint over gRPC or HTTP. It is meant
//! for load-testing collectors and observability backends.
//!
//! # Features
//!
//! - **Endpoint resolution**: `grpc`, `grpcs`, `http` and `https` URLs with
//!   per-protocol default ports
//! - **Sized payloads**: pad spans and log bodies to a target size
//! - **SDK pipeline**: OpenTelemetry SDK providers with bounded flush and shutdown
//! - **TLS**: rustls with an optional skip-verification mode
//!
//! # Architecture
//!
//! - `core`: configuration and errors
//! - `endpoint`: OTLP endpoint parsing
//! - `payload`: synthetic spans, metric instruments and log documents
//! - `export`: gRPC channel, HTTP client and SDK provider wiring
//! - `generator`: the rate/deadline scheduler and per-signal generators
//! - `cli`: command-line interface
//!
//! # Example
//!
//! ```no_run
//! use otelgen_lib::core::GenerationConfigBuilder;
//! use otelgen_lib::generator;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GenerationConfigBuilder::new()
//!         .endpoint("grpc://localhost:4317")
//!         .rate(20)
//!         .duration(Duration::from_secs(5))
//!         .build()?;
//!     let report = generator::logs::run(&config).await?;
//!     println!("{}", report);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod cli;
pub mod core;
pub mod endpoint;
pub mod export;
pub mod generator;
pub mod payload;

// Re-export core types for convenience
pub use crate::core::{GenerationConfig, OtelgenError, Result};
pub use crate::endpoint::{Endpoint, Protocol};
pub use crate::generator::{RunReport, Signal};
