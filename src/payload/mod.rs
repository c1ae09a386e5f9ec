//! Synthetic telemetry content.
//!
//! One synthesizer per signal produces a single unit of telemetry per tick:
//! - `trace`: a parent span with one to three children
//! - `metric`: counter, histogram and gauge instruments
//! - `log`: a structured JSON log document with optional padding
//!
//! Synthesizers never touch the network; they record through the SDK tracer,
//! meter or logger supplied by the caller.

pub mod log;
pub mod metric;
pub mod size;
pub mod trace;

pub use log::{LogDocument, LogLevel, LogSynthesizer, SyntheticLog};
pub use metric::MetricInstruments;
pub use size::{pad, parse_size, random_string};
pub use trace::{connection_test_span, TraceSynthesizer};
