//! Synthetic metric instruments.
//!
//! Ticks update a cumulative request counter and a duration histogram. The
//! CPU gauge is observed only when the reader collects, so its cadence
//! follows the export interval rather than the generation rate.

use opentelemetry::metrics::{Counter, Histogram, Meter, ObservableGauge};
use opentelemetry::KeyValue;
use rand::Rng;

/// Counter name
pub const REQUESTS_METRIC: &str = "otelgen.requests";
/// Histogram name
pub const DURATION_METRIC: &str = "otelgen.duration";
/// Gauge name
pub const CPU_USAGE_METRIC: &str = "otelgen.cpu_usage";

/// Request counter, duration histogram and CPU gauge for one run.
pub struct MetricInstruments {
    requests: Counter<u64>,
    durations: Histogram<f64>,
    _cpu_usage: ObservableGauge<f64>,
    request_attributes: [KeyValue; 2],
}

impl std::fmt::Debug for MetricInstruments {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricInstruments")
            .field("request_attributes", &self.request_attributes)
            .finish_non_exhaustive()
    }
}

impl MetricInstruments {
    /// Instruments whose gauge observes a uniform value in [0, 100).
    pub fn new(meter: &Meter) -> Self {
        Self::with_gauge_sampler(meter, || rand::thread_rng().gen_range(0.0..100.0))
    }

    /// Instruments with a custom gauge sampler.
    pub fn with_gauge_sampler<F>(meter: &Meter, sampler: F) -> Self
    where
        F: Fn() -> f64 + Send + Sync + 'static,
    {
        let requests = meter
            .u64_counter(REQUESTS_METRIC)
            .with_description("Number of requests")
            .build();

        let durations = meter
            .f64_histogram(DURATION_METRIC)
            .with_description("Request duration")
            .with_unit("ms")
            .build();

        let host = [KeyValue::new("host", "localhost")];
        let cpu_usage = meter
            .f64_observable_gauge(CPU_USAGE_METRIC)
            .with_description("CPU usage percentage")
            .with_callback(move |observer| observer.observe(sampler(), &host))
            .build();

        Self {
            requests,
            durations,
            _cpu_usage: cpu_usage,
            request_attributes: [
                KeyValue::new("method", "GET"),
                KeyValue::new("endpoint", "/api/test"),
            ],
        }
    }

    /// One tick: count a request and record a duration in [0, 1000) ms.
    pub fn record_request<R: Rng + ?Sized>(&self, rng: &mut R) {
        self.add_request();
        self.record_duration(rng.gen_range(0.0..1000.0));
    }

    /// Increment the request counter by one.
    pub fn add_request(&self) {
        self.requests.add(1, &self.request_attributes);
    }

    /// Record a duration sample in milliseconds.
    pub fn record_duration(&self, millis: f64) {
        self.durations.record(millis, &self.request_attributes);
    }
}
