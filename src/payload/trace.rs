//! Synthetic trace generation.

use super::pad;
use opentelemetry::trace::{Span as _, SpanKind, TraceContextExt, Tracer as _};
use opentelemetry::{Context, KeyValue};
use opentelemetry_sdk::trace::Tracer;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

/// Name of the root span of every synthetic trace
pub const PARENT_SPAN_NAME: &str = "parent-operation";

/// Name of the single span sent by the connectivity check
pub const CONNECTION_TEST_SPAN_NAME: &str = "connection-test";

/// Attribute carrying the requested padding
pub const PAYLOAD_ATTRIBUTE: &str = "payload.data";

/// Upper bound (exclusive) of the simulated parent work, in milliseconds
const PARENT_WORK_MS: u64 = 100;
/// Upper bound (exclusive) of the simulated child work, in milliseconds
const CHILD_WORK_MS: u64 = 50;
const MAX_CHILDREN: usize = 3;

/// Start and immediately end a single span to check that an endpoint accepts data.
pub fn connection_test_span(tracer: &Tracer) {
    let mut span = tracer
        .span_builder(CONNECTION_TEST_SPAN_NAME)
        .with_kind(SpanKind::Internal)
        .start(tracer);
    span.end();
}

/// Builds one parent span with one to three child spans per call.
pub struct TraceSynthesizer {
    payload_size: u64,
    simulate_work: bool,
    rng: StdRng,
}

impl TraceSynthesizer {
    /// Synthesizer padding every span with `payload_size` bytes (0 = none).
    pub fn new(payload_size: u64) -> Self {
        Self::with_rng(payload_size, StdRng::from_entropy())
    }

    /// Synthesizer with a caller-provided random source.
    pub fn with_rng(payload_size: u64, rng: StdRng) -> Self {
        Self {
            payload_size,
            simulate_work: true,
            rng,
        }
    }

    /// Skip the simulated-latency sleeps.
    pub fn without_simulated_work(mut self) -> Self {
        self.simulate_work = false;
        self
    }

    /// Record one trace on `tracer` and return the number of spans ended.
    ///
    /// Children run one after another under the parent and end before the
    /// next starts; the parent ends last. Ending a span hands it to the
    /// tracer's processor, which never blocks.
    pub async fn generate(&mut self, tracer: &Tracer) -> usize {
        let mut parent_attributes = vec![
            KeyValue::new("operation.type", "http"),
            KeyValue::new("operation.id", self.rng.gen_range(0..1000_i64)),
        ];
        self.push_padding(&mut parent_attributes);

        let parent = tracer
            .span_builder(PARENT_SPAN_NAME)
            .with_kind(SpanKind::Internal)
            .with_attributes(parent_attributes)
            .start(tracer);
        let cx = Context::new().with_span(parent);

        let parent_work = self.rng.gen_range(0..PARENT_WORK_MS);
        self.work(parent_work).await;

        let children = self.rng.gen_range(1..=MAX_CHILDREN);
        for i in 0..children {
            let mut attributes = vec![
                KeyValue::new("child.type", "db"),
                KeyValue::new("child.id", i as i64),
            ];
            self.push_padding(&mut attributes);

            let mut child = tracer
                .span_builder(format!("child-operation-{}", i))
                .with_kind(SpanKind::Internal)
                .with_attributes(attributes)
                .start_with_context(tracer, &cx);

            let child_work = self.rng.gen_range(0..CHILD_WORK_MS);
            self.work(child_work).await;
            child.end();
        }

        cx.span().end();
        children + 1
    }

    fn push_padding(&self, attributes: &mut Vec<KeyValue>) {
        if self.payload_size > 0 {
            attributes.push(KeyValue::new(PAYLOAD_ATTRIBUTE, pad(self.payload_size)));
        }
    }

    async fn work(&self, millis: u64) {
        if self.simulate_work && millis > 0 {
            tokio::time::sleep(Duration::from_millis(millis)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::trace::{SpanId, TracerProvider as _};
    use opentelemetry::Value;
    use opentelemetry_sdk::export::trace::SpanData;
    use opentelemetry_sdk::testing::trace::InMemorySpanExporter;
    use opentelemetry_sdk::trace::TracerProvider;

    fn recording_tracer() -> (TracerProvider, Tracer, InMemorySpanExporter) {
        let exporter = InMemorySpanExporter::default();
        let provider = TracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        let tracer = provider.tracer("otelgen");
        (provider, tracer, exporter)
    }

    fn attribute(span: &SpanData, key: &str) -> Option<Value> {
        span.attributes
            .iter()
            .find(|kv| kv.key.as_str() == key)
            .map(|kv| kv.value.clone())
    }

    #[tokio::test(start_paused = true)]
    async fn test_trace_shape() {
        let (_provider, tracer, exporter) = recording_tracer();
        let mut synth = TraceSynthesizer::with_rng(0, StdRng::seed_from_u64(1));

        let emitted = synth.generate(&tracer).await;
        let spans = exporter.get_finished_spans().unwrap();

        assert_eq!(emitted, spans.len());
        assert!((2..=4).contains(&spans.len()));

        let parent = spans.last().unwrap();
        assert_eq!(parent.name, PARENT_SPAN_NAME);
        assert_eq!(parent.parent_span_id, SpanId::INVALID);
        assert_eq!(parent.span_kind, SpanKind::Internal);
        assert_eq!(attribute(parent, "operation.type"), Some(Value::from("http")));
        match attribute(parent, "operation.id") {
            Some(Value::I64(id)) => assert!((0..1000).contains(&id)),
            other => panic!("unexpected operation.id {:?}", other),
        }
        assert!(attribute(parent, PAYLOAD_ATTRIBUTE).is_none());

        for (i, child) in spans[..spans.len() - 1].iter().enumerate() {
            assert_eq!(child.name, format!("child-operation-{}", i));
            assert_eq!(child.span_context.trace_id(), parent.span_context.trace_id());
            assert_eq!(child.parent_span_id, parent.span_context.span_id());
            assert_eq!(attribute(child, "child.type"), Some(Value::from("db")));
            assert_eq!(attribute(child, "child.id"), Some(Value::I64(i as i64)));
            assert!(child.end_time <= parent.end_time);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_padding_on_every_span() {
        let (_provider, tracer, exporter) = recording_tracer();
        let mut synth = TraceSynthesizer::with_rng(256, StdRng::seed_from_u64(2));
        synth.generate(&tracer).await;

        for span in exporter.get_finished_spans().unwrap() {
            match attribute(&span, PAYLOAD_ATTRIBUTE) {
                Some(value) => assert_eq!(value.as_str().len(), 256),
                None => panic!("missing padding on {}", span.name),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulated_work_is_bounded() {
        let (_provider, tracer, _exporter) = recording_tracer();
        let mut synth = TraceSynthesizer::with_rng(0, StdRng::seed_from_u64(4));
        let start = tokio::time::Instant::now();
        synth.generate(&tracer).await;
        // 99ms parent + 3 * 49ms children at most
        assert!(start.elapsed() <= Duration::from_millis(99 + 3 * 49));
    }

    #[tokio::test]
    async fn test_without_simulated_work_is_immediate() {
        let (_provider, tracer, exporter) = recording_tracer();
        let mut synth =
            TraceSynthesizer::with_rng(0, StdRng::seed_from_u64(5)).without_simulated_work();
        let start = std::time::Instant::now();
        let emitted = synth.generate(&tracer).await;

        assert!(start.elapsed() < Duration::from_millis(50));
        assert_eq!(exporter.get_finished_spans().unwrap().len(), emitted);
    }

    #[test]
    fn test_connection_test_span() {
        let (_provider, tracer, exporter) = recording_tracer();
        connection_test_span(&tracer);

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].name, CONNECTION_TEST_SPAN_NAME);
    }
}
