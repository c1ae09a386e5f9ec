//! Trace generation.

use super::{interrupted, run_probes, Generator, RunReport, Scheduler, Signal};
use crate::core::{GenerationConfig, Result};
use crate::export::{ExporterFactory, Provider, Purpose, SCOPE_NAME};
use crate::payload::TraceSynthesizer;
use async_trait::async_trait;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::{Tracer, TracerProvider};
use std::time::Duration;

/// Records one synthetic trace per tick on a batching tracer provider.
pub struct TraceGenerator {
    synthesizer: TraceSynthesizer,
    provider: TracerProvider,
    tracer: Tracer,
}

impl TraceGenerator {
    /// Generator recording through `provider`
    pub fn new(synthesizer: TraceSynthesizer, provider: TracerProvider) -> Self {
        let tracer = provider.tracer(SCOPE_NAME);
        Self {
            synthesizer,
            provider,
            tracer,
        }
    }
}

#[async_trait]
impl Generator for TraceGenerator {
    fn signal(&self) -> Signal {
        Signal::Traces
    }

    async fn tick(&mut self) -> Result<()> {
        let spans = self.synthesizer.generate(&self.tracer).await;
        tracing::trace!("Recorded trace with {} spans", spans);
        Ok(())
    }

    async fn shutdown(&mut self, timeout: Duration) -> Result<()> {
        self.provider.shutdown_within(timeout).await
    }
}

/// Generate traces for the configured duration.
pub async fn run(config: &GenerationConfig) -> Result<RunReport> {
    let scheduler = Scheduler::new(config.rate, config.duration)?;
    let factory = ExporterFactory::new(config);
    run_probes(config, &factory, Signal::Traces).await;

    let provider = factory.tracer_provider(Purpose::Run).await?;
    let mut generator = TraceGenerator::new(TraceSynthesizer::new(config.payload_size), provider);

    scheduler.run_until(&mut generator, interrupted()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::trace::PARENT_SPAN_NAME;
    use opentelemetry::trace::SpanId;
    use opentelemetry_sdk::testing::trace::InMemorySpanExporter;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    /// Trace generator that leaves the recording provider open for inspection.
    struct Recording {
        synthesizer: TraceSynthesizer,
        tracer: Tracer,
    }

    #[async_trait]
    impl Generator for Recording {
        fn signal(&self) -> Signal {
            Signal::Traces
        }

        async fn tick(&mut self) -> Result<()> {
            self.synthesizer.generate(&self.tracer).await;
            Ok(())
        }

        async fn shutdown(&mut self, _timeout: Duration) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_never_leaves_orphaned_children() {
        for seed in 0..40 {
            let exporter = InMemorySpanExporter::default();
            let provider = TracerProvider::builder()
                .with_simple_exporter(exporter.clone())
                .build();
            let mut generator = Recording {
                synthesizer: TraceSynthesizer::with_rng(0, StdRng::seed_from_u64(seed)),
                tracer: provider.tracer(SCOPE_NAME),
            };

            // The 1000ms tick runs for up to 246ms, so the deadline often lands inside it
            let scheduler = Scheduler::new(1, Duration::from_millis(1120)).unwrap();
            let report = scheduler.run(&mut generator).await.unwrap();

            let spans = exporter.get_finished_spans().unwrap();
            let parents: HashSet<SpanId> = spans
                .iter()
                .filter(|span| span.name == PARENT_SPAN_NAME)
                .map(|span| span.span_context.span_id())
                .collect();

            assert_eq!(report.emitted, 1, "seed {}", seed);
            assert_eq!(parents.len() as u64, report.emitted, "seed {}", seed);
            for child in spans.iter().filter(|span| span.name != PARENT_SPAN_NAME) {
                assert!(
                    parents.contains(&child.parent_span_id),
                    "seed {}: orphaned {}",
                    seed,
                    child.name
                );
            }
        }
    }
}
