//! Metric generation.

use super::{interrupted, run_probes, Generator, RunReport, Scheduler, Signal};
use crate::core::{GenerationConfig, Result};
use crate::export::{drain, ExporterFactory, SCOPE_NAME};
use crate::payload::MetricInstruments;
use async_trait::async_trait;
use opentelemetry::metrics::MeterProvider as _;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;

/// Verbose progress line cadence, in events
const PROGRESS_EVERY: u64 = 5;

/// Updates the counter and histogram once per tick; a periodic reader exports.
pub struct MetricGenerator {
    instruments: MetricInstruments,
    provider: SdkMeterProvider,
    rng: StdRng,
    verbose: bool,
    events: u64,
}

impl MetricGenerator {
    /// Generator recording on instruments from `provider`
    pub fn new(provider: SdkMeterProvider) -> Self {
        let instruments = MetricInstruments::new(&provider.meter(SCOPE_NAME));
        Self {
            instruments,
            provider,
            rng: StdRng::from_entropy(),
            verbose: false,
            events: 0,
        }
    }

    /// Log progress every few events
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

#[async_trait]
impl Generator for MetricGenerator {
    fn signal(&self) -> Signal {
        Signal::Metrics
    }

    async fn tick(&mut self) -> Result<()> {
        self.instruments.record_request(&mut self.rng);
        self.events += 1;

        if self.verbose && self.events % PROGRESS_EVERY == 0 {
            tracing::info!("Generated {} metric events so far", self.events);
        }
        Ok(())
    }

    /// Final collection and shutdown share the one `timeout`.
    async fn shutdown(&mut self, timeout: Duration) -> Result<()> {
        drain(&self.provider, timeout).await
    }
}

/// Generate metric events for the configured duration.
pub async fn run(config: &GenerationConfig) -> Result<RunReport> {
    let scheduler = Scheduler::new(config.rate, config.duration)?;
    let factory = ExporterFactory::new(config);
    run_probes(config, &factory, Signal::Metrics).await;

    let provider = factory.meter_provider().await?;
    let mut generator = MetricGenerator::new(provider).verbose(config.verbose);

    scheduler.run_until(&mut generator, interrupted()).await
}
