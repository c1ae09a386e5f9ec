//! Log generation.

use super::{interrupted, run_probes, Generator, RunReport, Scheduler, Signal};
use crate::core::{GenerationConfig, Result};
use crate::export::{ExporterFactory, Provider, SCOPE_NAME};
use crate::payload::LogSynthesizer;
use async_trait::async_trait;
use opentelemetry::logs::LoggerProvider as _;
use opentelemetry_sdk::logs::{Logger, LoggerProvider};
use std::time::Duration;

/// Emits one structured log record per tick on a batching logger provider.
pub struct LogGenerator {
    synthesizer: LogSynthesizer,
    provider: LoggerProvider,
    logger: Logger,
}

impl LogGenerator {
    /// Generator emitting through `provider`
    pub fn new(synthesizer: LogSynthesizer, provider: LoggerProvider) -> Self {
        let logger = provider.logger(SCOPE_NAME);
        Self {
            synthesizer,
            provider,
            logger,
        }
    }
}

#[async_trait]
impl Generator for LogGenerator {
    fn signal(&self) -> Signal {
        Signal::Logs
    }

    async fn tick(&mut self) -> Result<()> {
        let log = self.synthesizer.generate()?;
        tracing::debug!(
            level = log.level.as_str(),
            bytes = log.body.len(),
            "Generated log: {}",
            log.message
        );
        log.emit(&self.logger);
        Ok(())
    }

    async fn shutdown(&mut self, timeout: Duration) -> Result<()> {
        self.provider.shutdown_within(timeout).await
    }
}

/// Generate log records for the configured duration.
pub async fn run(config: &GenerationConfig) -> Result<RunReport> {
    let scheduler = Scheduler::new(config.rate, config.duration)?;
    let factory = ExporterFactory::new(config);
    run_probes(config, &factory, Signal::Logs).await;

    let provider = factory.logger_provider(config.batch_size).await?;
    let mut generator = LogGenerator::new(LogSynthesizer::new(config.payload_size), provider);

    scheduler.run_until(&mut generator, interrupted()).await
}
