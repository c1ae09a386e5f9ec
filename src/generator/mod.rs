//! Generation scheduling.
//!
//! A [`Scheduler`] drives one [`Generator`] at a fixed rate until its deadline
//! (or an operator interrupt), then reports the count and shuts the generator's
//! provider down. Each signal has its own generator and `run` entry point.

pub mod logs;
pub mod metrics;
pub mod traces;

pub use logs::LogGenerator;
pub use metrics::MetricGenerator;
pub use traces::TraceGenerator;

use crate::core::{GenerationConfig, OtelgenError, Result};
use crate::export::{probe_tcp, probe_trace_export, ExporterFactory};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Telemetry signal produced by a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    /// Parent/child span trees
    Traces,
    /// Counter, histogram and gauge updates
    Metrics,
    /// Structured log records
    Logs,
}

impl Signal {
    /// Signal name as used on the command line
    pub fn as_str(self) -> &'static str {
        match self {
            Signal::Traces => "traces",
            Signal::Metrics => "metrics",
            Signal::Logs => "logs",
        }
    }

    /// What one tick produces, plural
    pub fn noun(self) -> &'static str {
        match self {
            Signal::Traces => "traces",
            Signal::Metrics => "metric events",
            Signal::Logs => "log records",
        }
    }

    /// Bound on the provider shutdown once generation stops
    pub fn shutdown_timeout(self) -> Duration {
        match self {
            Signal::Traces | Signal::Logs => Duration::from_secs(10),
            Signal::Metrics => Duration::from_secs(30),
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scheduler lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Created, not started
    Idle,
    /// Ticking
    Running,
    /// Deadline or interrupt reached, provider being shut down
    Draining,
    /// Finished
    Stopped,
}

/// One signal's synthesis plus its provider.
#[async_trait]
pub trait Generator: Send {
    /// Signal this generator produces
    fn signal(&self) -> Signal;

    /// Produce and submit one unit of telemetry.
    async fn tick(&mut self) -> Result<()>;

    /// Flush and close the provider within `timeout`.
    async fn shutdown(&mut self, timeout: Duration) -> Result<()>;
}

/// Outcome of a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Signal generated
    pub signal: Signal,
    /// Ticks attempted before the deadline
    pub emitted: u64,
    /// Time from start to the end of ticking
    pub elapsed: Duration,
    /// Whether an interrupt ended the run early
    pub interrupted: bool,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Generated {} {}", self.emitted, self.signal.noun())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Deadline,
    Interrupted,
}

/// Fixed-rate tick loop with a one-shot deadline.
#[derive(Debug)]
pub struct Scheduler {
    period: Duration,
    duration: Duration,
    state: Mutex<SchedulerState>,
}

impl Scheduler {
    /// Scheduler ticking `rate` times per second for `duration`.
    pub fn new(rate: u32, duration: Duration) -> Result<Self> {
        if rate == 0 {
            return Err(OtelgenError::config("rate must be greater than 0"));
        }
        if duration.is_zero() {
            return Err(OtelgenError::config("duration must be greater than 0"));
        }
        let period = Duration::from_secs(1) / rate;
        if period.is_zero() {
            return Err(OtelgenError::config(format!("rate {} is too high", rate)));
        }

        Ok(Self {
            period,
            duration,
            state: Mutex::new(SchedulerState::Idle),
        })
    }

    /// Tick period
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Current lifecycle state
    pub fn state(&self) -> SchedulerState {
        *self.state.lock()
    }

    fn set_state(&self, state: SchedulerState) {
        tracing::debug!("Scheduler state: {:?}", state);
        *self.state.lock() = state;
    }

    /// Run until the deadline.
    pub async fn run<G>(&self, generator: &mut G) -> Result<RunReport>
    where
        G: Generator + ?Sized,
    {
        self.run_until(generator, std::future::pending::<()>()).await
    }

    /// Run until the deadline or until `interrupt` completes.
    ///
    /// No tick starts after the deadline. A tick already in progress when it
    /// fires is finished and counted before draining.
    ///
    /// The count line is printed before the provider is shut down, so it
    /// reflects attempted ticks rather than confirmed deliveries.
    pub async fn run_until<G, I>(&self, generator: &mut G, interrupt: I) -> Result<RunReport>
    where
        G: Generator + ?Sized,
        I: Future<Output = ()>,
    {
        if self.state() != SchedulerState::Idle {
            return Err(OtelgenError::config("scheduler can only run once"));
        }

        let signal = generator.signal();
        let start = Instant::now();
        let deadline = tokio::time::sleep_until(start + self.duration);
        tokio::pin!(deadline);
        tokio::pin!(interrupt);

        let mut ticker = interval_at(start + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        self.set_state(SchedulerState::Running);
        let mut emitted: u64 = 0;

        let reason = loop {
            tokio::select! {
                biased;

                _ = &mut deadline => break StopReason::Deadline,
                _ = &mut interrupt => break StopReason::Interrupted,
                _ = ticker.tick() => {
                    let tick = generator.tick();
                    tokio::pin!(tick);

                    // Stop is noticed mid-tick, but a started tick always completes
                    let stop = tokio::select! {
                        biased;

                        result = &mut tick => {
                            log_tick_error(signal, result);
                            None
                        }
                        _ = &mut deadline => Some(StopReason::Deadline),
                        _ = &mut interrupt => Some(StopReason::Interrupted),
                    };
                    if let Some(reason) = stop {
                        tracing::debug!("{:?} reached mid-tick, finishing the tick", reason);
                        log_tick_error(signal, tick.await);
                    }

                    emitted += 1;
                    if let Some(reason) = stop {
                        break reason;
                    }
                }
            }
        };

        drop(ticker);
        self.set_state(SchedulerState::Draining);

        let report = RunReport {
            signal,
            emitted,
            elapsed: start.elapsed(),
            interrupted: reason == StopReason::Interrupted,
        };
        if report.interrupted {
            tracing::info!("Generation interrupted after {:?}", report.elapsed);
        }
        println!("{}", report);

        let timeout = signal.shutdown_timeout();
        if let Err(e) = generator.shutdown(timeout).await {
            tracing::warn!("Provider shutdown for {} did not complete: {}", signal, e);
        }

        self.set_state(SchedulerState::Stopped);
        Ok(report)
    }
}

fn log_tick_error(signal: Signal, result: Result<()>) {
    if let Err(e) = result {
        tracing::warn!(category = e.category(), "Failed to emit {}: {}", signal, e);
    }
}

/// Resolves on Ctrl-C; never resolves if the handler cannot be installed.
pub async fn interrupted() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Interrupt received, draining"),
        Err(e) => {
            tracing::warn!("Cannot listen for interrupts: {}", e);
            std::future::pending::<()>().await
        },
    }
}

/// Verbose-mode connectivity checks. Failures are only logged.
pub(crate) async fn run_probes(config: &GenerationConfig, factory: &ExporterFactory, signal: Signal) {
    if !config.verbose {
        return;
    }

    if let Err(e) = probe_tcp(&config.endpoint).await {
        tracing::warn!("Connectivity check failed: {}", e);
    }

    if signal == Signal::Traces {
        if let Err(e) = probe_trace_export(factory).await {
            tracing::warn!("Test export failed: {}", e);
        }
    }
}
