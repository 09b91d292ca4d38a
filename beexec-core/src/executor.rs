/*!
Replay driver.

The [`Executor`] owns the loaded trace, the selected persistence strategy, the
mock state and the throughput sampler. Each command is persisted, then applied
to the state, then counted; a persistence failure aborts the run before the
command becomes observable.
*/

use crate::command::CommandTrace;
use crate::config::{ExecutorConfig, StrategyKind};
use crate::sampler::{SamplerReport, ThroughputSampler};
use crate::state::MockState;
use crate::strategy::{build_strategy, PersistStrategy, StrategyStats};
use crate::{ReplayError, Result};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

#[cfg(feature = "metrics")]
use crate::observability::ReplayMetrics;

/// Outcome of a call to [`Executor::run`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Commands persisted and applied during this run
    pub applied: u64,
    /// The run stopped early on interrupt or timeout
    pub interrupted: bool,
}

/// Counters collected while shutting down
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    pub strategy: StrategyStats,
    pub throughput: SamplerReport,
}

/// Cloneable flag stopping a run between two commands
#[derive(Debug, Clone, Default)]
pub struct InterruptHandle(Arc<AtomicBool>);

impl InterruptHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the running replay to stop before its next command
    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Replays a command trace through a persistence strategy
pub struct Executor {
    config: ExecutorConfig,
    kind: StrategyKind,
    trace: Option<CommandTrace>,
    state: MockState,
    strategy: Box<dyn PersistStrategy>,
    throughput: Arc<AtomicU64>,
    sampler: Option<ThroughputSampler>,
    interrupt: InterruptHandle,
    closed: bool,
}

impl Executor {
    /// Build an executor with the strategy selected by `config`
    ///
    /// The configuration is validated before any file is created. On success
    /// the log (and latency) outputs are open and the throughput sampler is
    /// running.
    pub fn new(config: ExecutorConfig) -> Result<Self> {
        let strategy = build_strategy(&config)?;
        Self::with_strategy(config, strategy)
    }

    /// Build an executor around a caller-supplied strategy
    pub fn with_strategy(
        config: ExecutorConfig,
        mut strategy: Box<dyn PersistStrategy>,
    ) -> Result<Self> {
        config.validate()?;
        let kind = strategy.kind();

        let throughput = Arc::new(AtomicU64::new(0));
        let sampler = match ThroughputSampler::create(
            throughput.clone(),
            config.sample_interval(),
            config.throughput_path(),
        ) {
            Ok(sampler) => sampler,
            Err(e) => {
                if let Err(close_err) = strategy.close() {
                    warn!(error = %close_err, "Failed to close strategy after sampler startup error");
                }
                return Err(e);
            }
        };

        info!(
            strategy = %kind,
            throughput = %config.throughput_path().display(),
            interval_ms = config.sample_interval_ms,
            "Executor ready"
        );

        Ok(Self {
            config,
            kind,
            trace: None,
            state: MockState::new(),
            strategy,
            throughput,
            sampler: Some(sampler),
            interrupt: InterruptHandle::new(),
            closed: false,
        })
    }

    /// Load the trace to replay from a previously produced log file
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let trace = CommandTrace::load(path)?;
        info!(path = %path.display(), commands = trace.len(), "Loaded command log");
        self.load_trace(trace);
        Ok(())
    }

    pub fn load_trace(&mut self, trace: CommandTrace) {
        self.trace = Some(trace);
    }

    /// Replay the loaded trace in order
    ///
    /// Stops at the first persistence error and returns it unchanged; the
    /// failing command is neither applied nor counted. Interrupts and the
    /// configured timeout are honoured between commands only.
    pub fn run(&mut self) -> Result<RunSummary> {
        if self.closed {
            return Err(ReplayError::Closed);
        }
        let trace = self.trace.as_ref().ok_or(ReplayError::NotLoaded)?;

        let deadline = self.config.timeout().map(|timeout| Instant::now() + timeout);
        let mut summary = RunSummary::default();
        info!(strategy = %self.kind, commands = trace.len(), "Replay started");

        for (index, command) in trace.iter().enumerate() {
            if self.interrupt.is_triggered() {
                warn!(applied = summary.applied, "Replay interrupted");
                summary.interrupted = true;
                break;
            }
            if deadline.map_or(false, |deadline| Instant::now() >= deadline) {
                warn!(applied = summary.applied, "Replay timed out");
                summary.interrupted = true;
                break;
            }

            #[cfg(feature = "metrics")]
            let started = Instant::now();

            if let Err(e) = self.strategy.persist(command) {
                error!(index, key = %command.key, error = %e, "Failed to persist command");
                return Err(e);
            }

            #[cfg(feature = "metrics")]
            if let Some(metrics) = ReplayMetrics::global() {
                metrics.record_persist_latency(started.elapsed());
                metrics.record_command_applied();
            }

            self.state.apply(command);
            self.throughput.fetch_add(1, Ordering::Relaxed);
            summary.applied += 1;
        }

        if !summary.interrupted {
            info!(applied = summary.applied, "Replay finished");
        }
        Ok(summary)
    }

    /// Flush and close every owned resource
    ///
    /// Waits for the sampler's next tick so every applied command is sampled,
    /// closes the strategy, then closes the throughput output. The first error
    /// is returned after all resources had the chance to close. Further calls
    /// return an empty report.
    pub fn shutdown(&mut self) -> Result<ShutdownReport> {
        if self.closed {
            return Ok(ShutdownReport::default());
        }
        self.closed = true;

        if let Some(sampler) = &self.sampler {
            sampler.request_drain();
        }

        let closed = self.strategy.close();
        let stats = self.strategy.stats();
        debug!(persisted = stats.persisted, flushes = stats.flushes, "Strategy closed");

        #[cfg(feature = "metrics")]
        if let Some(metrics) = ReplayMetrics::global() {
            metrics.record_flushes(stats.flushes);
        }

        let sampled = match self.sampler.take() {
            Some(sampler) => sampler.join(),
            None => Ok(SamplerReport::default()),
        };

        match (closed, sampled) {
            (Ok(()), Ok(throughput)) => {
                info!(
                    persisted = stats.persisted,
                    sampled = throughput.total,
                    "Executor shut down"
                );
                Ok(ShutdownReport {
                    strategy: stats,
                    throughput,
                })
            }
            (Err(e), Ok(_)) | (Ok(()), Err(e)) => Err(e),
            (Err(e), Err(sampler_err)) => {
                warn!(error = %sampler_err, "Throughput sampler also failed");
                Err(e)
            }
        }
    }

    pub fn state(&self) -> &MockState {
        &self.state
    }

    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.interrupt.clone()
    }

    pub fn strategy_kind(&self) -> StrategyKind {
        self.kind
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn trace(&self) -> Option<&CommandTrace> {
        self.trace.as_ref()
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        warn!("Executor dropped without shutdown, closing resources");

        if let Some(sampler) = self.sampler.take() {
            if let Err(e) = sampler.cancel() {
                warn!(error = %e, "Throughput sampler failed");
            }
        }
        if let Err(e) = self.strategy.close() {
            warn!(error = %e, "Failed to close strategy");
        }
    }
}
