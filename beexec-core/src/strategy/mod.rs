/*!
Persistence strategies for replayed commands.

This module defines the persistence abstraction (port) and its variants
(adapters). The executor picks one variant at construction through
[`build_strategy`] and afterwards only talks to the [`PersistStrategy`] trait.
*/

pub mod batched;
pub mod delegated;
pub mod discard;
pub mod immediate;
pub mod interval_log;

use crate::config::{ExecutorConfig, StrategyKind};
use crate::latency::LatencyRecorder;
use crate::{Command, ReplayError, Result};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use tracing::info;

pub use batched::BatchedLog;
pub use delegated::{AppendLog, DelegatedLog};
pub use discard::DiscardLog;
pub use immediate::ImmediateLog;
pub use interval_log::IntervalFileLog;

/// Counters reported by a strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StrategyStats {
    /// Commands accepted by `persist`
    pub persisted: u64,
    /// Write operations that reached the log (one per command for the
    /// immediate log, one per batch for the batched log)
    pub flushes: u64,
}

/// Persistence abstraction shared by every strategy
///
/// `persist` runs to completion before the executor applies the command, so a
/// strategy never observes two commands concurrently.
pub trait PersistStrategy: Send {
    /// Strategy variant, fixed for the lifetime of the instance
    fn kind(&self) -> StrategyKind;

    /// Durably record (or deliberately drop) one command
    fn persist(&mut self, command: &Command) -> Result<()>;

    /// Flush anything pending and release owned resources
    ///
    /// Calling `close` more than once is a no-op.
    fn close(&mut self) -> Result<()>;

    /// Counters accumulated so far
    fn stats(&self) -> StrategyStats;
}

/// Output stream a file-backed strategy writes frames to
pub trait LogSink: Write + Send {
    /// Force written data to stable storage
    fn sync_to_disk(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl LogSink for File {
    fn sync_to_disk(&mut self) -> std::io::Result<()> {
        self.sync_data()
    }
}

impl LogSink for Vec<u8> {}

/// Build the strategy selected by `config`
///
/// Opens the log file (and latency output when enabled) and writes the
/// compatibility header before returning.
pub fn build_strategy(config: &ExecutorConfig) -> Result<Box<dyn PersistStrategy>> {
    let kind = config.validate()?;

    let strategy: Box<dyn PersistStrategy> = match kind {
        StrategyKind::Discard => Box::new(DiscardLog::create(config.log_path())?),
        StrategyKind::ImmediateLog => {
            let file = create_output_file(&config.log_path())?;
            let latency = open_latency(config, &config.latency_path())?;
            Box::new(ImmediateLog::new(file, config.sync_io, latency)?)
        }
        StrategyKind::BatchedLog => {
            let file = create_output_file(&config.log_path())?;
            let latency = open_latency(config, &config.latency_path())?;
            Box::new(BatchedLog::new(
                file,
                config.batch_threshold,
                config.sync_io,
                latency,
            )?)
        }
        StrategyKind::DelegatedLog => {
            let log = IntervalFileLog::from_config(config)?;
            Box::new(DelegatedLog::new(Box::new(log)))
        }
    };

    info!(
        strategy = %kind,
        log_dir = %config.log_dir.display(),
        threshold = config.effective_threshold(),
        sync = config.sync_io,
        latency = config.measure_latency,
        "Persistence strategy ready"
    );
    Ok(strategy)
}

fn open_latency(config: &ExecutorConfig, path: &Path) -> Result<Option<LatencyRecorder>> {
    if !config.measure_latency {
        return Ok(None);
    }
    Ok(Some(LatencyRecorder::create(path)?))
}

/// Create (or truncate) a write-only output file, creating parent directories
pub(crate) fn create_output_file(path: &Path) -> Result<File> {
    ensure_parent_dir(path)?;
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;
    Ok(file)
}

/// Ensure the parent directory exists, creating it if necessary
pub(crate) fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| {
                ReplayError::Io(std::io::Error::new(
                    e.kind(),
                    format!("Failed to create directory {}: {e}", parent.display()),
                ))
            })?;
        }
    }
    Ok(())
}
