//! Configuration for the replay executor
//!
//! A single immutable [`ExecutorConfig`] value carries everything the core needs:
//! the strategy selector, batching and durability switches, sampling interval,
//! output locations and the optional run timeout. It can be built in code with
//! the `with_*` setters or loaded from a JSON file.

use crate::{ReplayError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Persistence strategies selectable at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategyKind {
    /// Record nothing, only the compatibility header
    Discard,
    /// One synchronous write per command
    ImmediateLog,
    /// Forward to an external append-capable log
    DelegatedLog,
    /// Buffer commands and write them in batches
    BatchedLog,
}

impl StrategyKind {
    /// Map a numeric selector (0..=3) to a strategy
    pub fn from_selector(selector: i64) -> Result<Self> {
        match selector {
            0 => Ok(StrategyKind::Discard),
            1 => Ok(StrategyKind::ImmediateLog),
            2 => Ok(StrategyKind::DelegatedLog),
            3 => Ok(StrategyKind::BatchedLog),
            other => Err(ReplayError::configuration(format!(
                "unknown log strategy '{other}' provided"
            ))),
        }
    }

    /// Numeric selector of this strategy
    pub fn selector(self) -> i64 {
        match self {
            StrategyKind::Discard => 0,
            StrategyKind::ImmediateLog => 1,
            StrategyKind::DelegatedLog => 2,
            StrategyKind::BatchedLog => 3,
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StrategyKind::Discard => "discard",
            StrategyKind::ImmediateLog => "immediate",
            StrategyKind::DelegatedLog => "delegated",
            StrategyKind::BatchedLog => "batched",
        };
        f.write_str(name)
    }
}

/// Configuration consumed by [`crate::Executor`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Raw strategy selector, validated at construction
    pub log_strategy: i64,
    /// Commands per flush for the batched and delegated strategies
    pub batch_threshold: usize,
    /// Force written data to stable storage after every write
    pub sync_io: bool,
    /// Emit one latency sample per persisted unit
    pub measure_latency: bool,
    /// Throughput sampling interval in milliseconds
    pub sample_interval_ms: u64,
    /// Directory receiving the throughput output
    pub output_dir: PathBuf,
    /// Directory receiving log files and latency output
    pub log_dir: PathBuf,
    /// Optional second directory the delegated file log alternates with
    pub secondary_log_dir: Option<PathBuf>,
    /// Maximum replay time in milliseconds, excluding trace loading
    pub timeout_ms: Option<u64>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            log_strategy: StrategyKind::DelegatedLog.selector(),
            batch_threshold: 1000,
            sync_io: false,
            measure_latency: false,
            sample_interval_ms: 1000,
            output_dir: PathBuf::from("./"),
            log_dir: PathBuf::from("/tmp/"),
            secondary_log_dir: None,
            timeout_ms: None,
        }
    }
}

impl ExecutorConfig {
    /// Load a configuration from a JSON document
    ///
    /// Missing fields fall back to their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&raw)
    }

    pub fn with_strategy(mut self, kind: StrategyKind) -> Self {
        self.log_strategy = kind.selector();
        self
    }

    pub fn with_selector(mut self, selector: i64) -> Self {
        self.log_strategy = selector;
        self
    }

    pub fn with_batch_threshold(mut self, threshold: usize) -> Self {
        self.batch_threshold = threshold;
        self
    }

    pub fn with_sync(mut self, sync: bool) -> Self {
        self.sync_io = sync;
        self
    }

    pub fn with_latency(mut self, measure: bool) -> Self {
        self.measure_latency = measure;
        self
    }

    pub fn with_sample_interval(mut self, interval: Duration) -> Self {
        self.sample_interval_ms = whole_millis(interval);
        self
    }

    pub fn with_output_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_log_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.log_dir = dir.into();
        self
    }

    pub fn with_secondary_log_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.secondary_log_dir = Some(dir.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(whole_millis(timeout));
        self
    }

    /// Validate the configuration, returning the selected strategy
    pub fn validate(&self) -> Result<StrategyKind> {
        let kind = StrategyKind::from_selector(self.log_strategy)?;

        if self.batch_threshold == 0 {
            return Err(ReplayError::configuration(
                "batch threshold must be greater than zero",
            ));
        }
        if self.sample_interval_ms == 0 {
            return Err(ReplayError::configuration(
                "sampling interval must be greater than zero",
            ));
        }
        if let Some(secondary) = &self.secondary_log_dir {
            if secondary == &self.log_dir {
                return Err(ReplayError::configuration(
                    "secondary log directory must differ from the primary one",
                ));
            }
        }
        Ok(kind)
    }

    /// Selected strategy, or a configuration error for an unknown selector
    pub fn strategy_kind(&self) -> Result<StrategyKind> {
        StrategyKind::from_selector(self.log_strategy)
    }

    /// Commands per persisted unit; the immediate log always persists one
    pub fn effective_threshold(&self) -> usize {
        match StrategyKind::from_selector(self.log_strategy) {
            Ok(StrategyKind::ImmediateLog) => 1,
            _ => self.batch_threshold,
        }
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    /// Run timeout; zero means no timeout
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    pub fn throughput_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("thr-int-{}.out", self.effective_threshold()))
    }

    pub fn log_path(&self) -> PathBuf {
        self.log_dir.join("logfile.log")
    }

    pub fn latency_path(&self) -> PathBuf {
        self.log_dir
            .join(format!("trad-{}-latency.out", self.effective_threshold()))
    }

    pub fn delegated_latency_path(&self) -> PathBuf {
        self.log_dir
            .join(format!("beelog-{}-latency.out", self.effective_threshold()))
    }
}

/// Milliseconds in `duration`, rounding a nonzero sub-millisecond value up to 1
fn whole_millis(duration: Duration) -> u64 {
    let ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
    if ms == 0 && !duration.is_zero() {
        1
    } else {
        ms
    }
}
