/*!
# beexec Core Engine

Replay engine measuring the cost of logging strategies for a replicated
key-value store.

A recorded command log is loaded into memory and replayed in order. Every
command is first handed to a persistence strategy and, once persisted, applied
to an in-memory mock state. A background sampler reports throughput once per
interval.

## Architecture

- Persistence strategies are adapters behind the [`PersistStrategy`] port,
  picked once from configuration
- All produced logs share one framed on-disk format ([`framing`]), readable
  again as a [`CommandTrace`] or through the [`verify`] module
- The replay thread and the sampler share nothing but an atomic counter

## Usage

```rust,no_run
use beexec_core::{Executor, ExecutorConfig, StrategyKind};

let config = ExecutorConfig::default()
    .with_strategy(StrategyKind::BatchedLog)
    .with_batch_threshold(1000)
    .with_log_dir("/tmp/logs");

let mut executor = Executor::new(config)?;
executor.load("/path/to/recorded.log")?;
let summary = executor.run()?;
let report = executor.shutdown()?;
println!("applied {} commands in {} flushes", summary.applied, report.strategy.flushes);
# Ok::<(), beexec_core::ReplayError>(())
```
*/

pub mod command;
pub mod config;
pub mod error;
pub mod executor;
pub mod framing;
pub mod latency;
pub mod observability;
pub mod sampler;
pub mod state;
pub mod strategy;
pub mod verify;


pub use command::{Command, CommandTrace, Operation};
pub use config::{ExecutorConfig, StrategyKind};
pub use error::{ReplayError, Result};
pub use executor::{Executor, InterruptHandle, RunSummary, ShutdownReport};
pub use latency::LatencyRecorder;
pub use sampler::{SamplerReport, ThroughputSampler};
pub use state::MockState;
pub use strategy::{
    build_strategy, AppendLog, BatchedLog, DelegatedLog, DiscardLog, ImmediateLog,
    IntervalFileLog, LogSink, PersistStrategy, StrategyStats,
};
pub use verify::{verify_dir, LogFamilyReport, LogVerifier};
