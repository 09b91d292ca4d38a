/*!
Strategy forwarding commands to an external append-capable log.
*/

use super::{PersistStrategy, StrategyStats};
use crate::config::StrategyKind;
use crate::{Command, ReplayError, Result};

/// External log component receiving forwarded commands
///
/// Its internal algorithm (compaction, segmenting, ...) is opaque to the
/// executor. Errors are propagated unchanged.
#[cfg_attr(test, mockall::automock)]
pub trait AppendLog: Send {
    /// Hand one command to the log
    fn append(&mut self, command: &Command) -> Result<()>;

    /// Persist whatever the log still holds and release its resources
    fn shutdown(&mut self) -> Result<()>;
}

/// Strategy delegating persistence to an [`AppendLog`]
pub struct DelegatedLog {
    log: Box<dyn AppendLog>,
    persisted: u64,
    closed: bool,
}

impl DelegatedLog {
    pub fn new(log: Box<dyn AppendLog>) -> Self {
        Self {
            log,
            persisted: 0,
            closed: false,
        }
    }
}

impl PersistStrategy for DelegatedLog {
    fn kind(&self) -> StrategyKind {
        StrategyKind::DelegatedLog
    }

    fn persist(&mut self, command: &Command) -> Result<()> {
        if self.closed {
            return Err(ReplayError::Closed);
        }
        self.log.append(command)?;
        self.persisted += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.log.shutdown()
    }

    fn stats(&self) -> StrategyStats {
        StrategyStats {
            persisted: self.persisted,
            flushes: 0,
        }
    }
}
