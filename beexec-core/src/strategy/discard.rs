/*!
Strategy that persists nothing.
*/

use super::{create_output_file, PersistStrategy, StrategyStats};
use crate::config::StrategyKind;
use crate::{framing, Command, Result};
use std::path::Path;

/// Baseline strategy: every command succeeds without I/O
///
/// The output file still receives the compatibility header so that the shared
/// log reader can parse it like any other strategy's output.
#[derive(Debug, Default)]
pub struct DiscardLog {
    persisted: u64,
}

impl DiscardLog {
    /// Write a header-only log at `path`
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = create_output_file(path.as_ref())?;
        framing::write_header(&mut file)?;
        Ok(Self::default())
    }
}

impl PersistStrategy for DiscardLog {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Discard
    }

    fn persist(&mut self, _command: &Command) -> Result<()> {
        self.persisted += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    fn stats(&self) -> StrategyStats {
        StrategyStats {
            persisted: self.persisted,
            flushes: 0,
        }
    }
}
