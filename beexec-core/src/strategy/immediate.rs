/*!
Strategy writing one frame per command.
*/

use super::{LogSink, PersistStrategy, StrategyStats};
use crate::config::StrategyKind;
use crate::latency::LatencyRecorder;
use crate::{framing, Command, ReplayError, Result};
use bytes::BytesMut;
use std::fs::File;
use std::io::Write;
use std::time::Instant;

/// Append-only log with one synchronous write per command
///
/// The length prefix and payload are staged in a reusable buffer so each
/// frame reaches the sink in a single `write_all`.
pub struct ImmediateLog<W: LogSink = File> {
    out: W,
    frame: BytesMut,
    sync: bool,
    latency: Option<LatencyRecorder>,
    persisted: u64,
    closed: bool,
}

impl<W: LogSink> ImmediateLog<W> {
    /// Wrap `out`, writing the compatibility header immediately
    pub fn new(mut out: W, sync: bool, latency: Option<LatencyRecorder>) -> Result<Self> {
        framing::write_header(&mut out)?;
        if sync {
            out.sync_to_disk()?;
        }

        Ok(Self {
            out,
            frame: BytesMut::new(),
            sync,
            latency,
            persisted: 0,
            closed: false,
        })
    }

    /// Borrow the underlying sink
    pub fn get_ref(&self) -> &W {
        &self.out
    }
}

impl<W: LogSink> PersistStrategy for ImmediateLog<W> {
    fn kind(&self) -> StrategyKind {
        StrategyKind::ImmediateLog
    }

    fn persist(&mut self, command: &Command) -> Result<()> {
        if self.closed {
            return Err(ReplayError::Closed);
        }

        let started = self.latency.as_ref().map(|_| Instant::now());

        self.frame.clear();
        framing::encode_frame(&mut self.frame, command)?;
        self.out.write_all(&self.frame)?;
        if self.sync {
            self.out.sync_to_disk()?;
        }
        self.persisted += 1;

        if let (Some(recorder), Some(started)) = (self.latency.as_mut(), started) {
            recorder.record(started.elapsed())?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let mut result = self.out.flush().map_err(ReplayError::from);
        if result.is_ok() && self.sync {
            result = self.out.sync_to_disk().map_err(ReplayError::from);
        }
        if let Some(recorder) = self.latency.as_mut() {
            let closed = recorder.close();
            result = result.and(closed);
        }
        result
    }

    fn stats(&self) -> StrategyStats {
        StrategyStats {
            persisted: self.persisted,
            flushes: self.persisted,
        }
    }
}
