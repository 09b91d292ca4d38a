/*!
Strategy buffering frames and writing them in batches.
*/

use super::{LogSink, PersistStrategy, StrategyStats};
use crate::config::StrategyKind;
use crate::latency::LatencyRecorder;
use crate::{framing, Command, ReplayError, Result};
use bytes::BytesMut;
use std::fs::File;
use std::io::Write;
use std::time::Instant;
use tracing::{debug, warn};

/// Log that accumulates framed commands and writes them once `threshold`
/// commands are pending
///
/// A partial batch is written on [`PersistStrategy::close`], so no suffix of
/// the trace is lost at shutdown. When latency is measured, the timer starts
/// at the first command of a batch and one sample is emitted per flush.
pub struct BatchedLog<W: LogSink = File> {
    out: W,
    buffer: BytesMut,
    pending: usize,
    threshold: usize,
    sync: bool,
    batch_started: Option<Instant>,
    latency: Option<LatencyRecorder>,
    persisted: u64,
    flushes: u64,
    closed: bool,
}

impl<W: LogSink> BatchedLog<W> {
    /// Wrap `out`, writing the compatibility header immediately
    ///
    /// # Errors
    /// * `ReplayError::Configuration` - If `threshold` is zero
    /// * `ReplayError::Io` - If the header cannot be written
    pub fn new(
        mut out: W,
        threshold: usize,
        sync: bool,
        latency: Option<LatencyRecorder>,
    ) -> Result<Self> {
        if threshold == 0 {
            return Err(ReplayError::configuration(
                "batch threshold must be greater than zero",
            ));
        }

        framing::write_header(&mut out)?;
        if sync {
            out.sync_to_disk()?;
        }

        Ok(Self {
            out,
            buffer: BytesMut::new(),
            pending: 0,
            threshold,
            sync,
            batch_started: None,
            latency,
            persisted: 0,
            flushes: 0,
            closed: false,
        })
    }

    /// Commands buffered but not yet written
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Borrow the underlying sink
    pub fn get_ref(&self) -> &W {
        &self.out
    }

    fn flush_batch(&mut self) -> Result<()> {
        if self.pending == 0 {
            return Ok(());
        }

        let commands = self.pending;
        let bytes = self.buffer.len();

        // a batch that failed to reach the sink is not retried
        self.pending = 0;
        let written = self.out.write_all(&self.buffer);
        self.buffer.clear();
        written?;

        if self.sync {
            self.out.sync_to_disk()?;
        }
        self.flushes += 1;

        if let Some(recorder) = self.latency.as_mut() {
            if let Some(started) = self.batch_started.take() {
                recorder.record(started.elapsed())?;
            }
        }

        debug!(commands, bytes, flushes = self.flushes, "Flushed command batch");
        Ok(())
    }
}

impl<W: LogSink> PersistStrategy for BatchedLog<W> {
    fn kind(&self) -> StrategyKind {
        StrategyKind::BatchedLog
    }

    fn persist(&mut self, command: &Command) -> Result<()> {
        if self.closed {
            return Err(ReplayError::Closed);
        }

        framing::encode_frame(&mut self.buffer, command)?;
        if self.latency.is_some() && self.batch_started.is_none() {
            self.batch_started = Some(Instant::now());
        }
        self.pending += 1;
        self.persisted += 1;

        if self.pending >= self.threshold {
            self.flush_batch()?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if self.pending > 0 {
            debug!(pending = self.pending, "Flushing partial batch on close");
        }
        let mut result = self.flush_batch();
        if let Err(e) = &result {
            warn!(error = %e, "Failed to flush pending batch on close");
        }

        let flushed = self.out.flush().map_err(ReplayError::from);
        result = result.and(flushed);
        if let Some(recorder) = self.latency.as_mut() {
            let closed = recorder.close();
            result = result.and(closed);
        }
        result
    }

    fn stats(&self) -> StrategyStats {
        StrategyStats {
            persisted: self.persisted,
            flushes: self.flushes,
        }
    }
}
