/*!
Default file-backed collaborator for the delegated strategy.

Commands are grouped into fixed-size intervals; each interval is written as
its own segment file whose header counters hold the first and last command
index of the segment. With a secondary directory configured, consecutive
segments alternate between the two directories.
*/

use super::{create_output_file, AppendLog};
use crate::config::ExecutorConfig;
use crate::framing::{self, LogHeader};
use crate::latency::LatencyRecorder;
use crate::{Command, ReplayError, Result};
use bytes::BytesMut;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::debug;

/// Segmenting append log writing `beelog.<first>.<last>.log` files
pub struct IntervalFileLog {
    dirs: Vec<PathBuf>,
    period: usize,
    sync: bool,
    latency: Option<LatencyRecorder>,
    buffer: BytesMut,
    pending: usize,
    next_index: u64,
    segments: u64,
    interval_started: Option<Instant>,
    closed: bool,
}

impl IntervalFileLog {
    /// Create a log writing segments of `period` commands into `dir`
    pub fn new<P: Into<PathBuf>>(dir: P, period: usize) -> Result<Self> {
        if period == 0 {
            return Err(ReplayError::configuration(
                "log period must be greater than zero",
            ));
        }

        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        Ok(Self {
            dirs: vec![dir],
            period,
            sync: false,
            latency: None,
            buffer: BytesMut::new(),
            pending: 0,
            next_index: 0,
            segments: 0,
            interval_started: None,
            closed: false,
        })
    }

    /// Build the log described by an executor configuration
    pub fn from_config(config: &ExecutorConfig) -> Result<Self> {
        let mut log = Self::new(&config.log_dir, config.batch_threshold)?.with_sync(config.sync_io);

        if let Some(secondary) = &config.secondary_log_dir {
            log = log.with_secondary_dir(secondary)?;
        }
        if config.measure_latency {
            log = log.with_latency(LatencyRecorder::create(config.delegated_latency_path())?);
        }
        Ok(log)
    }

    /// Alternate segments with a second directory
    pub fn with_secondary_dir<P: AsRef<Path>>(mut self, dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        self.dirs.push(dir);
        Ok(self)
    }

    pub fn with_sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }

    pub fn with_latency(mut self, recorder: LatencyRecorder) -> Self {
        self.latency = Some(recorder);
        self
    }

    /// Segment files written so far
    pub fn segments(&self) -> u64 {
        self.segments
    }

    /// Name of the segment holding commands `first..=last`
    pub fn segment_name(first: u64, last: u64) -> String {
        format!("beelog.{first}.{last}.log")
    }

    fn write_segment(&mut self) -> Result<()> {
        if self.pending == 0 {
            return Ok(());
        }

        let last = self.next_index - 1;
        let first = self.next_index - self.pending as u64;
        let dir = &self.dirs[(self.segments as usize) % self.dirs.len()];
        let path = dir.join(Self::segment_name(first, last));

        let mut file = create_output_file(&path)?;
        framing::write_header_with(&mut file, LogHeader { first, last })?;
        file.write_all(&self.buffer)?;
        if self.sync {
            file.sync_data()?;
        }

        self.buffer.clear();
        self.pending = 0;
        self.segments += 1;

        if let Some(recorder) = self.latency.as_mut() {
            if let Some(started) = self.interval_started.take() {
                recorder.record(started.elapsed())?;
            }
        }

        debug!(path = %path.display(), first, last, "Wrote log segment");
        Ok(())
    }
}

impl AppendLog for IntervalFileLog {
    fn append(&mut self, command: &Command) -> Result<()> {
        if self.closed {
            return Err(ReplayError::Closed);
        }

        framing::encode_frame(&mut self.buffer, command)?;
        if self.latency.is_some() && self.interval_started.is_none() {
            self.interval_started = Some(Instant::now());
        }
        self.pending += 1;
        self.next_index += 1;

        if self.pending >= self.period {
            self.write_segment()?;
        }
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let mut result = self.write_segment();
        if let Some(recorder) = self.latency.as_mut() {
            let closed = recorder.close();
            result = result.and(closed);
        }
        result
    }
}
