/*!
Per-unit latency output.

A recorder only exists when latency measurement is enabled; strategies hold an
`Option<LatencyRecorder>` and skip timestamping entirely when it is `None`.
*/

use crate::strategy::create_output_file;
use crate::Result;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

/// Writes one integer duration in nanoseconds per line
///
/// Each sample is written as soon as it is recorded; nothing is kept in memory
/// beyond the sample being formatted.
pub struct LatencyRecorder {
    out: Box<dyn Write + Send>,
    samples: u64,
    closed: bool,
}

impl LatencyRecorder {
    /// Create (or truncate) the latency output at `path`
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = create_output_file(path.as_ref())?;
        Ok(Self::new(file))
    }

    /// Wrap an arbitrary output stream
    pub fn new<W: Write + Send + 'static>(out: W) -> Self {
        Self {
            out: Box::new(out),
            samples: 0,
            closed: false,
        }
    }

    /// Append one sample
    pub fn record(&mut self, elapsed: Duration) -> Result<()> {
        let line = format!("{}\n", elapsed.as_nanos());
        self.out.write_all(line.as_bytes())?;
        self.samples += 1;
        Ok(())
    }

    /// Number of samples written so far
    pub fn samples(&self) -> u64 {
        self.samples
    }

    /// Flush the output; later calls are no-ops
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.out.flush()?;
        Ok(())
    }
}

impl std::fmt::Debug for LatencyRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LatencyRecorder")
            .field("samples", &self.samples)
            .field("closed", &self.closed)
            .finish()
    }
}
