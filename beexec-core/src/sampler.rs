/*!
Background throughput sampling.

The sampler runs on its own named thread. Once per interval it swaps the
shared counter with zero and appends the observed value as one line to its
output. The counter is the only state it shares with the replay thread;
control messages travel over a channel.
*/

use crate::strategy::create_output_file;
use crate::{ReplayError, Result};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// Totals observed by a sampler over its lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SamplerReport {
    /// Lines written, one per completed interval
    pub samples: u64,
    /// Sum of every sampled value
    pub total: u64,
}

enum SamplerSignal {
    /// Stop right after the next natural tick
    Drain,
    /// Stop without sampling again
    Cancel,
}

/// Handle to a running throughput sampler thread
pub struct ThroughputSampler {
    control: Sender<SamplerSignal>,
    handle: Option<JoinHandle<Result<SamplerReport>>>,
    interval: Duration,
}

impl ThroughputSampler {
    /// Start sampling `counter` into a file created (or truncated) at `path`
    pub fn create<P: AsRef<Path>>(
        counter: Arc<AtomicU64>,
        interval: Duration,
        path: P,
    ) -> Result<Self> {
        let file = create_output_file(path.as_ref())?;
        Self::spawn(counter, interval, BufWriter::new(file))
    }

    /// Start sampling `counter` into an arbitrary output stream
    pub fn spawn<W>(counter: Arc<AtomicU64>, interval: Duration, out: W) -> Result<Self>
    where
        W: Write + Send + 'static,
    {
        if interval.is_zero() {
            return Err(ReplayError::configuration(
                "sampling interval must be greater than zero",
            ));
        }

        let (control, signals) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("throughput-sampler".to_string())
            .spawn(move || {
                let result = sample_loop(&counter, interval, out, &signals);
                if let Err(e) = &result {
                    error!(error = %e, "Throughput sampler stopped");
                }
                result
            })?;

        debug!(interval_ms = interval.as_millis() as u64, "Throughput sampler started");
        Ok(Self {
            control,
            handle: Some(handle),
            interval,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Stop after the next natural tick and wait for the thread to exit
    ///
    /// Blocks for at most one sampling interval. Every increment made before
    /// this call is included in the returned report.
    pub fn drain(self) -> Result<SamplerReport> {
        self.request_drain();
        self.join()
    }

    /// Stop immediately without a final sample
    pub fn cancel(self) -> Result<SamplerReport> {
        // a send error means the thread already exited; join reports why
        let _ = self.control.send(SamplerSignal::Cancel);
        self.join()
    }

    /// Ask the sampler to stop after its next natural tick without waiting
    ///
    /// Pair with [`ThroughputSampler::join`] once other resources are closed.
    pub fn request_drain(&self) {
        let _ = self.control.send(SamplerSignal::Drain);
    }

    /// Wait for the sampler thread to exit
    pub fn join(mut self) -> Result<SamplerReport> {
        let handle = self
            .handle
            .take()
            .ok_or_else(|| ReplayError::sampler("sampler already stopped"))?;
        handle
            .join()
            .map_err(|_| ReplayError::sampler("sampler thread panicked"))?
    }
}

fn sample_loop<W: Write>(
    counter: &AtomicU64,
    interval: Duration,
    mut out: W,
    signals: &Receiver<SamplerSignal>,
) -> Result<SamplerReport> {
    let mut report = SamplerReport::default();
    let mut next_tick = Instant::now() + interval;
    let mut draining = false;

    loop {
        let wait = next_tick.saturating_duration_since(Instant::now());
        match signals.recv_timeout(wait) {
            Ok(SamplerSignal::Drain) => draining = true,
            Ok(SamplerSignal::Cancel) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                let observed = counter.swap(0, Ordering::Relaxed);
                out.write_all(format!("{observed}\n").as_bytes())?;
                out.flush()?;
                report.samples += 1;
                report.total += observed;

                if draining {
                    break;
                }

                // missed ticks are dropped rather than replayed in a burst
                let now = Instant::now();
                next_tick += interval;
                if next_tick < now {
                    next_tick = now + interval;
                }
            }
        }
    }

    out.flush()?;
    Ok(report)
}
