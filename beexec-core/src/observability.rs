/*!
Observability infrastructure for the replay engine.

Structured logging goes through `tracing`; with the `metrics` feature the
executor also feeds a Prometheus registry that can be rendered in the text
exposition format.
*/

#[cfg(feature = "metrics")]
use prometheus::{Counter, Encoder, Histogram, HistogramOpts, Registry, TextEncoder};
#[cfg(feature = "metrics")]
use std::sync::OnceLock;
#[cfg(feature = "metrics")]
use std::time::Duration;
use tracing::subscriber::set_global_default;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry as TracingRegistry};

use crate::{ReplayError, Result};

/// Global metrics instance, `None` when registration failed
#[cfg(feature = "metrics")]
static METRICS: OnceLock<Option<ReplayMetrics>> = OnceLock::new();

/// Metrics collected while replaying
#[cfg(feature = "metrics")]
#[derive(Debug)]
pub struct ReplayMetrics {
    pub commands_applied_total: Counter,
    pub batch_flushes_total: Counter,
    pub persist_latency_seconds: Histogram,

    registry: Registry,
}

#[cfg(feature = "metrics")]
impl ReplayMetrics {
    fn new() -> Result<Self> {
        let registry = Registry::new();

        let commands_applied_total = Counter::new(
            "beexec_commands_applied_total",
            "Commands persisted and applied by the executor",
        )
        .map_err(|e| metric_error("create commands_applied_total", e))?;

        let batch_flushes_total = Counter::new(
            "beexec_batch_flushes_total",
            "Write operations that reached the log",
        )
        .map_err(|e| metric_error("create batch_flushes_total", e))?;

        let persist_latency_seconds = Histogram::with_opts(HistogramOpts::new(
            "beexec_persist_latency_seconds",
            "Duration of a single persist call in seconds",
        ))
        .map_err(|e| metric_error("create persist_latency_seconds", e))?;

        registry
            .register(Box::new(commands_applied_total.clone()))
            .map_err(|e| metric_error("register commands_applied_total", e))?;
        registry
            .register(Box::new(batch_flushes_total.clone()))
            .map_err(|e| metric_error("register batch_flushes_total", e))?;
        registry
            .register(Box::new(persist_latency_seconds.clone()))
            .map_err(|e| metric_error("register persist_latency_seconds", e))?;

        Ok(Self {
            commands_applied_total,
            batch_flushes_total,
            persist_latency_seconds,
            registry,
        })
    }

    /// Get or initialize the global metrics instance
    pub fn global() -> Option<&'static ReplayMetrics> {
        METRICS
            .get_or_init(|| match Self::new() {
                Ok(metrics) => Some(metrics),
                Err(e) => {
                    tracing::warn!(error = %e, "Metrics disabled");
                    None
                }
            })
            .as_ref()
    }

    pub fn record_command_applied(&self) {
        self.commands_applied_total.inc();
    }

    pub fn record_flushes(&self, flushes: u64) {
        self.batch_flushes_total.inc_by(flushes as f64);
    }

    pub fn record_persist_latency(&self, duration: Duration) {
        self.persist_latency_seconds.observe(duration.as_secs_f64());
    }

    /// Gather metrics in Prometheus text format
    pub fn gather_metrics(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| metric_error("encode metrics", e))?;

        String::from_utf8(buffer).map_err(|e| metric_error("convert metrics to string", e))
    }
}

#[cfg(feature = "metrics")]
fn metric_error(action: &str, e: impl std::fmt::Display) -> ReplayError {
    ReplayError::configuration(format!("Failed to {action}: {e}"))
}

/// Install the global tracing subscriber
///
/// Verbosity follows `RUST_LOG`; without it everything is logged at `info`,
/// or at `debug` when `verbose` is set. With `json` set, events are emitted as
/// one JSON object per line.
pub fn init_observability(json: bool, verbose: bool) -> Result<()> {
    #[cfg(feature = "metrics")]
    ReplayMetrics::global();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level(verbose)));

    let result = if json {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(false)
            .with_current_span(false);
        set_global_default(TracingRegistry::default().with(filter).with(fmt_layer))
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);
        set_global_default(TracingRegistry::default().with(filter).with(fmt_layer))
    };

    result.map_err(|e| {
        ReplayError::configuration(format!("Failed to set global tracing subscriber: {e}"))
    })?;

    tracing::info!("beexec observability initialized");
    Ok(())
}

/// Initialize observability with plain text output at `info`
pub fn init_default_observability() -> Result<()> {
    init_observability(false, false)
}

/// Log level used when `RUST_LOG` is not set
pub fn default_level(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "info"
    }
}
