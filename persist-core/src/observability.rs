/*!
Observability infrastructure for the Persist system.

- Structured logging setup through `tracing-subscriber`
- Optional Prometheus metrics for save/load traffic (`metrics` feature)
*/

#[cfg(feature = "metrics")]
use prometheus::{Counter, Encoder, Histogram, Registry, TextEncoder};
#[cfg(feature = "metrics")]
use once_cell::sync::OnceCell;
use tracing::subscriber::set_global_default;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry as TracingRegistry};

use crate::{PersistError, Result};

/// Global metrics instance
#[cfg(feature = "metrics")]
static METRICS: OnceCell<PersistMetrics> = OnceCell::new();

/// Metrics collection for persistence operations
#[cfg(feature = "metrics")]
#[derive(Debug)]
pub struct PersistMetrics {
    pub saves_total: Counter,
    pub save_failures_total: Counter,
    pub loads_total: Counter,
    pub load_failures_total: Counter,
    pub lock_wait_seconds: Histogram,
    pub record_size_bytes: Histogram,

    // Prometheus registry for scraping
    registry: Registry,
}

#[cfg(feature = "metrics")]
fn counter(registry: &Registry, name: &str, help: &str) -> Result<Counter> {
    let counter = Counter::new(name, help)
        .map_err(|e| PersistError::storage(format!("Failed to create {name} metric: {e}")))?;
    registry
        .register(Box::new(counter.clone()))
        .map_err(|e| PersistError::storage(format!("Failed to register {name}: {e}")))?;
    Ok(counter)
}

#[cfg(feature = "metrics")]
fn histogram(registry: &Registry, name: &str, help: &str) -> Result<Histogram> {
    let histogram = Histogram::with_opts(prometheus::HistogramOpts::new(name, help))
        .map_err(|e| PersistError::storage(format!("Failed to create {name} metric: {e}")))?;
    registry
        .register(Box::new(histogram.clone()))
        .map_err(|e| PersistError::storage(format!("Failed to register {name}: {e}")))?;
    Ok(histogram)
}

#[cfg(feature = "metrics")]
impl PersistMetrics {
    fn new() -> Result<Self> {
        let registry = Registry::new();

        Ok(Self {
            saves_total: counter(&registry, "persist_saves_total", "State files written successfully")?,
            save_failures_total: counter(&registry, "persist_save_failures_total", "State file writes that failed")?,
            loads_total: counter(&registry, "persist_loads_total", "State files read and decoded successfully")?,
            load_failures_total: counter(&registry, "persist_load_failures_total", "State file loads that failed")?,
            lock_wait_seconds: histogram(
                &registry,
                "persist_lock_wait_seconds",
                "Time spent waiting for the process-wide persistence lock",
            )?,
            record_size_bytes: histogram(&registry, "persist_record_size_bytes", "Size of encoded state files in bytes")?,
            registry,
        })
    }

    /// Get or initialize global metrics instance
    pub fn global() -> &'static PersistMetrics {
        METRICS.get_or_init(|| Self::new().expect("Failed to initialize Persist metrics"))
    }

    pub fn record_save(&self, size_bytes: usize) {
        self.saves_total.inc();
        self.record_size_bytes.observe(size_bytes as f64);
    }

    pub fn record_save_failure(&self) {
        self.save_failures_total.inc();
    }

    pub fn record_load(&self) {
        self.loads_total.inc();
    }

    pub fn record_load_failure(&self) {
        self.load_failures_total.inc();
    }

    pub fn record_lock_wait(&self, waited: std::time::Duration) {
        self.lock_wait_seconds.observe(waited.as_secs_f64());
    }

    /// Gather metrics in Prometheus format
    pub fn gather_metrics(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| PersistError::storage(format!("Failed to encode metrics: {e}")))?;

        String::from_utf8(buffer)
            .map_err(|e| PersistError::storage(format!("Failed to convert metrics to string: {e}")))
    }
}

/// Install the global tracing subscriber.
///
/// The filter comes from `RUST_LOG` when set and otherwise defaults to
/// `persist=info`. With `json` the events are written as JSON lines.
pub fn init_observability(json: bool) -> Result<()> {
    #[cfg(feature = "metrics")]
    PersistMetrics::global();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("persist=info"));

    let result = if json {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(false);
        set_global_default(TracingRegistry::default().with(filter).with(fmt_layer))
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer().compact().with_target(true);
        set_global_default(TracingRegistry::default().with(filter).with(fmt_layer))
    };

    result.map_err(|e| {
        PersistError::validation(format!("Failed to set global tracing subscriber: {e}"))
    })?;

    tracing::info!(target: "persist", "Persist observability initialized");
    Ok(())
}

/// Initialize observability with default settings
pub fn init_default_observability() -> Result<()> {
    init_observability(false)
}
