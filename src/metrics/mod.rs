//! Prometheus metrics for the newsdrift crawler
//!
//! This module tracks:
//! - Fetcher: attempts, retries, terminal outcomes
//! - Pipeline: records built per detail status, skipped listing rows,
//!   unavailable listings, run duration
//!
//! # Usage
//!
//! Call `init_metrics()` at application startup to register all metrics.
//! Before that (or if registration fails) every recording function is a
//! no-op, so the library can be used without a metrics registry.

use prometheus::{
    register_counter, register_counter_vec, register_histogram_vec, Counter, CounterVec, Encoder,
    HistogramVec, TextEncoder,
};
use std::sync::OnceLock;

// ============================================================================
// Metrics Storage
// ============================================================================

struct FetchMetrics {
    attempts: Counter,
    retries: Counter,
    outcomes: CounterVec,
}

struct PipelineMetrics {
    run_duration: HistogramVec,
    records_built: CounterVec,
    items_skipped: CounterVec,
    listing_unavailable: CounterVec,
}

static FETCH_METRICS: OnceLock<FetchMetrics> = OnceLock::new();

static PIPELINE_METRICS: OnceLock<PipelineMetrics> = OnceLock::new();

/// Outcome of the one registration attempt, shared by every caller
static METRICS_INIT: OnceLock<Result<(), String>> = OnceLock::new();

// ============================================================================
// Initialization
// ============================================================================

/// Register all newsdrift metrics with the default Prometheus registry
///
/// Registration runs once per process. Concurrent and later callers wait for
/// that attempt and get its result.
///
/// # Example
///
/// ```ignore
/// if let Err(e) = newsdrift::metrics::init_metrics() {
///     eprintln!("Warning: Metrics initialization failed: {}", e);
/// }
/// ```
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    METRICS_INIT
        .get_or_init(|| register_metrics().map_err(|e| e.to_string()))
        .clone()
        .map_err(Into::into)
}

fn register_metrics() -> Result<(), Box<dyn std::error::Error>> {
    let fetch = FetchMetrics {
        attempts: register_counter!(
            "newsdrift_fetch_attempts_total",
            "Total HTTP attempts made by the fetcher"
        )?,
        retries: register_counter!(
            "newsdrift_fetch_retries_total",
            "Total retries scheduled after a failed attempt"
        )?,
        outcomes: register_counter_vec!(
            "newsdrift_fetch_outcomes_total",
            "Terminal fetch outcomes by status and error code",
            &["status", "code"]
        )?,
    };

    let pipeline = PipelineMetrics {
        run_duration: register_histogram_vec!(
            "newsdrift_run_duration_seconds",
            "Wall time of one crawl run in seconds",
            &["category"],
            vec![0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0]
        )?,
        records_built: register_counter_vec!(
            "newsdrift_records_built_total",
            "Records built per category and detail status",
            &["category", "detail_status"]
        )?,
        items_skipped: register_counter_vec!(
            "newsdrift_items_skipped_total",
            "Listing rows rejected by validation",
            &["category", "reason"]
        )?,
        listing_unavailable: register_counter_vec!(
            "newsdrift_listing_unavailable_total",
            "Runs that ended without a usable listing page",
            &["code"]
        )?,
    };

    FETCH_METRICS
        .set(fetch)
        .map_err(|_| "Fetch metrics already initialized")?;
    PIPELINE_METRICS
        .set(pipeline)
        .map_err(|_| "Pipeline metrics already initialized")?;

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

/// Check if metrics have been initialized
pub fn metrics_initialized() -> bool {
    FETCH_METRICS.get().is_some() && PIPELINE_METRICS.get().is_some()
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Record one HTTP attempt
pub fn record_fetch_attempt() {
    if let Some(m) = FETCH_METRICS.get() {
        m.attempts.inc();
    }
}

/// Record one scheduled retry
pub fn record_fetch_retry() {
    if let Some(m) = FETCH_METRICS.get() {
        m.retries.inc();
    }
}

/// Record the terminal outcome of a fetch; `code` is empty on success
pub fn record_fetch_outcome(success: bool, code: &str) {
    if let Some(m) = FETCH_METRICS.get() {
        let status = if success { "success" } else { "failed" };
        m.outcomes.with_label_values(&[status, code]).inc();
    }
}

/// Record records built in a run, by detail status
pub fn record_records_built(category: &str, detail_status: &str, count: u64) {
    if count == 0 {
        return;
    }
    if let Some(m) = PIPELINE_METRICS.get() {
        m.records_built
            .with_label_values(&[category, detail_status])
            .inc_by(count as f64);
    }
}

/// Record one rejected listing row
pub fn record_item_skipped(category: &str, reason: &str) {
    if let Some(m) = PIPELINE_METRICS.get() {
        m.items_skipped.with_label_values(&[category, reason]).inc();
    }
}

/// Record a run ending in the listing-unavailable state
pub fn record_listing_unavailable(code: &str) {
    if let Some(m) = PIPELINE_METRICS.get() {
        m.listing_unavailable.with_label_values(&[code]).inc();
    }
}

/// Histogram timer guard that records duration on drop
pub struct MetricsTimer {
    timer: Option<prometheus::HistogramTimer>,
}

impl MetricsTimer {
    fn new(timer: prometheus::HistogramTimer) -> Self {
        Self { timer: Some(timer) }
    }

    /// Create a no-op timer when metrics are not initialized
    fn noop() -> Self {
        Self { timer: None }
    }
}

impl Drop for MetricsTimer {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.stop_and_record();
        }
    }
}

/// Start a run timer for `category`
pub fn start_run_timer(category: &str) -> MetricsTimer {
    match PIPELINE_METRICS.get() {
        Some(m) => MetricsTimer::new(m.run_duration.with_label_values(&[category]).start_timer()),
        None => MetricsTimer::noop(),
    }
}

// ============================================================================
// Tests
// ============================================================================
