//! Prometheus metrics for partition computations.
//!
//! Compiled only with the `metrics` feature.
//!
//! # Metrics
//!
//! ## Counters
//! - `bisim_messages_received_total` - Messages dispatched, by machine role
//! - `bisim_payload_bytes_total` - Simulated bytes received, by machine role
//! - `bisim_reductions_total` - Distributed reductions finished, by variant and outcome
//! - `bisim_sequential_reductions_total` - Sequential baseline runs, by variant
//!
//! ## Histograms
//! - `bisim_refinement_rounds` - Rounds per completed reduction
//! - `bisim_reduction_duration_seconds` - Wall time per completed reduction
#![cfg(feature = "metrics")]

use prometheus::{exponential_buckets, linear_buckets, CounterVec, HistogramOpts, HistogramVec, Opts, Registry};
use std::sync::LazyLock;

/// Global Prometheus registry for bisim metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

/// Labels: `role` (coordinator, worker).
pub static MESSAGES_RECEIVED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        "bisim_messages_received_total",
        "Messages dispatched by simulated machines",
    );
    CounterVec::new(opts, &["role"]).expect("bisim_messages_received_total metric creation failed")
});

/// Labels: `role` (coordinator, worker).
pub static PAYLOAD_BYTES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        "bisim_payload_bytes_total",
        "Simulated payload bytes received by machines",
    );
    CounterVec::new(opts, &["role"]).expect("bisim_payload_bytes_total metric creation failed")
});

/// Labels: `variant` (exact, estimate), `outcome` (completed, failed).
pub static REDUCTIONS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new("bisim_reductions_total", "Distributed reductions finished");
    CounterVec::new(opts, &["variant", "outcome"])
        .expect("bisim_reductions_total metric creation failed")
});

/// Labels: `variant`.
pub static SEQUENTIAL_REDUCTIONS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        "bisim_sequential_reductions_total",
        "Sequential baseline reductions finished",
    );
    CounterVec::new(opts, &["variant"])
        .expect("bisim_sequential_reductions_total metric creation failed")
});

/// Labels: `variant`.
pub static REFINEMENT_ROUNDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let buckets = linear_buckets(0.0, 1.0, 16).expect("bucket creation failed");
    let opts = HistogramOpts::new(
        "bisim_refinement_rounds",
        "Refinement rounds per completed reduction",
    )
    .buckets(buckets);
    HistogramVec::new(opts, &["variant"]).expect("bisim_refinement_rounds metric creation failed")
});

/// Labels: `variant`.
pub static REDUCTION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let buckets = exponential_buckets(0.0005, 2.0, 16).expect("bucket creation failed");
    let opts = HistogramOpts::new(
        "bisim_reduction_duration_seconds",
        "Wall time of completed reductions in seconds",
    )
    .buckets(buckets);
    HistogramVec::new(opts, &["variant"])
        .expect("bisim_reduction_duration_seconds metric creation failed")
});

/// Register all metrics with [`REGISTRY`]. Idempotent.
pub fn init_metrics() -> anyhow::Result<()> {
    let registry = &*REGISTRY;

    for metric in [
        Box::new(MESSAGES_RECEIVED_TOTAL.clone()) as Box<dyn prometheus::core::Collector>,
        Box::new(PAYLOAD_BYTES_TOTAL.clone()),
        Box::new(REDUCTIONS_TOTAL.clone()),
        Box::new(SEQUENTIAL_REDUCTIONS_TOTAL.clone()),
        Box::new(REFINEMENT_ROUNDS.clone()),
        Box::new(REDUCTION_DURATION_SECONDS.clone()),
    ] {
        if let Err(e) = registry.register(metric) {
            if !matches!(e, prometheus::Error::AlreadyReg) {
                return Err(e.into());
            }
        }
    }

    Ok(())
}

pub fn record_machine_traffic(role: &str, messages: u64, bytes: u64) {
    MESSAGES_RECEIVED_TOTAL
        .with_label_values(&[role])
        .inc_by(messages as f64);
    PAYLOAD_BYTES_TOTAL
        .with_label_values(&[role])
        .inc_by(bytes as f64);
}

pub fn record_reduction(variant: &str, outcome: &str, rounds: usize, duration_secs: f64) {
    REDUCTIONS_TOTAL.with_label_values(&[variant, outcome]).inc();
    REFINEMENT_ROUNDS
        .with_label_values(&[variant])
        .observe(rounds as f64);
    REDUCTION_DURATION_SECONDS
        .with_label_values(&[variant])
        .observe(duration_secs);
}

pub fn record_reduction_failed(variant: &str) {
    REDUCTIONS_TOTAL.with_label_values(&[variant, "failed"]).inc();
}

pub fn record_sequential_reduction(variant: &str) {
    SEQUENTIAL_REDUCTIONS_TOTAL.with_label_values(&[variant]).inc();
}

/// Gather all registered metrics in Prometheus text format.
pub fn gather_metrics() -> anyhow::Result<String> {
    let encoder = prometheus::TextEncoder::new();
    let metric_families = REGISTRY.gather();
    encoder
        .encode_to_string(&metric_families)
        .map_err(Into::into)
}
