//! Tracing spans and recording helpers for reductions.
//!
//! Every helper logs through `tracing` and, with the `metrics` feature,
//! updates the matching Prometheus series. Without the feature the metric
//! side compiles away.

use std::time::Duration;

use tracing::{info_span, Span};

use crate::runtime::{MachineId, MachineStats};
use crate::signature::Variant;

/// Span wrapping one machine's dispatch loop.
#[must_use]
pub fn machine_span(machine: MachineId) -> Span {
    info_span!("bisim.machine", machine = %machine, role = machine.role())
}

/// Span wrapping one distributed reduction.
#[must_use]
pub fn reduction_span(variant: Variant, machines: usize, nodes: usize) -> Span {
    info_span!(
        "bisim.reduction",
        variant = %variant,
        machines,
        nodes,
    )
}

/// Span wrapping one sequential reduction.
#[must_use]
pub fn sequential_span(variant: Variant, nodes: usize) -> Span {
    info_span!("bisim.sequential", variant = %variant, nodes)
}

/// Record a machine's counters after its loop exits.
pub fn record_machine_stopped(stats: &MachineStats) {
    tracing::debug!(
        machine = %stats.machine,
        messages = stats.messages_received,
        bytes = stats.payload_bytes,
        "machine stopped"
    );

    #[cfg(feature = "metrics")]
    crate::metrics::record_machine_traffic(
        stats.machine.role(),
        stats.messages_received,
        stats.payload_bytes,
    );
}

/// Record a finished reduction.
pub fn record_reduction_completed(
    variant: Variant,
    rounds: usize,
    blocks: usize,
    elapsed: Duration,
) {
    tracing::info!(
        variant = %variant,
        rounds,
        blocks,
        elapsed_ms = elapsed.as_millis() as u64,
        "reduction finished"
    );

    #[cfg(feature = "metrics")]
    crate::metrics::record_reduction(variant.as_str(), "completed", rounds, elapsed.as_secs_f64());
}

/// Record a finished sequential baseline run.
///
/// Kept apart from [`record_reduction_completed`] so baseline runs in an
/// experiment sweep do not count as distributed reductions.
pub fn record_sequential_completed(
    variant: Variant,
    rounds: usize,
    blocks: usize,
    elapsed: Duration,
) {
    tracing::debug!(
        variant = %variant,
        rounds,
        blocks,
        elapsed_ms = elapsed.as_millis() as u64,
        "sequential reduction finished"
    );

    #[cfg(feature = "metrics")]
    crate::metrics::record_sequential_reduction(variant.as_str());
}

/// Record a reduction torn down by a machine failure.
pub fn record_reduction_failed(variant: Variant, error: &dyn std::error::Error) {
    tracing::error!(variant = %variant, error = %error, "reduction failed");

    #[cfg(feature = "metrics")]
    crate::metrics::record_reduction_failed(variant.as_str());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_names() {
        // spans are disabled without a subscriber and carry no metadata
        let subscriber = tracing_subscriber::fmt().with_max_level(tracing::Level::TRACE).finish();
        tracing::subscriber::with_default(subscriber, || {
            assert_eq!(
                machine_span(MachineId::Worker(2)).metadata().map(|m| m.name()),
                Some("bisim.machine")
            );
            assert_eq!(
                reduction_span(Variant::Exact, 4, 10).metadata().map(|m| m.name()),
                Some("bisim.reduction")
            );
            assert_eq!(
                sequential_span(Variant::Estimate, 10).metadata().map(|m| m.name()),
                Some("bisim.sequential")
            );
        });
    }

    #[test]
    fn test_record_helpers_do_not_panic() {
        record_machine_stopped(&MachineStats {
            machine: MachineId::Coordinator,
            messages_received: 3,
            payload_bytes: 24,
        });
        record_reduction_completed(Variant::Exact, 2, 5, Duration::from_millis(3));
        record_sequential_completed(Variant::Exact, 2, 5, Duration::from_millis(1));
        record_reduction_failed(Variant::Estimate, &crate::error::Error::Incomplete);
    }
}
