//! Metric descriptions and recording helpers for the indexer

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::time::Duration;

pub const CYCLES_TOTAL: &str = "rpc_indexer_cycles_total";
pub const CYCLE_FAILURES_TOTAL: &str = "rpc_indexer_cycle_failures_total";
pub const CYCLE_DURATION_SECONDS: &str = "rpc_indexer_cycle_duration_seconds";
pub const PROBES_TOTAL: &str = "rpc_indexer_probes_total";
pub const PROBE_LATENCY_SECONDS: &str = "rpc_indexer_probe_latency_seconds";
pub const RESOLUTIONS_TOTAL: &str = "rpc_indexer_resolutions_total";
pub const TOOL_INVOCATIONS_TOTAL: &str = "rpc_indexer_tool_invocations_total";
pub const ELECTED_VALIDATORS: &str = "rpc_indexer_elected_validators";

/// Outcome label for a single validator measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Reachable,
    Unreachable,
    /// No endpoint was available, no request was sent
    Skipped,
}

impl ProbeOutcome {
    pub fn as_label(&self) -> &'static str {
        match self {
            ProbeOutcome::Reachable => "reachable",
            ProbeOutcome::Unreachable => "unreachable",
            ProbeOutcome::Skipped => "skipped",
        }
    }
}

/// Prometheus-facing metrics recorder
///
/// Every method is a no-op until a global recorder is installed.
pub struct IndexerPrometheusMetrics;

impl Default for IndexerPrometheusMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexerPrometheusMetrics {
    pub fn new() -> Self {
        describe_counter!(CYCLES_TOTAL, "Total measurement cycles completed");
        describe_counter!(
            CYCLE_FAILURES_TOTAL,
            "Total measurement cycles that failed before persisting"
        );
        describe_histogram!(
            CYCLE_DURATION_SECONDS,
            "Duration of a full reconcile, resolve, probe and persist pass"
        );
        describe_counter!(PROBES_TOTAL, "Validator measurements by outcome");
        describe_histogram!(
            PROBE_LATENCY_SECONDS,
            "Latency of successful eth_blockNumber probes"
        );
        describe_counter!(
            RESOLUTIONS_TOTAL,
            "RPC endpoint resolutions by the stage that produced them"
        );
        describe_counter!(
            TOOL_INVOCATIONS_TOTAL,
            "Validator tool invocations by command and outcome"
        );
        describe_gauge!(
            ELECTED_VALIDATORS,
            "Number of currently elected validators"
        );

        Self
    }

    pub fn record_cycle(&self, success: bool, duration: Duration) {
        if success {
            counter!(CYCLES_TOTAL).increment(1);
        } else {
            counter!(CYCLE_FAILURES_TOTAL).increment(1);
        }
        histogram!(CYCLE_DURATION_SECONDS).record(duration.as_secs_f64());
    }

    pub fn record_probe(&self, outcome: ProbeOutcome, latency: Option<Duration>) {
        counter!(PROBES_TOTAL, "outcome" => outcome.as_label()).increment(1);
        if let Some(latency) = latency {
            histogram!(PROBE_LATENCY_SECONDS).record(latency.as_secs_f64());
        }
    }

    /// `stage` is `metadata`, `stored` or `none`
    pub fn record_resolution(&self, stage: &'static str) {
        counter!(RESOLUTIONS_TOTAL, "stage" => stage).increment(1);
    }

    pub fn record_tool_invocation(&self, command: &'static str, success: bool) {
        let outcome = if success { "success" } else { "failure" };
        counter!(TOOL_INVOCATIONS_TOTAL, "command" => command, "outcome" => outcome).increment(1);
    }

    pub fn set_elected_validators(&self, count: usize) {
        gauge!(ELECTED_VALIDATORS).set(count as f64);
    }
}
