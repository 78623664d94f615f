//! Flow engine metric helpers and timing aggregation.
//!
//! The `record_*` helpers are called from the engine's hot paths; they are
//! no-ops until a recorder is installed.

use std::collections::BTreeMap;

use contracts::{GroupId, TimingReport};
use metrics::{counter, histogram};

/// A join group barrier fired for one frame
pub fn record_barrier_fired(group: GroupId) {
    counter!("flow_engine_barrier_fired_total", "group" => group.to_string()).increment(1);
}

/// A pending signal was evicted by a newer frame in the same slot
pub fn record_stale_eviction() {
    counter!("flow_engine_stale_evictions_total").increment(1);
}

/// A node advanced past a frame without running its logic
pub fn record_frame_skipped() {
    counter!("flow_engine_frames_skipped_total").increment(1);
}

/// A frame arrived after the node's counter had already passed it
pub fn record_stale_arrival() {
    counter!("flow_engine_stale_arrivals_total").increment(1);
}

/// Node logic panicked and was contained
pub fn record_filter_panic() {
    counter!("flow_engine_filter_panics_total").increment(1);
}

/// Runtime of one node invocation
pub fn record_node_runtime(node: &str, runtime_ms: f64) {
    histogram!("flow_engine_node_runtime_ms", "node" => node.to_string()).record(runtime_ms);
}

/// Time a node spent blocked in frame synchronization
pub fn record_sync_wait(wait_ms: f64) {
    histogram!("flow_engine_sync_wait_ms").record(wait_ms);
}

/// Timing aggregator across cycles
///
/// Feeds one `TimingReport` per cycle and keeps per-node statistics of the
/// mean runtime, so slow drifts become visible between cycles.
#[derive(Debug, Clone, Default)]
pub struct TimingAggregator {
    /// Reports folded in
    pub cycles: u64,

    /// Frames processed over all nodes and cycles
    pub total_processed: u64,

    /// Frames skipped over all nodes and cycles
    pub total_skipped: u64,

    /// Per-node mean runtime statistics (ms), keyed by name in graph
    pub node_stats: BTreeMap<String, RunningStats>,
}

impl TimingAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in one report
    pub fn update(&mut self, report: &TimingReport) {
        self.cycles += 1;
        for node in &report.nodes {
            self.total_processed += node.processed;
            self.total_skipped += node.skipped;
            if let Some(mean) = node.mean_ms() {
                self.node_stats
                    .entry(node.name_in_graph.clone())
                    .or_default()
                    .push(mean);
            }
        }
    }

    pub fn summary(&self) -> TimingSummary {
        let processed_and_skipped = self.total_processed + self.total_skipped;
        TimingSummary {
            cycles: self.cycles,
            total_processed: self.total_processed,
            total_skipped: self.total_skipped,
            skip_rate: if processed_and_skipped > 0 {
                self.total_skipped as f64 / processed_and_skipped as f64 * 100.0
            } else {
                0.0
            },
            nodes: self
                .node_stats
                .iter()
                .map(|(name, stats)| (name.clone(), StatsSummary::from(stats)))
                .collect(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Summary produced by `TimingAggregator`
#[derive(Debug, Clone, Default)]
pub struct TimingSummary {
    pub cycles: u64,
    pub total_processed: u64,
    pub total_skipped: u64,
    pub skip_rate: f64,
    pub nodes: BTreeMap<String, StatsSummary>,
}

impl std::fmt::Display for TimingSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Flow Engine Timing Summary ===")?;
        writeln!(f, "Cycles: {}", self.cycles)?;
        writeln!(f, "Processed frames: {}", self.total_processed)?;
        writeln!(
            f,
            "Skipped frames: {} ({:.2}%)",
            self.total_skipped, self.skip_rate
        )?;
        if !self.nodes.is_empty() {
            writeln!(f, "Mean runtime per node (ms):")?;
            for (name, stats) in &self.nodes {
                writeln!(f, "  {}: {}", name, stats)?;
            }
        }
        Ok(())
    }
}

/// Statistics summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
