//! Processing-time diagnostics collected from graph nodes.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::FrameId;

/// Aggregated processing time of one node since its last reset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeTimingSnapshot {
    /// Unique name of the node within its graph
    pub name_in_graph: String,

    /// Frames whose logic ran
    pub processed: u64,

    /// Frames skipped without running logic
    pub skipped: u64,

    /// Sum of all runtimes (ms)
    pub total_ms: f64,

    /// Fastest runtime and the frame it occurred in
    pub min: Option<(f64, FrameId)>,

    /// Slowest runtime and the frame it occurred in
    pub max: Option<(f64, FrameId)>,

    /// Most recent runtimes (ms), oldest first
    pub recent_ms: Vec<f64>,

    /// Global processing index assigned to the last run, if enabled
    pub last_processing_index: Option<u64>,
}

impl NodeTimingSnapshot {
    /// Mean runtime over all processed frames
    pub fn mean_ms(&self) -> Option<f64> {
        (self.processed > 0).then(|| self.total_ms / self.processed as f64)
    }
}

impl fmt::Display for NodeTimingSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: processed={} skipped={}",
            self.name_in_graph, self.processed, self.skipped
        )?;
        if let Some(mean) = self.mean_ms() {
            write!(f, " mean={mean:.3}ms")?;
        }
        if let Some((ms, frame)) = self.min {
            write!(f, " min={ms:.3}ms@{frame}")?;
        }
        if let Some((ms, frame)) = self.max {
            write!(f, " max={ms:.3}ms@{frame}")?;
        }
        Ok(())
    }
}

/// Timing of every node of a graph, in collection order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimingReport {
    pub nodes: Vec<NodeTimingSnapshot>,
}

impl TimingReport {
    /// Sum of processed frames across nodes
    pub fn total_processed(&self) -> u64 {
        self.nodes.iter().map(|n| n.processed).sum()
    }

    /// Node with the highest mean runtime
    pub fn slowest(&self) -> Option<&NodeTimingSnapshot> {
        self.nodes
            .iter()
            .filter(|n| n.mean_ms().is_some())
            .max_by(|a, b| {
                a.mean_ms()
                    .unwrap_or_default()
                    .total_cmp(&b.mean_ms().unwrap_or_default())
            })
    }

    pub fn get(&self, name_in_graph: &str) -> Option<&NodeTimingSnapshot> {
        self.nodes.iter().find(|n| n.name_in_graph == name_in_graph)
    }
}

impl fmt::Display for TimingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Node Timing ({} nodes) ===", self.nodes.len())?;
        for node in &self.nodes {
            writeln!(f, "  {node}")?;
        }
        Ok(())
    }
}
