//! Per-node processing time accumulation.
//!
//! Keeps run/skip counts, min/max with the frame they occurred in, and a
//! bounded history of recent runtimes in a `HeapRb`.

use std::fmt;
use std::time::Duration;

use contracts::{FrameId, NodeTimingSnapshot};
use ringbuf::{traits::*, HeapRb};

pub struct NodeTiming {
    processed: u64,
    skipped: u64,
    total_ms: f64,
    min: Option<(f64, FrameId)>,
    max: Option<(f64, FrameId)>,
    /// Recent runtimes (ms), oldest first
    history: HeapRb<f64>,
    processing_index: Option<u64>,
}

impl NodeTiming {
    pub fn new(history: usize) -> Self {
        Self {
            processed: 0,
            skipped: 0,
            total_ms: 0.0,
            min: None,
            max: None,
            history: HeapRb::new(history.max(1)),
            processing_index: None,
        }
    }

    /// Record one completed run; returns the runtime in ms
    pub fn record(&mut self, frame: FrameId, elapsed: Duration) -> f64 {
        let runtime_ms = elapsed.as_secs_f64() * 1000.0;
        self.processed += 1;
        self.total_ms += runtime_ms;
        if self.min.map_or(true, |(ms, _)| runtime_ms < ms) {
            self.min = Some((runtime_ms, frame));
        }
        if self.max.map_or(true, |(ms, _)| runtime_ms > ms) {
            self.max = Some((runtime_ms, frame));
        }
        self.history.push_overwrite(runtime_ms);
        runtime_ms
    }

    pub fn record_skip(&mut self) {
        self.skipped += 1;
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn processing_index(&self) -> Option<u64> {
        self.processing_index
    }

    pub fn set_processing_index(&mut self, index: Option<u64>) {
        self.processing_index = index;
    }

    /// Forget all measurements; the processing index is kept
    pub fn reset(&mut self) {
        self.processed = 0;
        self.skipped = 0;
        self.total_ms = 0.0;
        self.min = None;
        self.max = None;
        self.history.clear();
    }

    pub fn snapshot(&self, name_in_graph: String) -> NodeTimingSnapshot {
        NodeTimingSnapshot {
            name_in_graph,
            processed: self.processed,
            skipped: self.skipped,
            total_ms: self.total_ms,
            min: self.min,
            max: self.max,
            recent_ms: self.history.iter().copied().collect(),
            last_processing_index: self.processing_index,
        }
    }
}

impl fmt::Debug for NodeTiming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeTiming")
            .field("processed", &self.processed)
            .field("skipped", &self.skipped)
            .field("history", &self.history.occupied_len())
            .finish()
    }
}
