//! Control-plane operations applied to every node of a graph.
//!
//! Stateless operations are variants of `GraphOp`; operations that carry
//! results or per-traversal state are their own `Visitor` types. None of
//! them changes the topology beyond wiring inputs of sources or of one role.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use contracts::{
    ArmState, EngineError, FrameId, GroupId, ParameterSet, SensorId, SensorSelector, TimingReport,
};
use tracing::{debug, warn};

use crate::channel::AnyChannel;
use crate::node::{FilterNode, NodeRole};

/// One operation applied node by node
pub trait Visitor {
    fn visit(&mut self, node: &Arc<FilterNode>);
}

impl<F: FnMut(&Arc<FilterNode>)> Visitor for F {
    fn visit(&mut self, node: &Arc<FilterNode>) {
        self(node)
    }
}

/// Stateless graph-wide operations
#[derive(Debug, Clone, PartialEq)]
pub enum GraphOp {
    /// Counter to 0, join groups cleared, state forwarded to the logic
    Arm(ArmState),
    Initialize,
    Dispose,
    SetParameters(ParameterSet),
    /// None clears every join group; Some(frame) only that frame's slot
    ResetSignalCounters(Option<FrameId>),
    EnsureFrame(FrameId),
    SkipFrame(FrameId),
    SetCounter(FrameId),
    SetAlwaysEnableTiming(bool),
    LogProcessingTime,
    /// Block until every source node's counter is at least the frame
    SynchronizeSources(FrameId),
}

impl Visitor for GraphOp {
    fn visit(&mut self, node: &Arc<FilterNode>) {
        match self {
            GraphOp::Arm(state) => node.arm(*state),
            GraphOp::Initialize => node.init(),
            GraphOp::Dispose => node.dispose(),
            GraphOp::SetParameters(params) => node.set_parameters(params),
            GraphOp::ResetSignalCounters(None) => node.reset_groups(),
            GraphOp::ResetSignalCounters(Some(frame)) => node.reset_group_slot(*frame),
            GraphOp::EnsureFrame(frame) => node.ensure_frame(*frame),
            GraphOp::SkipFrame(frame) => node.skip_frame(*frame),
            GraphOp::SetCounter(frame) => node.set_counter(*frame),
            GraphOp::SetAlwaysEnableTiming(enabled) => node.set_always_enable_timing(*enabled),
            GraphOp::LogProcessingTime => node.log_processing_time(),
            GraphOp::SynchronizeSources(frame) => {
                if node.role() == NodeRole::Source {
                    node.wait_until(*frame);
                }
            }
        }
    }
}

/// Connect an external sensor feed to every matching source node
pub struct WireSensor {
    channel: Arc<dyn AnyChannel>,
    sensor: SensorId,
    wired: usize,
    errors: Vec<EngineError>,
}

impl WireSensor {
    pub fn new(channel: Arc<dyn AnyChannel>, sensor: SensorId) -> Self {
        Self {
            channel,
            sensor,
            wired: 0,
            errors: Vec::new(),
        }
    }

    /// Sources connected during the traversal
    pub fn wired(&self) -> usize {
        self.wired
    }

    /// Sources that matched but refused the channel
    pub fn errors(&self) -> &[EngineError] {
        &self.errors
    }

    /// Fail with the first refusal, if any
    pub fn finish(mut self) -> Result<usize, EngineError> {
        if self.errors.is_empty() {
            Ok(self.wired)
        } else {
            Err(self.errors.swap_remove(0))
        }
    }
}

impl Visitor for WireSensor {
    fn visit(&mut self, node: &Arc<FilterNode>) {
        if !source_matches(node, self.sensor) {
            return;
        }
        match node.connect(self.channel.clone(), GroupId::IMMEDIATE) {
            Ok(()) => {
                self.wired += 1;
                debug!(node = %node.name_in_graph(), sensor = %self.sensor, "source wired");
            }
            Err(e) => {
                warn!(node = %node.name_in_graph(), sensor = %self.sensor, error = %e, "source refused sensor feed");
                self.errors.push(e);
            }
        }
    }
}

/// Undo `WireSensor` for the same feed and sensor
pub struct UnwireSensor {
    channel: Arc<dyn AnyChannel>,
    sensor: SensorId,
    unwired: usize,
}

impl UnwireSensor {
    pub fn new(channel: Arc<dyn AnyChannel>, sensor: SensorId) -> Self {
        Self {
            channel,
            sensor,
            unwired: 0,
        }
    }

    pub fn unwired(&self) -> usize {
        self.unwired
    }
}

impl Visitor for UnwireSensor {
    fn visit(&mut self, node: &Arc<FilterNode>) {
        if source_matches(node, self.sensor)
            && node
                .disconnect(self.channel.as_ref(), GroupId::IMMEDIATE)
                .is_ok()
        {
            self.unwired += 1;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WireMode {
    Connect,
    Disconnect,
}

/// Connect (or disconnect) one channel directly to every node of a role
pub struct WireRole {
    channel: Arc<dyn AnyChannel>,
    role: NodeRole,
    mode: WireMode,
    changed: usize,
    errors: Vec<EngineError>,
}

impl WireRole {
    pub fn connect(channel: Arc<dyn AnyChannel>, role: NodeRole) -> Self {
        Self::with_mode(channel, role, WireMode::Connect)
    }

    pub fn disconnect(channel: Arc<dyn AnyChannel>, role: NodeRole) -> Self {
        Self::with_mode(channel, role, WireMode::Disconnect)
    }

    fn with_mode(channel: Arc<dyn AnyChannel>, role: NodeRole, mode: WireMode) -> Self {
        Self {
            channel,
            role,
            mode,
            changed: 0,
            errors: Vec::new(),
        }
    }

    /// Nodes connected or disconnected during the traversal
    pub fn changed(&self) -> usize {
        self.changed
    }

    pub fn errors(&self) -> &[EngineError] {
        &self.errors
    }

    /// Fail with the first error, if any
    pub fn finish(mut self) -> Result<usize, EngineError> {
        if self.errors.is_empty() {
            Ok(self.changed)
        } else {
            Err(self.errors.swap_remove(0))
        }
    }
}

impl Visitor for WireRole {
    fn visit(&mut self, node: &Arc<FilterNode>) {
        if node.role() != self.role {
            return;
        }
        let result = match self.mode {
            WireMode::Connect => node.connect(self.channel.clone(), GroupId::IMMEDIATE),
            WireMode::Disconnect => node.disconnect(self.channel.as_ref(), GroupId::IMMEDIATE),
        };
        match result {
            Ok(()) => self.changed += 1,
            Err(e) => {
                warn!(
                    node = %node.name_in_graph(),
                    channel = %self.channel.name(),
                    mode = ?self.mode,
                    error = %e,
                    "role wiring failed"
                );
                self.errors.push(e);
            }
        }
    }
}

fn source_matches(node: &FilterNode, sensor: SensorId) -> bool {
    node.role() == NodeRole::Source
        && node
            .sensor()
            .unwrap_or(SensorSelector::Any)
            .matches(sensor)
}

/// Give every visited node the next index, starting at `start`
#[derive(Debug, Default)]
pub struct IndexNodes {
    next: usize,
}

impl IndexNodes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(start: usize) -> Self {
        Self { next: start }
    }

    /// Nodes indexed so far plus the start
    pub fn next_index(&self) -> usize {
        self.next
    }
}

impl Visitor for IndexNodes {
    fn visit(&mut self, node: &Arc<FilterNode>) {
        node.set_node_index(self.next);
        self.next += 1;
    }
}

/// Gather every node's timing snapshot
#[derive(Debug, Default)]
pub struct CollectTiming {
    report: TimingReport,
}

impl CollectTiming {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_report(self) -> TimingReport {
        self.report
    }
}

impl Visitor for CollectTiming {
    fn visit(&mut self, node: &Arc<FilterNode>) {
        self.report.nodes.push(node.timing_snapshot());
    }
}

/// Sensor ids the graph's sources listen to
#[derive(Debug, Default)]
pub struct CollectSensorIds {
    ids: BTreeSet<SensorId>,
    wildcard: usize,
}

impl CollectSensorIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ids(&self) -> &BTreeSet<SensorId> {
        &self.ids
    }

    /// Sources listening to any sensor
    pub fn wildcard_sources(&self) -> usize {
        self.wildcard
    }
}

impl Visitor for CollectSensorIds {
    fn visit(&mut self, node: &Arc<FilterNode>) {
        if node.role() != NodeRole::Source {
            return;
        }
        match node.sensor() {
            Some(SensorSelector::Id(id)) => {
                self.ids.insert(id);
            }
            Some(SensorSelector::Any) | None => self.wildcard += 1,
        }
    }
}

/// Histogram of frame counters: counter value to number of nodes
#[derive(Debug, Default)]
pub struct CountProcessedFrames {
    counts: BTreeMap<FrameId, usize>,
}

impl CountProcessedFrames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counts(&self) -> &BTreeMap<FrameId, usize> {
        &self.counts
    }

    /// True when every visited node sits at the same counter
    pub fn is_uniform(&self) -> bool {
        self.counts.len() <= 1
    }

    /// Lowest counter among the visited nodes
    pub fn slowest(&self) -> Option<FrameId> {
        self.counts.keys().next().copied()
    }
}

impl Visitor for CountProcessedFrames {
    fn visit(&mut self, node: &Arc<FilterNode>) {
        *self.counts.entry(node.frame_counter()).or_default() += 1;
    }
}
