//! Graph nodes.
//!
//! A `FilterNode` wraps one piece of business logic (`Filter`) and gates it
//! by a per-node frame counter: logic for frame F runs only once the counter
//! equals F, and the counter advances after the work is done. Outputs queued
//! by the logic are written once the counter has advanced and the logic lock
//! is released, so downstream work never runs under this node's lock.

use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock};
use std::time::{Duration, Instant};

use contracts::{
    ArmState, ChannelName, EngineConfig, EngineError, FrameId, GroupId, NodeTimingSnapshot,
    ParamValue, ParameterSet, SensorSelector, Verbosity,
};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::channel::{same_channel, signal_target, AnyChannel, Channel, Payload, SignalTarget};
use crate::gate::FrameGate;
use crate::graph::ProcessingSequence;
use crate::join_group::{group_listener, GroupListener, JoinGroup};
use crate::timing::NodeTiming;
use crate::{lock, read_lock, write_lock};

/// Parameter key handled by every node
pub const VERBOSITY_PARAM: &str = "Verbosity";

const NO_INDEX: usize = usize::MAX;

/// Key of a node in its graph's node table
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Structural role of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRole {
    /// Inputs and outputs
    Filter,
    /// Republishes a sensor feed
    Source,
    /// No outputs
    Sink,
    /// Single `ResultFrame` output
    Result,
}

/// Engine settings a node is built with
#[derive(Debug, Clone)]
pub struct NodeSettings {
    pub ring_depth: usize,
    pub default_verbosity: Verbosity,
    pub always_enable_timing: bool,
    pub debug_timings: bool,
    pub wait_log_interval: Duration,
    pub timing_history: usize,
}

impl From<&EngineConfig> for NodeSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            ring_depth: config.ring_depth.max(1),
            default_verbosity: config.default_verbosity,
            always_enable_timing: config.always_enable_timing,
            debug_timings: config.debug_timings,
            wait_log_interval: Duration::from_millis(config.wait_log_interval_ms.max(1)),
            timing_history: config.timing_history,
        }
    }
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

/// Collects the output channels a filter declares at construction
pub struct OutputRegistry {
    node: String,
    depth: usize,
    channels: BTreeMap<ChannelName, Arc<dyn AnyChannel>>,
}

impl OutputRegistry {
    fn new(node: &str, depth: usize) -> Self {
        Self {
            node: node.to_string(),
            depth,
            channels: BTreeMap::new(),
        }
    }

    /// Declare an output channel carrying `T`
    pub fn add<T: Payload>(&mut self, name: &str) -> Result<(), EngineError> {
        let name = ChannelName::from(name);
        if self.channels.contains_key(&name) {
            return Err(EngineError::duplicate_channel(self.node.clone(), name));
        }
        let channel: Arc<dyn AnyChannel> = Arc::new(Channel::<T>::new(name.clone(), self.depth));
        self.channels.insert(name, channel);
        Ok(())
    }
}

/// One input subscription of a node
#[derive(Debug, Clone)]
pub struct Subscription {
    pub channel: Arc<dyn AnyChannel>,
    pub group: GroupId,
}

/// Read-only description of an input, for introspection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputInfo {
    pub channel: ChannelName,
    /// Upstream node, None for external feeds
    pub owner: Option<NodeId>,
    pub group: GroupId,
    pub payload: &'static str,
}

type PendingWrite = Box<dyn FnOnce() + Send>;

/// What business logic sees while handling one frame
pub struct ProceedContext<'a> {
    node: &'a str,
    frame: FrameId,
    trigger: Option<&'a dyn AnyChannel>,
    inputs: &'a [Subscription],
    outputs: &'a BTreeMap<ChannelName, Arc<dyn AnyChannel>>,
    pending: Vec<PendingWrite>,
}

impl<'a> ProceedContext<'a> {
    fn new(
        node: &'a str,
        frame: FrameId,
        trigger: Option<&'a dyn AnyChannel>,
        inputs: &'a [Subscription],
        outputs: &'a BTreeMap<ChannelName, Arc<dyn AnyChannel>>,
    ) -> Self {
        Self {
            node,
            frame,
            trigger,
            inputs,
            outputs,
            pending: Vec::new(),
        }
    }

    pub fn frame(&self) -> FrameId {
        self.frame
    }

    pub fn node_name(&self) -> &str {
        self.node
    }

    /// Channel whose write triggered this invocation (None for grouped or manual runs)
    pub fn trigger(&self) -> Option<&dyn AnyChannel> {
        self.trigger
    }

    /// Payload of the triggering channel for the current frame
    pub fn trigger_payload<T: Payload>(&self) -> Option<T> {
        self.trigger?
            .as_any()
            .downcast_ref::<Channel<T>>()?
            .read(self.frame)
    }

    /// Payload of the first input channel named `name` for the current frame.
    ///
    /// Several upstream nodes may publish under the same output name; use
    /// `read_from` to pick one of them.
    pub fn read<T: Payload>(&self, name: &str) -> Option<T> {
        self.inputs
            .iter()
            .filter(|s| s.channel.name() == name)
            .find_map(|s| read_typed(s, self.frame))
    }

    /// Payload of input `name` written by node `owner` for the current frame
    pub fn read_from<T: Payload>(&self, owner: NodeId, name: &str) -> Option<T> {
        self.inputs
            .iter()
            .filter(|s| s.channel.owner() == Some(owner) && s.channel.name() == name)
            .find_map(|s| read_typed(s, self.frame))
    }

    /// Every input payload of type `T` present for the current frame
    pub fn read_all<T: Payload>(&self) -> Vec<(ChannelName, T)> {
        self.inputs
            .iter()
            .filter_map(|s| {
                let payload = s
                    .channel
                    .as_any()
                    .downcast_ref::<Channel<T>>()?
                    .read(self.frame)?;
                Some((s.channel.name().clone(), payload))
            })
            .collect()
    }

    /// Queue `payload` on output `output` for the current frame
    pub fn emit<T: Payload>(&mut self, output: &str, payload: T) -> Result<(), EngineError> {
        let channel = self
            .outputs
            .get(output)
            .ok_or_else(|| EngineError::unknown_channel(self.node, output))?;
        let typed = channel
            .clone()
            .into_any()
            .downcast::<Channel<T>>()
            .map_err(|_| {
                EngineError::type_mismatch(
                    self.node,
                    channel.name().clone(),
                    std::any::type_name::<T>(),
                )
            })?;
        let frame = self.frame;
        self.pending
            .push(Box::new(move || typed.write(frame, payload)));
        Ok(())
    }

    fn into_pending(self) -> Vec<PendingWrite> {
        self.pending
    }
}

fn read_typed<T: Payload>(subscription: &Subscription, frame: FrameId) -> Option<T> {
    subscription
        .channel
        .as_any()
        .downcast_ref::<Channel<T>>()?
        .read(frame)
}

/// Business logic of a node
///
/// Everything except `type_name` has a default, so a filter only overrides
/// the hooks it needs.
pub trait Filter: Send + 'static {
    /// Stable type identity, e.g. "Threshold"
    fn type_name(&self) -> &str;

    fn role(&self) -> NodeRole {
        NodeRole::Filter
    }

    /// Sensor feed a source listens to
    fn sensor(&self) -> Option<SensorSelector> {
        None
    }

    fn declare_outputs(&self, _outputs: &mut OutputRegistry) -> Result<(), EngineError> {
        Ok(())
    }

    /// Whether a channel may be subscribed to
    fn accepts(&self, _channel: &dyn AnyChannel) -> bool {
        true
    }

    /// Single arrival on a group 0 input, or a manual run
    fn proceed(&mut self, ctx: &mut ProceedContext<'_>) {
        debug!(
            node = ctx.node_name(),
            frame = ctx.frame(),
            "no handler for single arrivals"
        );
    }

    /// All members of `group` delivered the current frame
    fn proceed_group(&mut self, ctx: &mut ProceedContext<'_>, group: GroupId, member_count: usize) {
        debug!(
            node = ctx.node_name(),
            frame = ctx.frame(),
            group = %group,
            member_count,
            "no handler for grouped arrivals"
        );
    }

    fn arm(&mut self, _state: ArmState) {}

    fn init(&mut self) {}

    fn dispose(&mut self) {}

    /// Apply one parameter; false if the key is not recognised
    fn set_parameter(&mut self, _key: &str, _value: &ParamValue) -> bool {
        false
    }
}

#[derive(Clone, Copy)]
enum Invocation<'a> {
    Single(Option<&'a dyn AnyChannel>),
    Group { group: GroupId, member_count: usize },
}

/// A graph node gating its `Filter` by frame order
pub struct FilterNode {
    id: OnceLock<NodeId>,
    type_name: String,
    role: NodeRole,
    sensor: Option<SensorSelector>,
    settings: NodeSettings,
    sequence: Arc<ProcessingSequence>,
    logic: Mutex<Box<dyn Filter>>,
    gate: FrameGate,
    inputs: RwLock<Vec<Subscription>>,
    groups: Mutex<BTreeMap<GroupId, Arc<JoinGroup>>>,
    outputs: BTreeMap<ChannelName, Arc<dyn AnyChannel>>,
    timing: Mutex<NodeTiming>,
    verbosity: Mutex<Verbosity>,
    always_enable_timing: AtomicBool,
    graph_index: AtomicU32,
    node_index: AtomicUsize,
}

impl FilterNode {
    /// Build a node around `filter`, creating its declared outputs
    pub fn new(
        filter: Box<dyn Filter>,
        settings: NodeSettings,
        sequence: Arc<ProcessingSequence>,
    ) -> Result<Arc<Self>, EngineError> {
        let type_name = filter.type_name().to_string();
        let mut registry = OutputRegistry::new(&type_name, settings.ring_depth);
        filter.declare_outputs(&mut registry)?;

        Ok(Arc::new(Self {
            id: OnceLock::new(),
            role: filter.role(),
            sensor: filter.sensor(),
            timing: Mutex::new(NodeTiming::new(settings.timing_history)),
            verbosity: Mutex::new(settings.default_verbosity),
            always_enable_timing: AtomicBool::new(settings.always_enable_timing),
            type_name,
            settings,
            sequence,
            logic: Mutex::new(filter),
            gate: FrameGate::new(),
            inputs: RwLock::new(Vec::new()),
            groups: Mutex::new(BTreeMap::new()),
            outputs: registry.channels,
            graph_index: AtomicU32::new(0),
            node_index: AtomicUsize::new(NO_INDEX),
        }))
    }

    /// Build a node outside of a graph
    pub fn standalone(filter: impl Filter, config: &EngineConfig) -> Result<Arc<Self>, EngineError> {
        Self::new(
            Box::new(filter),
            NodeSettings::from(config),
            Arc::new(ProcessingSequence::new()),
        )
    }

    /// Record the graph key; outputs learn their owner
    pub(crate) fn bind(&self, id: NodeId) {
        if self.id.set(id).is_ok() {
            for channel in self.outputs.values() {
                channel.bind_owner(id);
            }
        }
    }

    pub fn id(&self) -> Option<NodeId> {
        self.id.get().copied()
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn role(&self) -> NodeRole {
        self.role
    }

    pub fn sensor(&self) -> Option<SensorSelector> {
        self.sensor
    }

    pub fn frame_counter(&self) -> FrameId {
        self.gate.current()
    }

    pub fn set_graph_index(&self, index: u32) {
        self.graph_index.store(index, Ordering::Relaxed);
    }

    pub fn graph_index(&self) -> u32 {
        self.graph_index.load(Ordering::Relaxed)
    }

    pub fn set_node_index(&self, index: usize) {
        self.node_index.store(index, Ordering::Relaxed);
    }

    /// Index assigned by `IndexNodes`
    pub fn node_index(&self) -> Option<usize> {
        match self.node_index.load(Ordering::Relaxed) {
            NO_INDEX => None,
            index => Some(index),
        }
    }

    /// Unique name: type name, graph index, then node index (graph key until indexed)
    pub fn name_in_graph(&self) -> String {
        let index = self
            .node_index()
            .or_else(|| self.id().map(|id| id.0))
            .unwrap_or_default();
        format!("{}{}_{}", self.type_name, self.graph_index(), index)
    }

    pub fn verbosity(&self) -> Verbosity {
        *lock(&self.verbosity)
    }

    pub fn set_verbosity(&self, verbosity: Verbosity) {
        *lock(&self.verbosity) = verbosity;
    }

    pub fn set_always_enable_timing(&self, enabled: bool) {
        self.always_enable_timing.store(enabled, Ordering::Relaxed);
    }

    fn timing_logged(&self) -> bool {
        self.always_enable_timing.load(Ordering::Relaxed) || self.verbosity() >= Verbosity::Max
    }

    /// Output channel by name
    pub fn output(&self, name: &str) -> Result<Arc<dyn AnyChannel>, EngineError> {
        self.outputs
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::unknown_channel(self.name_in_graph(), name))
    }

    /// Typed output channel by name
    pub fn output_typed<T: Payload>(&self, name: &str) -> Result<Arc<Channel<T>>, EngineError> {
        let channel = self.output(name)?;
        let payload = channel.payload_type_name();
        let channel_name = channel.name().clone();
        channel
            .into_any()
            .downcast::<Channel<T>>()
            .map_err(|_| EngineError::type_mismatch(self.name_in_graph(), channel_name, payload))
    }

    pub fn outputs(&self) -> Vec<ChannelName> {
        self.outputs.keys().cloned().collect()
    }

    pub fn inputs(&self) -> Vec<InputInfo> {
        read_lock(&self.inputs)
            .iter()
            .map(|s| InputInfo {
                channel: s.channel.name().clone(),
                owner: s.channel.owner(),
                group: s.group,
                payload: s.channel.payload_type_name(),
            })
            .collect()
    }

    pub fn group(&self, id: GroupId) -> Option<Arc<JoinGroup>> {
        lock(&self.groups).get(&id).cloned()
    }

    /// True when no join group of this node holds a pending flag
    pub fn groups_idle(&self) -> bool {
        lock(&self.groups).values().all(|g| g.is_idle())
    }

    /// Subscribe to `channel`, directly (group 0) or as a join group member
    #[instrument(
        level = "debug",
        name = "filter_node_connect",
        skip(self, channel),
        fields(node = %self.type_name, channel = %channel.name(), group = %group)
    )]
    pub fn connect(
        self: &Arc<Self>,
        channel: Arc<dyn AnyChannel>,
        group: GroupId,
    ) -> Result<(), EngineError> {
        if !lock(&self.logic).accepts(channel.as_ref()) {
            warn!(payload = channel.payload_type_name(), "payload type not accepted");
            return Err(EngineError::type_mismatch(
                self.name_in_graph(),
                channel.name().clone(),
                channel.payload_type_name(),
            ));
        }

        if channel.depth() != self.settings.ring_depth {
            warn!(
                depth = channel.depth(),
                expected = self.settings.ring_depth,
                "ring depth mismatch"
            );
            return Err(EngineError::depth_mismatch(
                self.name_in_graph(),
                channel.name().clone(),
                channel.depth(),
                self.settings.ring_depth,
            ));
        }

        let mut inputs = write_lock(&self.inputs);
        if inputs
            .iter()
            .any(|s| s.group == group && same_channel(s.channel.as_ref(), channel.as_ref()))
        {
            return Ok(());
        }

        if group.is_immediate() {
            channel.install(signal_target(self));
        } else {
            let mut groups = lock(&self.groups);
            // Every completion advances the one frame counter, so a second
            // group would always arrive stale.
            if let Some(&existing) = groups.keys().find(|&&g| g != group) {
                return Err(EngineError::GroupConflict {
                    node: self.name_in_graph(),
                    existing,
                    requested: group,
                });
            }
            let join = groups
                .entry(group)
                .or_insert_with(|| {
                    Arc::new(JoinGroup::new(
                        group,
                        self.settings.ring_depth,
                        group_listener(self),
                    ))
                })
                .clone();
            drop(groups);
            join.add_member(channel.clone());
            channel.install(signal_target(&join));
        }

        inputs.push(Subscription { channel, group });
        Ok(())
    }

    /// Undo one `connect`
    pub fn disconnect(
        self: &Arc<Self>,
        channel: &dyn AnyChannel,
        group: GroupId,
    ) -> Result<(), EngineError> {
        let mut inputs = write_lock(&self.inputs);
        let Some(pos) = inputs
            .iter()
            .position(|s| s.group == group && same_channel(s.channel.as_ref(), channel))
        else {
            return Err(EngineError::NotSubscribed {
                node: self.name_in_graph(),
                channel: channel.name().clone(),
                group,
            });
        };
        let subscription = inputs.remove(pos);

        if group.is_immediate() {
            subscription.channel.uninstall(&signal_target(self));
        } else {
            let mut groups = lock(&self.groups);
            if let Some(join) = groups.get(&group).cloned() {
                join.remove_member(channel);
                subscription.channel.uninstall(&signal_target(&join));
                if join.member_count() == 0 {
                    groups.remove(&group);
                }
            }
        }
        debug!(node = %self.type_name, channel = %channel.name(), group = %group, "disconnected");
        Ok(())
    }

    /// Block until the counter reaches `frame`.
    ///
    /// Returns true when the frame is admitted (counter == frame), false when
    /// the counter had already moved past it.
    pub fn synchronize_on_frame(&self, frame: FrameId) -> bool {
        let start = Instant::now();
        let reached = if self.settings.debug_timings {
            self.gate
                .wait_for_logged(frame, self.settings.wait_log_interval, |waited, counter| {
                    debug!(
                        node = %self.type_name,
                        frame,
                        counter,
                        waited_ms = waited.as_secs_f64() * 1000.0,
                        "waiting for frame"
                    );
                })
        } else {
            self.gate.wait_for(frame)
        };
        observability::record_sync_wait(start.elapsed().as_secs_f64() * 1000.0);

        if reached == frame {
            true
        } else {
            self.stale_arrival(frame, reached);
            false
        }
    }

    /// Block until the counter is at least `frame`; returns the counter
    pub fn wait_until(&self, frame: FrameId) -> FrameId {
        self.gate.wait_for(frame)
    }

    fn stale_arrival(&self, frame: FrameId, counter: FrameId) {
        error!(
            node = %self.name_in_graph(),
            frame,
            counter,
            "synchronization error: frame arrived after the node moved past it"
        );
        observability::record_stale_arrival();
    }

    /// Run the logic for `frame` from an external worker, with no triggering channel
    pub fn process_frame(&self, frame: FrameId) -> bool {
        self.run(frame, Invocation::Single(None))
    }

    fn run(&self, frame: FrameId, invocation: Invocation<'_>) -> bool {
        if !self.synchronize_on_frame(frame) {
            return false;
        }
        let inputs: Vec<Subscription> = read_lock(&self.inputs).clone();

        let mut logic = lock(&self.logic);
        let counter = self.gate.current();
        if counter != frame {
            // Another invocation for this frame got the lock first.
            self.stale_arrival(frame, counter);
            return false;
        }

        let name = self.name_in_graph();
        let trigger = match invocation {
            Invocation::Single(trigger) => trigger,
            Invocation::Group { .. } => None,
        };
        let mut ctx = ProceedContext::new(&name, frame, trigger, &inputs, &self.outputs);

        let start = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| match invocation {
            Invocation::Single(_) => logic.proceed(&mut ctx),
            Invocation::Group {
                group,
                member_count,
            } => logic.proceed_group(&mut ctx, group, member_count),
        }));
        let elapsed = start.elapsed();

        let pending = match outcome {
            Ok(()) => ctx.into_pending(),
            Err(cause) => {
                error!(
                    node = %name,
                    frame,
                    cause = panic_message(cause.as_ref()),
                    "node logic panicked, outputs for this frame dropped"
                );
                observability::record_filter_panic();
                Vec::new()
            }
        };

        self.record_run(&name, frame, elapsed);
        self.gate.advance_past(frame);
        drop(logic);

        for write in pending {
            write();
        }
        true
    }

    fn record_run(&self, name: &str, frame: FrameId, elapsed: Duration) {
        let mut timing = lock(&self.timing);
        let runtime_ms = timing.record(frame, elapsed);
        if self.settings.debug_timings && timing.processing_index().is_none() {
            timing.set_processing_index(Some(self.sequence.next()));
        }
        drop(timing);

        observability::record_node_runtime(name, runtime_ms);
        if self.timing_logged() {
            trace!(node = %name, frame, runtime_ms, "frame processed");
        }
    }

    /// Force the counter forward to at least `frame` without running logic
    pub fn ensure_frame(&self, frame: FrameId) {
        self.gate.ensure(frame);
    }

    /// Advance past `frame` without running logic or emitting anything
    pub fn skip_frame(&self, frame: FrameId) {
        if self.gate.current() > frame {
            return;
        }
        let _logic = lock(&self.logic);
        if self.gate.current() > frame {
            return;
        }
        self.gate.ensure(frame);
        self.gate.advance_past(frame);
        lock(&self.timing).record_skip();
        observability::record_frame_skipped();
        debug!(node = %self.type_name, frame, "frame skipped");
    }

    /// Overwrite the counter
    pub fn set_counter(&self, frame: FrameId) {
        self.gate.set(frame);
    }

    /// Restart for a new cycle: counter to 0, barriers cleared, state forwarded to the logic
    pub fn arm(&self, state: ArmState) {
        let mut logic = lock(&self.logic);
        self.gate.set(0);
        self.reset_groups();
        if state.restarts_frames() {
            lock(&self.timing).set_processing_index(None);
        }
        logic.arm(state);
        trace!(node = %self.type_name, ?state, "armed");
    }

    pub fn init(&self) {
        lock(&self.logic).init();
    }

    pub fn dispose(&self) {
        lock(&self.logic).dispose();
    }

    pub fn reset_groups(&self) {
        for group in lock(&self.groups).values() {
            group.reset_all();
        }
    }

    pub fn reset_group_slot(&self, frame: FrameId) {
        for group in lock(&self.groups).values() {
            group.reset_slot(frame);
        }
    }

    /// Push a parameter set; unknown keys are ignored, timing restarts
    pub fn set_parameters(&self, params: &ParameterSet) {
        let mut logic = lock(&self.logic);
        for (key, value) in params.iter() {
            if key == VERBOSITY_PARAM {
                match Verbosity::from_param(value) {
                    Some(verbosity) => *lock(&self.verbosity) = verbosity,
                    None => warn!(node = %self.type_name, %value, "invalid verbosity ignored"),
                }
                continue;
            }
            if !logic.set_parameter(key, value) {
                trace!(node = %self.type_name, key, "parameter not recognised");
            }
        }
        drop(logic);
        self.reset_timing();
    }

    pub fn reset_timing(&self) {
        lock(&self.timing).reset();
    }

    pub fn timing_snapshot(&self) -> NodeTimingSnapshot {
        let name = self.name_in_graph();
        lock(&self.timing).snapshot(name)
    }

    pub fn log_processing_time(&self) {
        let snapshot = self.timing_snapshot();
        info!(
            node = %snapshot.name_in_graph,
            processed = snapshot.processed,
            skipped = snapshot.skipped,
            mean_ms = ?snapshot.mean_ms(),
            "{snapshot}"
        );
    }
}

impl SignalTarget for FilterNode {
    fn on_signal(&self, frame: FrameId, channel: &dyn AnyChannel) {
        self.run(frame, Invocation::Single(Some(channel)));
    }
}

impl GroupListener for FilterNode {
    fn on_group_complete(&self, frame: FrameId, group: GroupId, member_count: usize) {
        self.run(
            frame,
            Invocation::Group {
                group,
                member_count,
            },
        );
    }
}

impl Drop for FilterNode {
    fn drop(&mut self) {
        // Join groups go first so their weak targets die with them.
        let groups = std::mem::take(
            self.groups
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner),
        );
        drop(groups);
        let inputs = self
            .inputs
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        for subscription in inputs.iter() {
            subscription.channel.prune_targets();
        }
        for channel in self.outputs.values() {
            channel.clear_targets();
        }
    }
}

impl fmt::Debug for FilterNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterNode")
            .field("id", &self.id())
            .field("type_name", &self.type_name)
            .field("role", &self.role)
            .field("counter", &self.gate.current())
            .field("outputs", &self.outputs.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn panic_message(cause: &(dyn std::any::Any + Send)) -> &str {
    if let Some(msg) = cause.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = cause.downcast_ref::<String>() {
        msg
    } else {
        "unknown panic"
    }
}
