//! # Flow Engine
//!
//! Streaming dataflow graph driven by frame numbers.
//!
//! - `Channel`: typed ring of the last few packets, signalling subscribers on write
//! - `JoinGroup`: barrier firing once every member channel delivered a frame
//! - `FilterNode`: runs its `Filter` for frames strictly in order
//! - `SourceNode` / `SinkNode` / `ResultNode`: boundary roles
//! - `Visitor` / `GraphOp`: control plane applied to every node of a `Graph`
//!
//! ## Example
//!
//! ```ignore
//! use flow_engine::{Graph, GraphOp, SinkNode, SourceNode};
//!
//! let mut graph = Graph::new(EngineConfig::default());
//! let camera = graph.add_node(SourceNode::<ImageFrame>::new("Camera", "Image", SensorSelector::Any))?;
//! let sink = graph.add_node(SinkNode::<ImageFrame>::new("Store", |frame, image| store(frame, image)))?;
//! graph.connect(camera, "Image", sink, GroupId::IMMEDIATE)?;
//!
//! graph.arm(ArmState::CycleStart);
//! let mut wire = WireSensor::new(feed.clone(), SensorId(0));
//! graph.apply(&mut wire);
//! feed.write(0, image);
//! ```

mod channel;
mod gate;
mod graph;
mod join_group;
mod node;
mod roles;
mod timing;
mod visitor;

use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub use channel::{same_channel, signal_target, AnyChannel, Channel, Payload, SignalTarget};
pub use gate::FrameGate;
pub use graph::{Graph, ProcessingSequence};
pub use join_group::{group_listener, GroupListener, JoinGroup};
pub use node::{
    Filter, FilterNode, InputInfo, NodeId, NodeRole, NodeSettings, OutputRegistry,
    ProceedContext, Subscription, VERBOSITY_PARAM,
};
pub use roles::{ResultNode, SinkNode, SourceNode, RESULT_OUTPUT};
pub use timing::NodeTiming;
pub use visitor::{
    CollectSensorIds, CollectTiming, CountProcessedFrames, GraphOp, IndexNodes, UnwireSensor,
    Visitor, WireRole, WireSensor,
};

// Re-export contracts types
pub use contracts::{
    ArmState, ChannelName, EngineConfig, EngineError, FrameId, GroupId, NodeTimingSnapshot,
    Packet, ParamValue, ParameterSet, ResultFrame, SensorId, SensorSelector, TimingReport,
    Verbosity,
};

// A panic inside node logic is caught while the logic lock is held; the
// protected state is still consistent, so poisoning is ignored everywhere.

pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn read_lock<T: ?Sized>(rw: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    rw.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write_lock<T: ?Sized>(rw: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    rw.write().unwrap_or_else(PoisonError::into_inner)
}
