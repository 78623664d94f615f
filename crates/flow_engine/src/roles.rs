//! Boundary node roles: sources republishing sensor feeds, sinks handing
//! payloads out of the graph, and result nodes producing `ResultFrame`s.

use std::any::TypeId;
use std::marker::PhantomData;

use contracts::{ChannelName, EngineError, FrameId, GroupId, ResultFrame, SensorSelector};
use tracing::{trace, warn};

use crate::channel::{AnyChannel, Payload};
use crate::node::{Filter, NodeRole, OutputRegistry, ProceedContext};

/// Output name of every result node
pub const RESULT_OUTPUT: &str = "Result";

fn carries<T: Payload>(channel: &dyn AnyChannel) -> bool {
    channel.payload_type() == TypeId::of::<T>()
}

/// Republishes packets of one sensor feed on its single output
pub struct SourceNode<T> {
    type_name: String,
    output: ChannelName,
    sensor: SensorSelector,
    _payload: PhantomData<fn() -> T>,
}

impl<T: Payload> SourceNode<T> {
    pub fn new(type_name: impl Into<String>, output: &str, sensor: SensorSelector) -> Self {
        Self {
            type_name: type_name.into(),
            output: ChannelName::from(output),
            sensor,
            _payload: PhantomData,
        }
    }
}

impl<T: Payload> Filter for SourceNode<T> {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn role(&self) -> NodeRole {
        NodeRole::Source
    }

    fn sensor(&self) -> Option<SensorSelector> {
        Some(self.sensor)
    }

    fn declare_outputs(&self, outputs: &mut OutputRegistry) -> Result<(), EngineError> {
        outputs.add::<T>(&self.output)
    }

    fn accepts(&self, channel: &dyn AnyChannel) -> bool {
        carries::<T>(channel)
    }

    fn proceed(&mut self, ctx: &mut ProceedContext<'_>) {
        let Some(payload) = ctx.trigger_payload::<T>() else {
            // Manual run or the slot was already overwritten.
            trace!(node = ctx.node_name(), frame = ctx.frame(), "nothing to republish");
            return;
        };
        if let Err(e) = ctx.emit(&self.output, payload) {
            warn!(node = ctx.node_name(), error = %e, "republish failed");
        }
    }
}

/// Hands every payload it receives to an external handler
pub struct SinkNode<T, F> {
    type_name: String,
    handler: F,
    _payload: PhantomData<fn(T)>,
}

impl<T, F> SinkNode<T, F>
where
    T: Payload,
    F: FnMut(FrameId, T) + Send + 'static,
{
    pub fn new(type_name: impl Into<String>, handler: F) -> Self {
        Self {
            type_name: type_name.into(),
            handler,
            _payload: PhantomData,
        }
    }
}

impl<T, F> Filter for SinkNode<T, F>
where
    T: Payload,
    F: FnMut(FrameId, T) + Send + 'static,
{
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn role(&self) -> NodeRole {
        NodeRole::Sink
    }

    fn accepts(&self, channel: &dyn AnyChannel) -> bool {
        carries::<T>(channel)
    }

    fn proceed(&mut self, ctx: &mut ProceedContext<'_>) {
        if let Some(payload) = ctx.trigger_payload::<T>() {
            (self.handler)(ctx.frame(), payload);
        }
    }

    fn proceed_group(&mut self, ctx: &mut ProceedContext<'_>, _group: GroupId, _member_count: usize) {
        for (_, payload) in ctx.read_all::<T>() {
            (self.handler)(ctx.frame(), payload);
        }
    }
}

/// Evaluates one payload type into a `ResultFrame`
pub struct ResultNode<T, F> {
    type_name: String,
    evaluate: F,
    _payload: PhantomData<fn(&T)>,
}

impl<T, F> ResultNode<T, F>
where
    T: Payload,
    F: FnMut(FrameId, &T) -> ResultFrame + Send + 'static,
{
    pub fn new(type_name: impl Into<String>, evaluate: F) -> Self {
        Self {
            type_name: type_name.into(),
            evaluate,
            _payload: PhantomData,
        }
    }

    fn publish(&mut self, ctx: &mut ProceedContext<'_>, payload: &T) {
        let result = (self.evaluate)(ctx.frame(), payload);
        if let Err(e) = ctx.emit(RESULT_OUTPUT, result) {
            warn!(node = ctx.node_name(), error = %e, "result not published");
        }
    }
}

impl<T, F> Filter for ResultNode<T, F>
where
    T: Payload,
    F: FnMut(FrameId, &T) -> ResultFrame + Send + 'static,
{
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn role(&self) -> NodeRole {
        NodeRole::Result
    }

    fn declare_outputs(&self, outputs: &mut OutputRegistry) -> Result<(), EngineError> {
        outputs.add::<ResultFrame>(RESULT_OUTPUT)
    }

    fn accepts(&self, channel: &dyn AnyChannel) -> bool {
        carries::<T>(channel)
    }

    fn proceed(&mut self, ctx: &mut ProceedContext<'_>) {
        if let Some(payload) = ctx.trigger_payload::<T>() {
            self.publish(ctx, &payload);
        }
    }

    /// Grouped inputs yield one result per frame, from the first member present
    fn proceed_group(&mut self, ctx: &mut ProceedContext<'_>, _group: GroupId, _member_count: usize) {
        if let Some((_, payload)) = ctx.read_all::<T>().into_iter().next() {
            self.publish(ctx, &payload);
        }
    }
}
