//! Filters and helpers shared by the integration tests.

use std::any::TypeId;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use contracts::{
    ArmState, ChannelName, EngineConfig, EngineError, FrameId, GroupId, ImageFrame, ParamValue,
    SensorId,
};
use flow_engine::{AnyChannel, Filter, OutputRegistry, ProceedContext};

/// One logic invocation seen by a `Recorder`
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Single { frame: FrameId, value: Option<i64> },
    Group {
        frame: FrameId,
        group: GroupId,
        member_count: usize,
        values: Vec<(ChannelName, i64)>,
    },
}

impl Call {
    pub fn frame(&self) -> FrameId {
        match self {
            Call::Single { frame, .. } | Call::Group { frame, .. } => *frame,
        }
    }
}

pub type CallLog = Arc<Mutex<Vec<Call>>>;

/// Logs every invocation and forwards (the sum of) its `i64` inputs on "Out"
pub struct Recorder {
    name: &'static str,
    calls: CallLog,
    lifecycle: Option<Arc<Mutex<Vec<String>>>>,
}

impl Recorder {
    pub fn new(name: &'static str) -> (Self, CallLog) {
        let calls = CallLog::default();
        (
            Self {
                name,
                calls: calls.clone(),
                lifecycle: None,
            },
            calls,
        )
    }

    /// Also log init/arm/dispose hooks, tagged with the type name
    pub fn with_lifecycle(mut self, log: Arc<Mutex<Vec<String>>>) -> Self {
        self.lifecycle = Some(log);
        self
    }

    fn hook(&self, what: &str) {
        if let Some(log) = &self.lifecycle {
            log.lock().unwrap().push(format!("{}:{}", self.name, what));
        }
    }
}

impl Filter for Recorder {
    fn type_name(&self) -> &str {
        self.name
    }

    fn declare_outputs(&self, outputs: &mut OutputRegistry) -> Result<(), EngineError> {
        outputs.add::<i64>("Out")
    }

    fn accepts(&self, channel: &dyn AnyChannel) -> bool {
        channel.payload_type() == TypeId::of::<i64>()
    }

    fn proceed(&mut self, ctx: &mut ProceedContext<'_>) {
        let value = ctx.trigger_payload::<i64>();
        self.calls.lock().unwrap().push(Call::Single {
            frame: ctx.frame(),
            value,
        });
        if let Some(v) = value {
            ctx.emit("Out", v).unwrap();
        }
    }

    fn proceed_group(&mut self, ctx: &mut ProceedContext<'_>, group: GroupId, member_count: usize) {
        let values = ctx.read_all::<i64>();
        let sum = values.iter().map(|(_, v)| v).sum::<i64>();
        self.calls.lock().unwrap().push(Call::Group {
            frame: ctx.frame(),
            group,
            member_count,
            values,
        });
        ctx.emit("Out", sum).unwrap();
    }

    fn arm(&mut self, state: ArmState) {
        self.hook(&format!("arm({state:?})"));
    }

    fn init(&mut self) {
        self.hook("init");
    }

    fn dispose(&mut self) {
        self.hook("dispose");
    }
}

/// Mean brightness of an image, with a configurable scale
pub struct Brightness {
    scale: f64,
}

impl Brightness {
    pub fn new() -> Self {
        Self { scale: 1.0 }
    }
}

impl Default for Brightness {
    fn default() -> Self {
        Self::new()
    }
}

impl Filter for Brightness {
    fn type_name(&self) -> &str {
        "Brightness"
    }

    fn declare_outputs(&self, outputs: &mut OutputRegistry) -> Result<(), EngineError> {
        outputs.add::<f64>("Mean")
    }

    fn accepts(&self, channel: &dyn AnyChannel) -> bool {
        channel.payload_type() == TypeId::of::<ImageFrame>()
    }

    fn proceed(&mut self, ctx: &mut ProceedContext<'_>) {
        if let Some(image) = ctx.trigger_payload::<ImageFrame>() {
            ctx.emit("Mean", image.mean() * self.scale).unwrap();
        }
    }

    fn set_parameter(&mut self, key: &str, value: &ParamValue) -> bool {
        match (key, value.as_f64()) {
            ("Scale", Some(scale)) => {
                self.scale = scale;
                true
            }
            _ => false,
        }
    }
}

/// Uniform image of `width` x `height` pixels
pub fn flat_image(sensor: SensorId, width: u32, height: u32, level: u8) -> ImageFrame {
    let data = vec![level; (width * height) as usize];
    ImageFrame::new(sensor, width, height, Bytes::from(data))
}

pub fn config_with_depth(ring_depth: usize) -> EngineConfig {
    EngineConfig {
        ring_depth,
        ..Default::default()
    }
}
