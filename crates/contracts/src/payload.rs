//! Payload types carried on channels.
//!
//! Channels are generic over their payload, these are the ones shipped with
//! the engine: raw frames from sensors and the summary a result node emits.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::SensorId;

/// One camera image (zero-copy pixel storage)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageFrame {
    /// Sensor the image was captured by
    pub sensor_id: SensorId,

    pub width: u32,

    pub height: u32,

    /// Row-major 8-bit grey pixels
    pub data: Bytes,
}

impl ImageFrame {
    pub fn new(sensor_id: SensorId, width: u32, height: u32, data: Bytes) -> Self {
        Self {
            sensor_id,
            width,
            height,
            data,
        }
    }

    /// Pixel value at (x, y), None when out of bounds
    pub fn pixel(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = y as usize * self.width as usize + x as usize;
        self.data.get(idx).copied()
    }

    /// Mean grey level, 0.0 for an empty image
    pub fn mean(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        let sum: u64 = self.data.iter().map(|&p| u64::from(p)).sum();
        sum as f64 / self.data.len() as f64
    }
}

/// A burst of scalar samples (line scan, encoder, ...)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleFrame {
    pub sensor_id: Option<SensorId>,
    pub samples: Vec<f64>,
}

/// Inspection verdict produced by a result node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultFrame {
    /// Result category, e.g. the name of the measurement
    pub kind: String,

    /// Measured values
    pub values: Vec<f64>,

    /// Not-in-order flag: the inspected part failed
    pub is_nio: bool,
}

impl ResultFrame {
    pub fn io(kind: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            kind: kind.into(),
            values,
            is_nio: false,
        }
    }

    pub fn nio(kind: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            kind: kind.into(),
            values,
            is_nio: true,
        }
    }
}
