//! Control-plane vocabulary: arm states, verbosity and parameter sets.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Point in the inspection cycle at which a graph is armed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArmState {
    /// A series of cycles begins
    SeriesStart,
    /// One cycle begins; frame counters restart at 0
    CycleStart,
    /// One cycle ends
    CycleEnd,
    /// The series ends
    SeriesEnd,
}

impl ArmState {
    /// States that restart frame numbering
    #[inline]
    pub fn restarts_frames(self) -> bool {
        matches!(self, ArmState::SeriesStart | ArmState::CycleStart)
    }
}

/// Amount of diagnostic output a node produces
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Verbosity {
    None,
    #[default]
    Low,
    Medium,
    High,
    Max,
}

impl Verbosity {
    /// Map the integer encoding used by parameter sets
    pub fn from_level(level: i64) -> Self {
        match level {
            i64::MIN..=0 => Verbosity::None,
            1 => Verbosity::Low,
            2 => Verbosity::Medium,
            3 => Verbosity::High,
            _ => Verbosity::Max,
        }
    }

    /// Decode a parameter value (level number or name)
    pub fn from_param(value: &ParamValue) -> Option<Self> {
        match value {
            ParamValue::Int(level) => Some(Self::from_level(*level)),
            ParamValue::Text(name) => name.parse().ok(),
            _ => None,
        }
    }
}

impl FromStr for Verbosity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Verbosity::None),
            "low" => Ok(Verbosity::Low),
            "medium" => Ok(Verbosity::Medium),
            "high" => Ok(Verbosity::High),
            "max" => Ok(Verbosity::Max),
            other => Err(format!("unknown verbosity '{other}'")),
        }
    }
}

/// Value of a single node parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            ParamValue::Bool(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Float(v) => Some(*v),
            ParamValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(v) => Some(*v),
            ParamValue::Int(v) => Some(*v != 0),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(v) => write!(f, "{v}"),
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Text(v) => f.write_str(v),
        }
    }
}

/// Named parameters pushed into every node of a graph.
///
/// Keys are matched against what each node declares; unknown keys are
/// ignored by nodes that do not recognise them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet(BTreeMap<String, ParamValue>);

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: ParamValue) -> Self {
        self.0.insert(key.into(), value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: ParamValue) -> Option<ParamValue> {
        self.0.insert(key.into(), value)
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
