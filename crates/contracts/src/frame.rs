//! Frame identity and ring-slot arithmetic.
//!
//! ## Time Model
//! - `FrameId` is a monotonically increasing unit-of-work counter (one image
//!   or one sample burst), restarted at 0 whenever a graph is armed
//! - A fixed ring depth P bounds how many frames may be in flight; all
//!   per-frame bookkeeping lives in slot `frame % P`

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one unit of streamed work
pub type FrameId = u64;

/// Slot index of `frame` in a ring of depth `depth`.
///
/// `depth` must be non-zero; `EngineConfig` validation guarantees that for
/// every depth the engine is built with.
#[inline]
pub fn ring_slot(frame: FrameId, depth: usize) -> usize {
    debug_assert!(depth > 0, "ring depth must be non-zero");
    (frame % depth as u64) as usize
}

/// Join group identifier of an input subscription.
///
/// Group 0 means "fire on every arrival"; any other value names the barrier
/// the subscribed channel belongs to.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct GroupId(pub u32);

impl GroupId {
    /// No barrier: the handler runs on each single arrival
    pub const IMMEDIATE: GroupId = GroupId(0);

    /// True for group 0
    #[inline]
    pub fn is_immediate(self) -> bool {
        self.0 == 0
    }
}

impl From<u32> for GroupId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A payload together with the frame that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Packet<T> {
    pub frame: FrameId,
    pub payload: T,
}

impl<T> Packet<T> {
    pub fn new(frame: FrameId, payload: T) -> Self {
        Self { frame, payload }
    }
}
