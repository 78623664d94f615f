//! Fan-in barrier over channels sharing one group id.
//!
//! Per member and per ring slot the group keeps a "signaled" flag. When every
//! member is signaled for a slot the flags are cleared and the listener is
//! told once for that frame. A member whose pending frame is older than the
//! arriving one is evicted so a lagging branch cannot pin the barrier.
//!
//! Lock order: the group lock may read channel slots, a channel never holds
//! a slot lock while notifying, and the listener runs after the group lock
//! is released.

use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use contracts::{ring_slot, FrameId, GroupId};
use tracing::{debug, trace, warn};

use crate::channel::{same_channel, AnyChannel, SignalTarget};
use crate::lock;

/// Receiver of barrier completions
pub trait GroupListener: Send + Sync {
    fn on_group_complete(&self, frame: FrameId, group: GroupId, member_count: usize);
}

/// Weak type-erased handle to `listener`
pub fn group_listener<L: GroupListener + 'static>(listener: &Arc<L>) -> Weak<dyn GroupListener> {
    let weak: Weak<L> = Arc::downgrade(listener);
    weak
}

struct GroupState {
    members: Vec<Arc<dyn AnyChannel>>,
    /// `signaled[member][slot]`
    signaled: Vec<Vec<bool>>,
    /// Frame the barrier last fired for, per slot
    last_fired: Vec<Option<FrameId>>,
}

pub struct JoinGroup {
    id: GroupId,
    depth: usize,
    state: Mutex<GroupState>,
    listener: Weak<dyn GroupListener>,
}

impl JoinGroup {
    pub fn new(id: GroupId, depth: usize, listener: Weak<dyn GroupListener>) -> Self {
        let depth = depth.max(1);
        Self {
            id,
            depth,
            state: Mutex::new(GroupState {
                members: Vec::new(),
                signaled: Vec::new(),
                last_fired: vec![None; depth],
            }),
            listener,
        }
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    /// Add a member channel; returns false if it already was one
    pub fn add_member(&self, channel: Arc<dyn AnyChannel>) -> bool {
        let mut state = lock(&self.state);
        if state
            .members
            .iter()
            .any(|m| same_channel(m.as_ref(), channel.as_ref()))
        {
            return false;
        }
        state.members.push(channel);
        state.signaled.push(vec![false; self.depth]);
        true
    }

    /// Remove a member channel; returns false if it was not one
    pub fn remove_member(&self, channel: &dyn AnyChannel) -> bool {
        let mut state = lock(&self.state);
        match state
            .members
            .iter()
            .position(|m| same_channel(m.as_ref(), channel))
        {
            Some(idx) => {
                state.members.remove(idx);
                state.signaled.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn member_count(&self) -> usize {
        lock(&self.state).members.len()
    }

    pub fn members(&self) -> Vec<Arc<dyn AnyChannel>> {
        lock(&self.state).members.clone()
    }

    /// Handle a delivery of `frame` from member `channel`
    pub fn signal(&self, frame: FrameId, channel: &dyn AnyChannel) {
        let slot = ring_slot(frame, self.depth);
        let fired = {
            let mut state = lock(&self.state);
            let Some(member) = state
                .members
                .iter()
                .position(|m| same_channel(m.as_ref(), channel))
            else {
                warn!(group = %self.id, channel = %channel.name(), frame, "signal from non-member channel ignored");
                return;
            };

            assert!(
                !state.signaled[member][slot],
                "channel '{}' signaled group {} twice in slot {} (frame {})",
                channel.name(),
                self.id,
                slot,
                frame
            );
            state.signaled[member][slot] = true;

            // Stale eviction: older pending data in this slot is obsolete.
            for other in 0..state.members.len() {
                if other == member || !state.signaled[other][slot] {
                    continue;
                }
                let pending = state.members[other].last_frame_id(slot);
                if pending.is_some_and(|f| f < frame) {
                    state.signaled[other][slot] = false;
                    debug!(
                        group = %self.id,
                        slot,
                        frame,
                        evicted = %state.members[other].name(),
                        evicted_frame = ?pending,
                        "stale signal evicted"
                    );
                    observability::record_stale_eviction();
                }
            }

            if state.signaled.iter().all(|flags| flags[slot]) {
                for flags in state.signaled.iter_mut() {
                    flags[slot] = false;
                }
                assert!(
                    state.last_fired[slot] != Some(frame),
                    "group {} fired twice for frame {} without reset",
                    self.id,
                    frame
                );
                state.last_fired[slot] = Some(frame);
                Some(state.members.len())
            } else {
                trace!(group = %self.id, slot, frame, "barrier pending");
                None
            }
        };

        if let Some(member_count) = fired {
            observability::record_barrier_fired(self.id);
            if let Some(listener) = self.listener.upgrade() {
                listener.on_group_complete(frame, self.id, member_count);
            }
        }
    }

    /// Clear every flag of every slot
    pub fn reset_all(&self) {
        let mut state = lock(&self.state);
        for flags in state.signaled.iter_mut() {
            flags.fill(false);
        }
        state.last_fired.fill(None);
    }

    /// Clear the flags of the slot `frame` maps to
    pub fn reset_slot(&self, frame: FrameId) {
        let slot = ring_slot(frame, self.depth);
        let mut state = lock(&self.state);
        for flags in state.signaled.iter_mut() {
            flags[slot] = false;
        }
        state.last_fired[slot] = None;
    }

    /// Members currently signaled in the slot of `frame`
    pub fn pending(&self, frame: FrameId) -> usize {
        let slot = ring_slot(frame, self.depth);
        lock(&self.state)
            .signaled
            .iter()
            .filter(|flags| flags[slot])
            .count()
    }

    /// True when no flag is set in any slot
    pub fn is_idle(&self) -> bool {
        lock(&self.state)
            .signaled
            .iter()
            .all(|flags| flags.iter().all(|f| !f))
    }
}

impl SignalTarget for JoinGroup {
    fn on_signal(&self, frame: FrameId, channel: &dyn AnyChannel) {
        self.signal(frame, channel);
    }
}

impl fmt::Debug for JoinGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinGroup")
            .field("id", &self.id)
            .field("depth", &self.depth)
            .field("members", &self.member_count())
            .finish()
    }
}
