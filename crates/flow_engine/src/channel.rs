//! Typed, named channels with per-slot packet storage and fan-out.
//!
//! A channel keeps one `Packet` per ring slot. Writing stores the packet
//! under that slot's lock, releases it, then notifies every installed target
//! on the writer's thread. Targets are held weakly: a channel never keeps a
//! consumer alive.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, RwLock, Weak};

use contracts::{ring_slot, ChannelName, FrameId, Packet};

use crate::{lock, read_lock, write_lock, NodeId};

/// Anything that can travel on a channel
pub trait Payload: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> Payload for T {}

/// Receiver of channel write notifications
pub trait SignalTarget: Send + Sync {
    fn on_signal(&self, frame: FrameId, channel: &dyn AnyChannel);
}

/// Weak type-erased handle to `target`, as channels store their receivers
pub fn signal_target<S: SignalTarget + 'static>(target: &Arc<S>) -> Weak<dyn SignalTarget> {
    let weak: Weak<S> = Arc::downgrade(target);
    weak
}

/// Type-erased view of a `Channel<T>`
pub trait AnyChannel: Send + Sync + 'static {
    fn name(&self) -> &ChannelName;

    /// Node that owns (writes) this channel; None for external feeds
    fn owner(&self) -> Option<NodeId>;

    /// Record the owning node; only the first call has an effect
    fn bind_owner(&self, owner: NodeId);

    fn payload_type(&self) -> TypeId;

    fn payload_type_name(&self) -> &'static str;

    /// Ring depth P
    fn depth(&self) -> usize;

    /// Frame last written into `slot`, if any
    fn last_frame_id(&self, slot: usize) -> Option<FrameId>;

    /// Add a notification target. Installing the same target twice is a no-op.
    fn install(&self, target: Weak<dyn SignalTarget>);

    /// Remove a notification target. Removing an unknown target is a no-op.
    fn uninstall(&self, target: &Weak<dyn SignalTarget>);

    /// Drop targets whose consumer no longer exists
    fn prune_targets(&self);

    fn clear_targets(&self);

    /// Live notification targets
    fn target_count(&self) -> usize;

    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl fmt::Debug for dyn AnyChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyChannel")
            .field("name", self.name())
            .field("owner", &self.owner())
            .field("payload", &self.payload_type_name())
            .finish()
    }
}

/// True if both views refer to the same channel object
#[inline]
pub fn same_channel(a: &dyn AnyChannel, b: &dyn AnyChannel) -> bool {
    std::ptr::addr_eq(a as *const dyn AnyChannel, b as *const dyn AnyChannel)
}

/// Typed channel carrying one `T` per frame
pub struct Channel<T: Payload> {
    name: ChannelName,
    owner: OnceLock<NodeId>,
    slots: Box<[Mutex<Option<Packet<T>>>]>,
    targets: RwLock<Vec<Weak<dyn SignalTarget>>>,
}

impl<T: Payload> Channel<T> {
    /// Create a channel with `depth` ring slots (at least one)
    pub fn new(name: impl Into<ChannelName>, depth: usize) -> Self {
        let slots = (0..depth.max(1)).map(|_| Mutex::new(None)).collect();
        Self {
            name: name.into(),
            owner: OnceLock::new(),
            slots,
            targets: RwLock::new(Vec::new()),
        }
    }

    /// Store `payload` for `frame` and notify all targets
    pub fn write(&self, frame: FrameId, payload: T) {
        let slot = ring_slot(frame, self.slots.len());
        {
            let mut packet = lock(&self.slots[slot]);
            *packet = Some(Packet::new(frame, payload));
        }

        let targets: Vec<Arc<dyn SignalTarget>> = read_lock(&self.targets)
            .iter()
            .filter_map(Weak::upgrade)
            .collect();

        tracing::trace!(
            channel = %self.name,
            frame,
            slot,
            targets = targets.len(),
            "channel write"
        );

        for target in targets {
            target.on_signal(frame, self);
        }
    }

    /// Payload for `frame`, if its slot still holds that frame
    pub fn read(&self, frame: FrameId) -> Option<T> {
        let slot = ring_slot(frame, self.slots.len());
        lock(&self.slots[slot])
            .as_ref()
            .filter(|packet| packet.frame == frame)
            .map(|packet| packet.payload.clone())
    }

    /// Latest packet in the slot of `frame`, whatever frame it belongs to
    pub fn peek_slot(&self, frame: FrameId) -> Option<Packet<T>> {
        let slot = ring_slot(frame, self.slots.len());
        lock(&self.slots[slot]).clone()
    }
}

impl<T: Payload> fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.name)
            .field("owner", &self.owner.get())
            .field("depth", &self.slots.len())
            .field("targets", &self.target_count())
            .finish()
    }
}

impl<T: Payload> AnyChannel for Channel<T> {
    fn name(&self) -> &ChannelName {
        &self.name
    }

    fn owner(&self) -> Option<NodeId> {
        self.owner.get().copied()
    }

    fn bind_owner(&self, owner: NodeId) {
        let _ = self.owner.set(owner);
    }

    fn payload_type(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn payload_type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn depth(&self) -> usize {
        self.slots.len()
    }

    fn last_frame_id(&self, slot: usize) -> Option<FrameId> {
        self.slots
            .get(slot)
            .and_then(|s| lock(s).as_ref().map(|packet| packet.frame))
    }

    fn install(&self, target: Weak<dyn SignalTarget>) {
        let mut targets = write_lock(&self.targets);
        targets.retain(|t| t.strong_count() > 0);
        if !targets.iter().any(|t| Weak::ptr_eq(t, &target)) {
            targets.push(target);
        }
    }

    fn uninstall(&self, target: &Weak<dyn SignalTarget>) {
        write_lock(&self.targets).retain(|t| !Weak::ptr_eq(t, target) && t.strong_count() > 0);
    }

    fn prune_targets(&self) {
        write_lock(&self.targets).retain(|t| t.strong_count() > 0);
    }

    fn clear_targets(&self) {
        write_lock(&self.targets).clear();
    }

    fn target_count(&self) -> usize {
        read_lock(&self.targets)
            .iter()
            .filter(|t| t.strong_count() > 0)
            .count()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
