//! Application callback and the slot it is registered in.

use crate::bridge::BlockState;
use crate::buffer::{InputChannels, OutputChannels};
use crate::device::AudioIODevice;
use std::sync::{Arc, LockResult, Mutex, MutexGuard, PoisonError, Weak};

/// Application-facing audio callback.
///
/// `io_callback` runs on the realtime thread. Implementations must not block
/// or allocate there; the other methods run on the management thread.
pub trait AudioIODeviceCallback: Send + Sync {
    fn about_to_start(&self, device: &dyn AudioIODevice);

    fn stopped(&self);

    fn io_callback(
        &self,
        inputs: &InputChannels<'_>,
        outputs: &mut OutputChannels<'_>,
        num_samples: usize,
    );

    fn device_error(&self, _message: &str) {}
}

pub(crate) struct CallbackSlot {
    pub(crate) callback: Option<Weak<dyn AudioIODeviceCallback>>,
    /// Last strong reference to a callback whose owner dropped it mid-block,
    /// parked by the realtime path until the management thread releases it.
    pub(crate) retired: Option<Arc<dyn AudioIODeviceCallback>>,
    pub(crate) block: BlockState,
}

/// Holds the registered callback behind the lock the realtime path takes for
/// every block.
///
/// The device never owns the callback: only a `Weak` is stored and a callback
/// dropped by its owner while registered behaves like an empty slot.
///
/// The critical section is shared with the realtime thread, so everything
/// done under it is bounded: a pointer swap here, the per-block pointer
/// mapping and the callback itself on the realtime side. Notifications run
/// outside of it. A management thread that is descheduled while holding the
/// lock delays the next block; that shows up as an xrun, never as a
/// half-installed callback.
///
/// An `AtomicPtr` swap would take the lock off the realtime path but needs
/// deferred reclamation of the outgoing callback, which this type avoids.
pub struct CallbackRegistry {
    slot: Mutex<CallbackSlot>,
}

impl Default for CallbackRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(CallbackSlot {
                callback: None,
                retired: None,
                block: BlockState::default(),
            }),
        }
    }

    /// Realtime-side access. A poisoned lock is reported to the caller instead
    /// of being recovered, the realtime path skips the block in that case.
    pub(crate) fn lock(&self) -> LockResult<MutexGuard<'_, CallbackSlot>> {
        self.slot.lock()
    }

    pub(crate) fn lock_management(&self) -> MutexGuard<'_, CallbackSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `callback`, replacing the current one.
    ///
    /// When `running` carries the device, the incoming callback is told the
    /// device is about to start before it becomes visible to the realtime
    /// thread and the outgoing one is told it stopped once it can no longer
    /// be called. A retired callback counts as the outgoing one. Installing
    /// the callback that is already registered is a no-op.
    pub fn install(
        &self,
        callback: Option<&Arc<dyn AudioIODeviceCallback>>,
        running: Option<&dyn AudioIODevice>,
    ) {
        let incoming = callback.map(Arc::downgrade);
        {
            let slot = self.lock_management();
            let unchanged = match (&slot.callback, &incoming) {
                (Some(current), Some(new)) => Weak::ptr_eq(current, new),
                (None, None) => true,
                _ => false,
            } && slot.retired.is_none();
            if unchanged {
                return;
            }
        }

        if let (Some(device), Some(callback)) = (running, callback) {
            callback.about_to_start(device);
        }

        let (outgoing, retired) = {
            let mut slot = self.lock_management();
            let outgoing = std::mem::replace(&mut slot.callback, incoming);
            (outgoing, slot.retired.take())
        };

        let outgoing = outgoing.and_then(|cb| cb.upgrade()).or(retired);
        if let (Some(_), Some(outgoing)) = (running, outgoing) {
            outgoing.stopped();
        }
    }

    pub fn current_callback(&self) -> Option<Arc<dyn AudioIODeviceCallback>> {
        self.lock_management()
            .callback
            .as_ref()
            .and_then(Weak::upgrade)
    }

    /// True while a callback is registered and still alive.
    pub fn is_registered(&self) -> bool {
        self.lock_management()
            .callback
            .as_ref()
            .is_some_and(|cb| cb.strong_count() > 0)
    }

    /// Empty the slot and hand back the callback that was registered, or the
    /// retired one. No notification is sent; the caller decides whether it
    /// owes a `stopped`.
    pub fn clear(&self) -> Option<Arc<dyn AudioIODeviceCallback>> {
        let (current, retired) = {
            let mut slot = self.lock_management();
            (slot.callback.take(), slot.retired.take())
        };
        current.and_then(|cb| cb.upgrade()).or(retired)
    }

    /// Hand the retired callback, if any, to the management thread.
    pub fn take_retired(&self) -> Option<Arc<dyn AudioIODeviceCallback>> {
        self.lock_management().retired.take()
    }
}
