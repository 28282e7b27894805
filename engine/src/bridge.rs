//! Per-block entry point called by the transport on its realtime thread.

use crate::buffer::ChannelPointers;
use crate::callback::CallbackRegistry;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

/// Xrun counter value while the device has never been opened or was closed.
pub const XRUNS_UNKNOWN: i64 = -1;

/// Realtime-side state of the open device, guarded by the registry lock.
#[derive(Debug, Default)]
pub(crate) struct BlockState {
    pub(crate) channels: ChannelPointers,
    pub(crate) block_size: usize,
    pub(crate) sample_rate: f64,
    pub(crate) last_block: Option<Instant>,
}

pub struct RealtimeBridge {
    registry: CallbackRegistry,
    xruns: AtomicI64,
    invalid_blocks: AtomicU64,
}

impl Default for RealtimeBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl RealtimeBridge {
    pub fn new() -> Self {
        Self {
            registry: CallbackRegistry::new(),
            xruns: AtomicI64::new(XRUNS_UNKNOWN),
            invalid_blocks: AtomicU64::new(0),
        }
    }

    pub fn registry(&self) -> &CallbackRegistry {
        &self.registry
    }

    pub fn xrun_count(&self) -> i64 {
        self.xruns.load(Ordering::Acquire)
    }

    /// Blocks whose regions were missing while channels were expected.
    pub fn invalid_blocks(&self) -> u64 {
        self.invalid_blocks.load(Ordering::Acquire)
    }

    /// Size the pointer arrays for a freshly opened device. Arrays from a
    /// previous open are dropped, never reused.
    pub(crate) fn configure(
        &self,
        num_inputs: usize,
        num_outputs: usize,
        block_size: usize,
        sample_rate: f64,
    ) {
        let mut slot = self.registry.lock_management();
        slot.block = BlockState {
            channels: ChannelPointers::new(num_inputs, num_outputs),
            block_size,
            sample_rate,
            last_block: None,
        };
        drop(slot);
        self.xruns.store(0, Ordering::Release);
        self.invalid_blocks.store(0, Ordering::Release);
    }

    pub(crate) fn release(&self) {
        self.registry.lock_management().block = BlockState::default();
        self.xruns.store(XRUNS_UNKNOWN, Ordering::Release);
    }

    /// Forget the previous block time so the gap across a stop/start is not
    /// counted as an xrun.
    pub(crate) fn rearm(&self) {
        self.registry.lock_management().block.last_block = None;
    }

    /// Process one block. Realtime safe: no allocation, no logging, the only
    /// synchronisation is the registry lock.
    ///
    /// A callback whose owner let go of it during the block is moved to the
    /// registry's retired slot instead of being dropped here; the management
    /// thread releases it.
    ///
    /// # Safety
    ///
    /// With channels configured in a direction, the matching region must be
    /// either null or valid for `channels * block_size` samples of the last
    /// `configure` call until this returns. `output` must be writable and the
    /// regions must not overlap.
    pub unsafe fn process(&self, input: *const f32, output: *mut f32) {
        let Ok(mut guard) = self.registry.lock() else {
            return;
        };
        let slot = &mut *guard;

        let now = Instant::now();
        let block = &mut slot.block;
        if let Some(last) = block.last_block.replace(now) {
            if xrun_gap(now.saturating_duration_since(last), block.sample_rate, block.block_size) > 0 {
                // Single writer: only the realtime thread increments.
                self.xruns.fetch_add(1, Ordering::AcqRel);
            }
        }

        let Some(callback) = slot.callback.as_ref().and_then(Weak::upgrade) else {
            return;
        };

        let frames = slot.block.block_size;
        // SAFETY: forwarded from the caller contract.
        match unsafe { slot.block.channels.map(input, output, frames) } {
            Some((inputs, mut outputs)) => callback.io_callback(&inputs, &mut outputs, frames),
            None => {
                self.invalid_blocks.fetch_add(1, Ordering::AcqRel);
            }
        }

        // Install and clear drain the retired slot, so it is empty whenever a
        // live callback is registered.
        if Arc::strong_count(&callback) == 1 && slot.retired.is_none() {
            slot.callback = None;
            slot.retired = Some(callback);
        }
    }
}

/// Frames lost between two blocks, or 0 when `elapsed` is within two block
/// periods.
pub fn xrun_gap(elapsed: Duration, sample_rate: f64, block_size: usize) -> u64 {
    if sample_rate <= 0.0 || block_size == 0 {
        return 0;
    }
    let elapsed_frames = (elapsed.as_secs_f64() * sample_rate) as u64;
    let period = block_size as u64;
    if elapsed_frames > period * 2 {
        elapsed_frames - period
    } else {
        0
    }
}
