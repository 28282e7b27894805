//! Block-scoped channel views over planar transport buffers.
//!
//! The transport hands over one flat region per direction laid out channel
//! after channel (`region[ch * frames + frame]`). Mapping it to per-channel
//! buffers is pointer arithmetic only: the pointer arrays are allocated when
//! the device is opened and rewritten in place every block.

use std::marker::PhantomData;
use std::ptr;
use std::slice;

/// Per-channel pointer arrays owned by the adapter.
#[derive(Debug, Default)]
pub struct ChannelPointers {
    inputs: Vec<*const f32>,
    outputs: Vec<*mut f32>,
}

// SAFETY: the pointers are plain addresses between blocks and are only
// dereferenced through the views returned by `map`, on the thread that
// mapped them.
unsafe impl Send for ChannelPointers {}

impl ChannelPointers {
    pub fn new(num_inputs: usize, num_outputs: usize) -> Self {
        Self {
            inputs: vec![ptr::null(); num_inputs],
            outputs: vec![ptr::null_mut(); num_outputs],
        }
    }

    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    pub fn num_outputs(&self) -> usize {
        self.outputs.len()
    }

    /// Map planar `input`/`output` regions of `frames` samples per channel.
    ///
    /// Returns `None` when a region is null but channels are expected in that
    /// direction.
    ///
    /// # Safety
    ///
    /// Non-null regions must be valid for `channels * frames` samples for the
    /// lifetime of the returned views, the output region must be writable and
    /// the two regions must not overlap.
    pub unsafe fn map(
        &mut self,
        input: *const f32,
        output: *mut f32,
        frames: usize,
    ) -> Option<(InputChannels<'_>, OutputChannels<'_>)> {
        if (input.is_null() && !self.inputs.is_empty())
            || (output.is_null() && !self.outputs.is_empty())
        {
            return None;
        }
        for (ch, slot) in self.inputs.iter_mut().enumerate() {
            // SAFETY: within the region per the caller contract.
            *slot = unsafe { input.add(ch * frames) };
        }
        for (ch, slot) in self.outputs.iter_mut().enumerate() {
            // SAFETY: within the region per the caller contract.
            *slot = unsafe { output.add(ch * frames) };
        }
        Some((
            InputChannels {
                ptrs: &self.inputs,
                frames,
            },
            OutputChannels {
                ptrs: &self.outputs,
                frames,
                _marker: PhantomData,
            },
        ))
    }
}

/// Read-only per-channel view of the input region of one block.
#[derive(Debug, Clone, Copy)]
pub struct InputChannels<'a> {
    ptrs: &'a [*const f32],
    frames: usize,
}

impl<'a> InputChannels<'a> {
    pub fn num_channels(&self) -> usize {
        self.ptrs.len()
    }

    pub fn num_samples(&self) -> usize {
        self.frames
    }

    pub fn channel(&self, index: usize) -> Option<&'a [f32]> {
        let ptr = *self.ptrs.get(index)?;
        // SAFETY: established by `ChannelPointers::map`.
        Some(unsafe { slice::from_raw_parts(ptr, self.frames) })
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a [f32]> + use<'a> {
        let view = *self;
        (0..view.ptrs.len()).filter_map(move |ch| view.channel(ch))
    }

    /// Raw channel pointers for callers that forward the block to C code.
    pub fn as_ptrs(&self) -> &'a [*const f32] {
        self.ptrs
    }
}

/// Writable per-channel view of the output region of one block.
#[derive(Debug)]
pub struct OutputChannels<'a> {
    ptrs: &'a [*mut f32],
    frames: usize,
    _marker: PhantomData<&'a mut [f32]>,
}

impl OutputChannels<'_> {
    pub fn num_channels(&self) -> usize {
        self.ptrs.len()
    }

    pub fn num_samples(&self) -> usize {
        self.frames
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        let ptr = *self.ptrs.get(index)?;
        // SAFETY: established by `ChannelPointers::map`.
        Some(unsafe { slice::from_raw_parts(ptr, self.frames) })
    }

    pub fn channel_mut(&mut self, index: usize) -> Option<&mut [f32]> {
        let ptr = *self.ptrs.get(index)?;
        // SAFETY: established by `ChannelPointers::map`; `&mut self` keeps
        // this the only live slice into the region.
        Some(unsafe { slice::from_raw_parts_mut(ptr, self.frames) })
    }

    pub fn clear(&mut self) {
        for ch in 0..self.ptrs.len() {
            if let Some(channel) = self.channel_mut(ch) {
                channel.fill(0.0);
            }
        }
    }

    pub fn as_ptrs(&self) -> &[*mut f32] {
        self.ptrs
    }
}
