use std::fmt;

/// Raw status code returned by a transport primitive. Zero is success,
/// negative values are transport specific errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status(pub i32);

impl Status {
    pub const OK: Status = Status(0);

    pub fn is_ok(self) -> bool {
        self.0 == 0
    }

    pub fn into_result(self) -> Result<(), Status> {
        if self.is_ok() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "status {}", self.0)
    }
}

/// Per-block entry point handed to the transport at open time.
///
/// Called on the realtime thread with planar input and output regions of
/// `channels * block_size` samples each. Either pointer may be null when the
/// transport has no channels in that direction.
pub type BlockCallback = Box<dyn FnMut(*const f32, *mut f32) + Send + 'static>;

/// Hardware-facing side of the adapter.
///
/// `stop` and `close` must not return while a block invocation is still in
/// flight; the adapter relies on this to order its "stopped" notification
/// after the last delivered block.
///
/// # Safety
///
/// The [`BlockCallback`] given to `open` dereferences the regions it is
/// called with. Implementations must only call it with an input region that
/// is null or valid for `input_channels() * block_size` samples, and an
/// output region that is null or writable for `output_channels() * block_size`
/// samples, both staying valid for the call and not overlapping. The channel
/// counts must not change between `open` and `close`.
pub unsafe trait Transport: Send {
    fn name(&self) -> &str;
    fn init(&mut self) -> Result<(), Status>;
    fn open(&mut self, block_size: usize, process: BlockCallback) -> Result<(), Status>;
    fn start(&mut self) -> Result<(), Status>;
    fn stop(&mut self) -> Result<(), Status>;
    fn close(&mut self) -> Result<(), Status>;
    fn input_channels(&self) -> usize;
    fn output_channels(&self) -> usize;
    fn sample_rate(&self) -> f64;
    fn error_message(&self, status: Status) -> String;
}
