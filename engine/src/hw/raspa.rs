//! RASPA transport.
//!
//! RASPA is the Elk Audio OS driver library that runs the audio RT task and
//! calls back once per block with planar (channel-major) float buffers.
//! The library is loaded at runtime so the crate builds without the Elk SDK.

use super::traits::{BlockCallback, Status, Transport};
use crate::error::{DeviceError, DeviceResult};
use libloading::Library;
use std::ffi::{CStr, c_char, c_float, c_int, c_uint, c_void};
use std::path::Path;
use std::ptr::NonNull;

/// Returned when the device is (re)opened before a block callback was set.
const NOT_CONFIGURED: Status = Status(-22);

type RaspaProcessCallback = unsafe extern "C" fn(input: *mut f32, output: *mut f32, data: *mut c_void);

type InitFn = unsafe extern "C" fn() -> c_int;
type OpenFn = unsafe extern "C" fn(c_int, Option<RaspaProcessCallback>, *mut c_void, c_uint) -> c_int;
type VoidStatusFn = unsafe extern "C" fn() -> c_int;
type ChannelCountFn = unsafe extern "C" fn() -> c_int;
type SamplingRateFn = unsafe extern "C" fn() -> c_float;
type ErrorMsgFn = unsafe extern "C" fn(c_int) -> *const c_char;

struct RaspaApi {
    init: InitFn,
    open: OpenFn,
    start_realtime: VoidStatusFn,
    close: VoidStatusFn,
    num_input_channels: ChannelCountFn,
    num_output_channels: ChannelCountFn,
    sampling_rate: Option<SamplingRateFn>,
    error_msg: ErrorMsgFn,
    _library: Library,
}

impl RaspaApi {
    fn load(path: &Path) -> DeviceResult<Self> {
        // SAFETY: loading the library runs its initialisers; libraspa has none
        // with observable side effects beyond symbol setup.
        let library = unsafe { Library::new(path) }
            .map_err(|e| DeviceError::Load(format!("{}: {e}", path.display())))?;

        fn symbol<T: Copy>(library: &Library, name: &[u8]) -> DeviceResult<T> {
            // SAFETY: every symbol is looked up with the signature declared in
            // raspa.h.
            unsafe { library.get::<T>(name) }.map(|s| *s).map_err(|e| {
                let name = String::from_utf8_lossy(&name[..name.len().saturating_sub(1)]);
                DeviceError::Load(format!("missing symbol {name}: {e}"))
            })
        }

        Ok(Self {
            init: symbol(&library, b"raspa_init\0")?,
            open: symbol(&library, b"raspa_open\0")?,
            start_realtime: symbol(&library, b"raspa_start_realtime\0")?,
            close: symbol(&library, b"raspa_close\0")?,
            num_input_channels: symbol(&library, b"raspa_get_num_input_channels\0")?,
            num_output_channels: symbol(&library, b"raspa_get_num_output_channels\0")?,
            sampling_rate: symbol(&library, b"raspa_get_sampling_rate\0").ok(),
            error_msg: symbol(&library, b"raspa_get_error_msg\0")?,
            _library: library,
        })
    }
}

unsafe extern "C" fn process_trampoline(input: *mut f32, output: *mut f32, data: *mut c_void) {
    if data.is_null() {
        return;
    }
    // SAFETY: `data` is the `Box<BlockCallback>` leaked in `open`; it stays
    // alive until `raspa_close` has returned and only the RT task calls us.
    let process = unsafe { &mut *(data as *mut BlockCallback) };
    process(input as *const f32, output);
}

pub struct RaspaTransport {
    api: RaspaApi,
    debug_flags: u32,
    block_size: usize,
    context: Option<NonNull<BlockCallback>>,
    device_open: bool,
}

// SAFETY: `context` is only dereferenced by the RT task between raspa_open
// and raspa_close, and only freed by the owner after raspa_close returned.
unsafe impl Send for RaspaTransport {}

impl RaspaTransport {
    pub fn load(library: &Path, debug_flags: u32) -> DeviceResult<Self> {
        let api = RaspaApi::load(library)?;
        tracing::debug!("Loaded RASPA from {}", library.display());
        Ok(Self {
            api,
            debug_flags,
            block_size: 0,
            context: None,
            device_open: false,
        })
    }

    fn raspa_open(&mut self) -> Result<(), Status> {
        let Some(context) = self.context else {
            return Err(NOT_CONFIGURED);
        };
        let block_size = c_int::try_from(self.block_size).map_err(|_| NOT_CONFIGURED)?;
        // SAFETY: the trampoline matches RaspaProcessCallback and `context`
        // points at a live BlockCallback.
        let code = unsafe {
            (self.api.open)(
                block_size,
                Some(process_trampoline),
                context.as_ptr() as *mut c_void,
                self.debug_flags,
            )
        };
        Status(code).into_result()?;
        self.device_open = true;
        Ok(())
    }

    fn raspa_close(&mut self) -> Result<(), Status> {
        if !self.device_open {
            return Ok(());
        }
        self.device_open = false;
        // SAFETY: plain FFI call; returns once the RT task has exited.
        Status(unsafe { (self.api.close)() }).into_result()
    }

    fn release_context(&mut self) {
        if let Some(context) = self.context.take() {
            // SAFETY: created by Box::into_raw in `open`, RASPA is closed.
            drop(unsafe { Box::from_raw(context.as_ptr()) });
        }
    }
}

// SAFETY: RASPA delivers its own buffers, sized for the channel counts it
// reports and the block size passed to raspa_open.
unsafe impl Transport for RaspaTransport {
    fn name(&self) -> &str {
        "RASPA"
    }

    fn init(&mut self) -> Result<(), Status> {
        // SAFETY: plain FFI call.
        Status(unsafe { (self.api.init)() }).into_result()
    }

    fn open(&mut self, block_size: usize, process: BlockCallback) -> Result<(), Status> {
        self.raspa_close()?;
        self.release_context();
        self.block_size = block_size;
        self.context = NonNull::new(Box::into_raw(Box::new(process)));
        if let Err(status) = self.raspa_open() {
            self.release_context();
            return Err(status);
        }
        Ok(())
    }

    fn start(&mut self) -> Result<(), Status> {
        // RASPA has no stop; a stopped device was closed and has to be
        // reopened with the same block callback.
        if !self.device_open {
            self.raspa_open()?;
        }
        // SAFETY: plain FFI call.
        Status(unsafe { (self.api.start_realtime)() }).into_result()
    }

    fn stop(&mut self) -> Result<(), Status> {
        self.raspa_close()
    }

    fn close(&mut self) -> Result<(), Status> {
        let result = self.raspa_close();
        self.release_context();
        result
    }

    fn input_channels(&self) -> usize {
        // SAFETY: plain FFI call.
        usize::try_from(unsafe { (self.api.num_input_channels)() }).unwrap_or(0)
    }

    fn output_channels(&self) -> usize {
        // SAFETY: plain FFI call.
        usize::try_from(unsafe { (self.api.num_output_channels)() }).unwrap_or(0)
    }

    fn sample_rate(&self) -> f64 {
        match self.api.sampling_rate {
            // SAFETY: plain FFI call.
            Some(rate) => f64::from(unsafe { rate() }),
            None => 0.0,
        }
    }

    fn error_message(&self, status: Status) -> String {
        // SAFETY: raspa_get_error_msg returns a static NUL-terminated string
        // or null.
        unsafe {
            let msg = (self.api.error_msg)(status.0);
            if msg.is_null() {
                return format!("RASPA error {}", status.0);
            }
            CStr::from_ptr(msg).to_string_lossy().into_owned()
        }
    }
}

impl Drop for RaspaTransport {
    fn drop(&mut self) {
        if let Err(status) = self.close() {
            tracing::error!("RASPA close on drop failed: {}", self.error_message(status));
        }
    }
}
