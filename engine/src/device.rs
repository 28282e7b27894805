//! The ElkPi audio device: lifecycle and public surface.

use crate::bridge::RealtimeBridge;
use crate::callback::AudioIODeviceCallback;
use crate::error::{DeviceError, DeviceResult};
use crate::hw::error_fmt::transport_error;
use crate::hw::options::AdapterOptions;
use crate::hw::traits::{BlockCallback, Status, Transport};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub const DEVICE_NAME: &str = "ElkPi";
pub const TYPE_NAME: &str = "ElkPi";

/// Samples are handed to callbacks as 32-bit floats.
const BIT_DEPTH: u32 = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Closed,
    Open,
    Running,
}

/// Set of channel indices, used for requested and active channels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ChannelMask(u64);

impl ChannelMask {
    pub const EMPTY: ChannelMask = ChannelMask(0);

    pub fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Mask with the first `count` channels set.
    pub fn first(count: usize) -> Self {
        match count {
            0 => Self(0),
            n if n >= 64 => Self(u64::MAX),
            n => Self((1u64 << n) - 1),
        }
    }

    pub fn bits(self) -> u64 {
        self.0
    }

    pub fn count(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn contains(self, channel: usize) -> bool {
        channel < 64 && self.0 & (1 << channel) != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// Capability set every audio device exposes to the host application.
pub trait AudioIODevice {
    fn name(&self) -> &str;
    fn type_name(&self) -> &str;

    fn output_channel_names(&self) -> Vec<String>;
    fn input_channel_names(&self) -> Vec<String>;
    fn available_sample_rates(&self) -> Vec<f64>;
    fn available_buffer_sizes(&self) -> Vec<usize>;
    fn default_buffer_size(&self) -> usize;

    fn open(
        &mut self,
        input_channels: ChannelMask,
        output_channels: ChannelMask,
        sample_rate: f64,
        buffer_size: usize,
    ) -> DeviceResult<()>;
    fn close(&mut self) -> DeviceResult<()>;
    fn is_open(&self) -> bool;

    fn start(&mut self, callback: Option<&Arc<dyn AudioIODeviceCallback>>) -> DeviceResult<()>;
    fn stop(&mut self) -> DeviceResult<()>;
    /// True iff a callback is registered, whatever the transport is doing.
    fn is_playing(&self) -> bool;

    fn last_error(&self) -> &str;
    fn current_buffer_size_samples(&self) -> usize;
    fn current_sample_rate(&self) -> f64;
    fn current_bit_depth(&self) -> u32;
    fn active_output_channels(&self) -> ChannelMask;
    fn active_input_channels(&self) -> ChannelMask;
    fn output_latency_samples(&self) -> usize;
    fn input_latency_samples(&self) -> usize;
    fn has_control_panel(&self) -> bool;
    fn set_audio_preprocessing_enabled(&mut self, enabled: bool) -> bool;
    /// -1 while unknown (never opened, or closed).
    fn xrun_count(&self) -> i64;
}

fn channel_names(prefix: &str, count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("{prefix} #{i}")).collect()
}

pub struct DeviceAdapter {
    name: String,
    options: AdapterOptions,
    transport: Box<dyn Transport>,
    bridge: Arc<RealtimeBridge>,
    state: DeviceState,
    num_inputs: usize,
    num_outputs: usize,
    sample_rate: f64,
    last_error: String,
    reported_xruns: i64,
    reported_invalid_blocks: u64,
}

impl DeviceAdapter {
    /// Wrap `transport` and initialise it. An init failure is kept as the
    /// last error; the following `open` reports it again through the
    /// transport.
    pub fn new(mut transport: Box<dyn Transport>, options: AdapterOptions) -> Self {
        let mut last_error = String::new();
        if let Err(status) = transport.init() {
            last_error = transport_error(
                transport.name(),
                "init",
                status,
                &transport.error_message(status),
            );
            error!("{last_error}");
        }
        debug!("{DEVICE_NAME} device created on {} transport", transport.name());
        Self {
            name: DEVICE_NAME.to_string(),
            options,
            transport,
            bridge: Arc::new(RealtimeBridge::new()),
            state: DeviceState::Closed,
            num_inputs: 0,
            num_outputs: 0,
            sample_rate: 0.0,
            last_error,
            reported_xruns: 0,
            reported_invalid_blocks: 0,
        }
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    pub fn options(&self) -> &AdapterOptions {
        &self.options
    }

    pub fn bridge(&self) -> &Arc<RealtimeBridge> {
        &self.bridge
    }

    /// Replace the registered callback in any state. While running, the new
    /// callback gets `about_to_start` before its first block and the old one
    /// gets `stopped` after its last.
    pub fn set_callback(&self, callback: Option<&Arc<dyn AudioIODeviceCallback>>) {
        let running = (self.state == DeviceState::Running).then_some(self as &dyn AudioIODevice);
        self.bridge.registry().install(callback, running);
    }

    /// Log xruns and malformed blocks counted by the realtime thread since the
    /// previous call, and release a callback its owner dropped mid-block.
    /// Returns the current xrun count.
    pub fn report_xruns(&mut self) -> i64 {
        if let Some(callback) = self.bridge.registry().take_retired() {
            debug!("{} releasing a callback dropped during a block", self.name);
            callback.stopped();
        }

        let xruns = self.bridge.xrun_count();
        if xruns > self.reported_xruns.max(0) {
            warn!(
                "{} xrun detected (#{xruns}, {} new)",
                self.name,
                xruns - self.reported_xruns.max(0)
            );
        }
        self.reported_xruns = xruns;

        let invalid = self.bridge.invalid_blocks();
        if invalid > self.reported_invalid_blocks {
            warn!(
                "{} transport delivered {} block(s) without buffers",
                self.name,
                invalid - self.reported_invalid_blocks
            );
        }
        self.reported_invalid_blocks = invalid;
        xruns
    }

    fn fail(&mut self, operation: &str, status: Status) -> String {
        let message = transport_error(
            self.transport.name(),
            operation,
            status,
            &self.transport.error_message(status),
        );
        error!("{message}");
        self.last_error = message.clone();
        message
    }
}

impl AudioIODevice for DeviceAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    fn output_channel_names(&self) -> Vec<String> {
        channel_names("Out", self.num_outputs)
    }

    fn input_channel_names(&self) -> Vec<String> {
        channel_names("In", self.num_inputs)
    }

    fn available_sample_rates(&self) -> Vec<f64> {
        if self.sample_rate > 0.0 {
            vec![self.sample_rate]
        } else {
            Vec::new()
        }
    }

    fn available_buffer_sizes(&self) -> Vec<usize> {
        vec![self.options.block_size]
    }

    fn default_buffer_size(&self) -> usize {
        self.options.block_size
    }

    fn open(
        &mut self,
        input_channels: ChannelMask,
        output_channels: ChannelMask,
        sample_rate: f64,
        buffer_size: usize,
    ) -> DeviceResult<()> {
        if self.state != DeviceState::Closed {
            if let Err(e) = self.close() {
                warn!("Closing {} before reopening: {e}", self.name);
            }
        }

        let block_size = self.options.block_size;
        if buffer_size != 0 && buffer_size != block_size {
            debug!("Requested buffer size {buffer_size} ignored, {} runs at {block_size}", self.name);
        }

        let num_inputs = self.transport.input_channels();
        let num_outputs = self.transport.output_channels();
        if input_channels.count() != num_inputs || output_channels.count() != num_outputs {
            debug!(
                "Requested {}/{} channels, transport provides {num_inputs}/{num_outputs}",
                input_channels.count(),
                output_channels.count()
            );
        }

        let bridge = Arc::clone(&self.bridge);
        let process: BlockCallback = Box::new(move |input, output| {
            // SAFETY: `Transport` implementations only deliver regions sized
            // for the block size and channel counts of this open.
            unsafe { bridge.process(input, output) }
        });
        if let Err(status) = self.transport.open(block_size, process) {
            let message = self.fail("open", status);
            if let Some(callback) = self.bridge.registry().current_callback() {
                callback.device_error(&message);
            }
            return Err(DeviceError::Open(message));
        }

        let actual_rate = self.transport.sample_rate();
        if actual_rate <= 0.0 {
            warn!(
                "{} transport reports no sample rate, xrun detection is disabled",
                self.transport.name()
            );
        } else if sample_rate > 0.0 && sample_rate != actual_rate {
            debug!("Requested sample rate {sample_rate} ignored, transport runs at {actual_rate}");
        }

        self.bridge
            .configure(num_inputs, num_outputs, block_size, actual_rate);
        self.num_inputs = num_inputs;
        self.num_outputs = num_outputs;
        self.sample_rate = actual_rate;
        self.last_error.clear();
        self.reported_xruns = 0;
        self.reported_invalid_blocks = 0;
        self.state = DeviceState::Open;
        info!(
            "{} opened: {num_inputs} in / {num_outputs} out, {block_size} frames @ {actual_rate} Hz",
            self.name
        );
        Ok(())
    }

    fn close(&mut self) -> DeviceResult<()> {
        if self.state == DeviceState::Closed {
            return Ok(());
        }

        let mut result = Ok(());
        if self.state == DeviceState::Running {
            result = self.stop();
        }
        // Registered but never started: nothing to notify.
        self.bridge.registry().clear();

        let close_status = self.transport.close();
        self.bridge.release();
        self.state = DeviceState::Closed;
        self.num_inputs = 0;
        self.num_outputs = 0;
        self.sample_rate = 0.0;
        self.reported_xruns = -1;
        self.last_error.clear();

        if let Err(status) = close_status {
            let message = self.fail("close", status);
            result = Err(DeviceError::TransportClose(message));
        } else if let Err(DeviceError::TransportClose(message)) = &result {
            self.last_error = message.clone();
        }
        info!("{} closed", self.name);
        result
    }

    fn is_open(&self) -> bool {
        self.state != DeviceState::Closed
    }

    fn start(&mut self, callback: Option<&Arc<dyn AudioIODeviceCallback>>) -> DeviceResult<()> {
        match self.state {
            DeviceState::Closed => return Err(DeviceError::NotOpen),
            DeviceState::Running => return Err(DeviceError::AlreadyRunning),
            DeviceState::Open => {}
        }

        // Nothing may reach the realtime path before its about_to_start, so
        // the slot stays empty until the transport is up.
        let previous = self.bridge.registry().clear();
        let pending = callback.cloned().or_else(|| previous.clone());

        self.bridge.rearm();
        if let Err(status) = self.transport.start() {
            let message = self.fail("start", status);
            self.bridge.registry().install(previous.as_ref(), None);
            if let Some(callback) = &pending {
                callback.device_error(&message);
            }
            return Err(DeviceError::Start(message));
        }

        self.state = DeviceState::Running;
        info!("{} started", self.name);
        if let Some(callback) = pending {
            callback.about_to_start(&*self);
            self.bridge.registry().install(Some(&callback), None);
        }
        Ok(())
    }

    fn stop(&mut self) -> DeviceResult<()> {
        if self.state != DeviceState::Running {
            return Err(DeviceError::NotRunning);
        }

        let outgoing = self.bridge.registry().clear();
        let result = self.transport.stop();
        self.state = DeviceState::Open;
        if let Some(callback) = outgoing {
            callback.stopped();
        }
        info!("{} stopped", self.name);

        result.map_err(|status| DeviceError::TransportClose(self.fail("stop", status)))
    }

    fn is_playing(&self) -> bool {
        self.bridge.registry().is_registered()
    }

    fn last_error(&self) -> &str {
        &self.last_error
    }

    fn current_buffer_size_samples(&self) -> usize {
        self.options.block_size
    }

    fn current_sample_rate(&self) -> f64 {
        self.sample_rate
    }

    fn current_bit_depth(&self) -> u32 {
        BIT_DEPTH
    }

    fn active_output_channels(&self) -> ChannelMask {
        ChannelMask::EMPTY
    }

    fn active_input_channels(&self) -> ChannelMask {
        ChannelMask::EMPTY
    }

    fn output_latency_samples(&self) -> usize {
        self.options.block_size
    }

    fn input_latency_samples(&self) -> usize {
        self.options.block_size
    }

    fn has_control_panel(&self) -> bool {
        false
    }

    fn set_audio_preprocessing_enabled(&mut self, _enabled: bool) -> bool {
        false
    }

    fn xrun_count(&self) -> i64 {
        self.bridge.xrun_count()
    }
}

impl Drop for DeviceAdapter {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            error!("{} close on drop failed: {e}", self.name);
        }
    }
}
