#![allow(dead_code)]

use elkpi_engine::hw::BlockCallback;
use elkpi_engine::{
    AdapterOptions, AudioIODevice, AudioIODeviceCallback, DeviceAdapter, InputChannels,
    OutputChannels, Status, Transport,
};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct MockState {
    inputs: usize,
    outputs: usize,
    sample_rate: f64,
    block_size: usize,
    /// Channel counts captured at open; blocks are sized from these.
    open_channels: (usize, usize),
    process: Option<BlockCallback>,
    running: bool,
    fail_open: bool,
    fail_start: bool,
    fail_close: bool,
    calls: Vec<&'static str>,
}

/// Transport whose blocks are delivered by the test through [`MockHandle`].
pub struct MockTransport {
    shared: Arc<Mutex<MockState>>,
}

#[derive(Clone)]
pub struct MockHandle {
    shared: Arc<Mutex<MockState>>,
}

pub fn mock(inputs: usize, outputs: usize) -> (MockTransport, MockHandle) {
    let shared = Arc::new(Mutex::new(MockState {
        inputs,
        outputs,
        sample_rate: 48_000.0,
        ..MockState::default()
    }));
    (
        MockTransport {
            shared: Arc::clone(&shared),
        },
        MockHandle { shared },
    )
}

pub fn adapter(inputs: usize, outputs: usize) -> (DeviceAdapter, MockHandle) {
    let (transport, handle) = mock(inputs, outputs);
    (
        DeviceAdapter::new(Box::new(transport), AdapterOptions::default()),
        handle,
    )
}

impl MockHandle {
    pub fn set_channels(&self, inputs: usize, outputs: usize) {
        let mut state = self.shared.lock().unwrap();
        state.inputs = inputs;
        state.outputs = outputs;
    }

    pub fn set_sample_rate(&self, sample_rate: f64) {
        self.shared.lock().unwrap().sample_rate = sample_rate;
    }

    pub fn fail_open(&self, fail: bool) {
        self.shared.lock().unwrap().fail_open = fail;
    }

    pub fn fail_start(&self, fail: bool) {
        self.shared.lock().unwrap().fail_start = fail;
    }

    pub fn fail_close(&self, fail: bool) {
        self.shared.lock().unwrap().fail_close = fail;
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.shared.lock().unwrap().calls.clone()
    }

    pub fn is_running(&self) -> bool {
        self.shared.lock().unwrap().running
    }

    /// Deliver one block whose input holds `input_value` and whose output is
    /// pre-filled with `output_fill`. Returns the planar output, or `None`
    /// when the transport is not running.
    pub fn deliver_with(&self, input_value: f32, output_fill: f32) -> Option<Vec<f32>> {
        let mut state = self.shared.lock().unwrap();
        if !state.running {
            return None;
        }
        let (inputs, outputs) = state.open_channels;
        let input = vec![input_value; inputs * state.block_size];
        let mut output = vec![output_fill; outputs * state.block_size];
        let input_ptr = if input.is_empty() { std::ptr::null() } else { input.as_ptr() };
        let output_ptr = if output.is_empty() {
            std::ptr::null_mut()
        } else {
            output.as_mut_ptr()
        };
        let process = state.process.as_mut()?;
        process(input_ptr, output_ptr);
        Some(output)
    }

    pub fn deliver(&self) -> Option<Vec<f32>> {
        self.deliver_with(0.25, 0.0)
    }
}

// SAFETY: `deliver_with` allocates both regions from the channel counts and
// block size captured at open.
unsafe impl Transport for MockTransport {
    fn name(&self) -> &str {
        "Mock"
    }

    fn init(&mut self) -> Result<(), Status> {
        self.shared.lock().unwrap().calls.push("init");
        Ok(())
    }

    fn open(&mut self, block_size: usize, process: BlockCallback) -> Result<(), Status> {
        let mut state = self.shared.lock().unwrap();
        state.calls.push("open");
        if state.fail_open {
            return Err(Status(-16));
        }
        state.block_size = block_size;
        state.open_channels = (state.inputs, state.outputs);
        state.process = Some(process);
        Ok(())
    }

    fn start(&mut self) -> Result<(), Status> {
        let mut state = self.shared.lock().unwrap();
        state.calls.push("start");
        if state.fail_start {
            return Err(Status(-1));
        }
        state.running = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Status> {
        let mut state = self.shared.lock().unwrap();
        state.calls.push("stop");
        state.running = false;
        Ok(())
    }

    fn close(&mut self) -> Result<(), Status> {
        let mut state = self.shared.lock().unwrap();
        state.calls.push("close");
        state.running = false;
        state.process = None;
        if state.fail_close {
            return Err(Status(-5));
        }
        Ok(())
    }

    fn input_channels(&self) -> usize {
        self.shared.lock().unwrap().inputs
    }

    fn output_channels(&self) -> usize {
        self.shared.lock().unwrap().outputs
    }

    fn sample_rate(&self) -> f64 {
        self.shared.lock().unwrap().sample_rate
    }

    fn error_message(&self, status: Status) -> String {
        match status.0 {
            -16 => "Device or resource busy".to_string(),
            -1 => "Operation not permitted".to_string(),
            -5 => "Input/output error".to_string(),
            code => format!("error {code}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    AboutToStart { block_size: usize },
    Io { inputs: usize, outputs: usize, samples: usize },
    Stopped,
    Error(String),
}

/// Callback that records every notification and writes `level` to all
/// outputs.
pub struct Recorder {
    pub level: f32,
    events: Mutex<Vec<Event>>,
}

impl Recorder {
    pub fn new(level: f32) -> Arc<Self> {
        Arc::new(Self {
            level,
            events: Mutex::new(Vec::new()),
        })
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn io_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::Io { .. }))
            .count()
    }
}

impl AudioIODeviceCallback for Recorder {
    fn about_to_start(&self, device: &dyn AudioIODevice) {
        self.events.lock().unwrap().push(Event::AboutToStart {
            block_size: device.current_buffer_size_samples(),
        });
    }

    fn stopped(&self) {
        self.events.lock().unwrap().push(Event::Stopped);
    }

    fn io_callback(
        &self,
        inputs: &InputChannels<'_>,
        outputs: &mut OutputChannels<'_>,
        num_samples: usize,
    ) {
        for ch in 0..outputs.num_channels() {
            if let Some(out) = outputs.channel_mut(ch) {
                out.fill(self.level);
            }
        }
        self.events.lock().unwrap().push(Event::Io {
            inputs: inputs.num_channels(),
            outputs: outputs.num_channels(),
            samples: num_samples,
        });
    }

    fn device_error(&self, message: &str) {
        self.events.lock().unwrap().push(Event::Error(message.to_string()));
    }
}

pub fn as_callback(recorder: &Arc<Recorder>) -> Arc<dyn AudioIODeviceCallback> {
    recorder.clone()
}
