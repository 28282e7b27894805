//! Software transport.
//!
//! Drives the block callback from a dedicated thread at block cadence using
//! buffers it owns, the same way the RASPA driver does from its RT task.
//! Used when no Elk hardware is present and by the test-suite.

use super::traits::{BlockCallback, Status, Transport};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

const THREAD_NAME: &str = "elkpi-sim-rt";
const TEST_TONE_HZ: f64 = 220.0;

pub const SIM_ERR_OPEN: i32 = -16;
pub const SIM_ERR_START: i32 = -1;
pub const SIM_ERR_CLOSE: i32 = -5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub input_channels: usize,
    pub output_channels: usize,
    pub sample_rate: f64,
    /// Sleep between blocks to match the realtime cadence. When off, blocks
    /// are delivered back to back.
    pub paced: bool,
    pub fail_open: bool,
    pub fail_start: bool,
    pub fail_close: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            input_channels: 2,
            output_channels: 2,
            sample_rate: 48_000.0,
            paced: true,
            fail_open: false,
            fail_start: false,
            fail_close: false,
        }
    }
}

/// Planar transport-owned block memory.
#[derive(Debug)]
struct Buffers {
    input: Vec<f32>,
    output: Vec<f32>,
    phase: f64,
}

impl Buffers {
    fn new(config: &SimConfig, block_size: usize) -> Self {
        Self {
            input: vec![0.0; config.input_channels * block_size],
            output: vec![0.0; config.output_channels * block_size],
            phase: 0.0,
        }
    }

    fn fill_input(&mut self, block_size: usize, sample_rate: f64) {
        let step = std::f64::consts::TAU * TEST_TONE_HZ / sample_rate.max(1.0);
        for (ch, channel) in self.input.chunks_mut(block_size.max(1)).enumerate() {
            let mut phase = self.phase;
            let gain = 0.5 / (ch + 1) as f64;
            for sample in channel.iter_mut() {
                *sample = (phase.sin() * gain) as f32;
                phase += step;
            }
        }
        self.phase = (self.phase + step * block_size as f64) % std::f64::consts::TAU;
    }

    fn region_ptrs(&mut self) -> (*const f32, *mut f32) {
        let input = if self.input.is_empty() {
            std::ptr::null()
        } else {
            self.input.as_ptr()
        };
        let output = if self.output.is_empty() {
            std::ptr::null_mut()
        } else {
            self.output.as_mut_ptr()
        };
        (input, output)
    }
}

/// Read-only view of a running [`SimTransport`], safe to share with other
/// threads.
#[derive(Debug, Clone, Default)]
pub struct SimMonitor {
    blocks: Arc<AtomicU64>,
    last_output: Arc<Mutex<Vec<f32>>>,
}

impl SimMonitor {
    pub fn blocks_delivered(&self) -> u64 {
        self.blocks.load(Ordering::Acquire)
    }

    /// Planar copy of the most recently delivered output block.
    pub fn last_output(&self) -> Vec<f32> {
        self.last_output
            .lock()
            .map(|out| out.clone())
            .unwrap_or_default()
    }

    pub fn wait_for_blocks(&self, count: u64, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.blocks_delivered() < count {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        true
    }
}

type Worker = JoinHandle<(BlockCallback, Buffers)>;

pub struct SimTransport {
    config: SimConfig,
    block_size: usize,
    process: Option<BlockCallback>,
    buffers: Option<Buffers>,
    worker: Option<Worker>,
    running: Arc<AtomicBool>,
    monitor: SimMonitor,
}

impl SimTransport {
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            block_size: 0,
            process: None,
            buffers: None,
            worker: None,
            running: Arc::new(AtomicBool::new(false)),
            monitor: SimMonitor::default(),
        }
    }

    pub fn monitor(&self) -> SimMonitor {
        self.monitor.clone()
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    fn spawn_worker(
        &self,
        mut process: BlockCallback,
        mut buffers: Buffers,
    ) -> std::io::Result<Worker> {
        let running = Arc::clone(&self.running);
        let monitor = self.monitor.clone();
        let block_size = self.block_size;
        let sample_rate = self.config.sample_rate;
        let period = if self.config.paced && sample_rate > 0.0 {
            Some(Duration::from_secs_f64(block_size as f64 / sample_rate))
        } else {
            None
        };

        std::thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || {
                let mut next = Instant::now();
                while running.load(Ordering::Acquire) {
                    buffers.fill_input(block_size, sample_rate);
                    buffers.output.fill(0.0);
                    let (input, output) = buffers.region_ptrs();
                    process(input, output);

                    if let Ok(mut last) = monitor.last_output.try_lock() {
                        last.clear();
                        last.extend_from_slice(&buffers.output);
                    }
                    monitor.blocks.fetch_add(1, Ordering::AcqRel);

                    match period {
                        Some(period) => {
                            next += period;
                            let now = Instant::now();
                            if next > now {
                                std::thread::sleep(next - now);
                            } else {
                                next = now;
                            }
                        }
                        None => std::thread::yield_now(),
                    }
                }
                (process, buffers)
            })
    }

    fn join_worker(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            match worker.join() {
                Ok((process, buffers)) => {
                    self.process = Some(process);
                    self.buffers = Some(buffers);
                }
                Err(_) => tracing::error!("{THREAD_NAME} thread panicked"),
            }
        }
    }
}

// SAFETY: regions come from `Buffers`, sized at open from the configured
// channel counts and block size.
unsafe impl Transport for SimTransport {
    fn name(&self) -> &str {
        "Sim"
    }

    fn init(&mut self) -> Result<(), Status> {
        Ok(())
    }

    fn open(&mut self, block_size: usize, process: BlockCallback) -> Result<(), Status> {
        if self.config.fail_open {
            return Err(Status(SIM_ERR_OPEN));
        }
        self.join_worker();
        self.block_size = block_size;
        self.buffers = Some(Buffers::new(&self.config, block_size));
        self.process = Some(process);
        Ok(())
    }

    fn start(&mut self) -> Result<(), Status> {
        if self.config.fail_start {
            return Err(Status(SIM_ERR_START));
        }
        if self.worker.is_some() {
            return Ok(());
        }
        let (Some(process), Some(buffers)) = (self.process.take(), self.buffers.take()) else {
            return Err(Status(SIM_ERR_START));
        };
        self.running.store(true, Ordering::Release);
        match self.spawn_worker(process, buffers) {
            Ok(worker) => {
                self.worker = Some(worker);
                Ok(())
            }
            Err(e) => {
                // The closure moved into the failed spawn; the device has to be
                // reopened before it can start again.
                tracing::error!("Failed to spawn {THREAD_NAME}: {e}");
                self.running.store(false, Ordering::Release);
                Err(Status(SIM_ERR_START))
            }
        }
    }

    fn stop(&mut self) -> Result<(), Status> {
        self.join_worker();
        Ok(())
    }

    fn close(&mut self) -> Result<(), Status> {
        self.join_worker();
        self.process = None;
        self.buffers = None;
        if self.config.fail_close {
            return Err(Status(SIM_ERR_CLOSE));
        }
        Ok(())
    }

    fn input_channels(&self) -> usize {
        self.config.input_channels
    }

    fn output_channels(&self) -> usize {
        self.config.output_channels
    }

    fn sample_rate(&self) -> f64 {
        self.config.sample_rate
    }

    fn error_message(&self, status: Status) -> String {
        match status.0 {
            SIM_ERR_OPEN => "Device or resource busy".to_string(),
            SIM_ERR_START => "Realtime task could not be started".to_string(),
            SIM_ERR_CLOSE => "I/O error while closing".to_string(),
            code => format!("Unknown error {code}"),
        }
    }
}

impl Drop for SimTransport {
    fn drop(&mut self) {
        self.join_worker();
    }
}
