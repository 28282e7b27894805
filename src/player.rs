use elkpi_engine::{AudioIODevice, AudioIODeviceCallback, InputChannels, OutputChannels};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{error, info};

/// Plays a sine tone on every output, mixed with the first input.
pub struct TonePlayer {
    frequency: f64,
    gain: f32,
    sample_rate: AtomicU64,
    phase: AtomicU64,
}

impl TonePlayer {
    pub fn new(frequency: f64, gain: f32) -> Self {
        Self {
            frequency,
            gain,
            sample_rate: AtomicU64::new(48_000f64.to_bits()),
            phase: AtomicU64::new(0f64.to_bits()),
        }
    }
}

impl AudioIODeviceCallback for TonePlayer {
    fn about_to_start(&self, device: &dyn AudioIODevice) {
        let rate = device.current_sample_rate();
        if rate > 0.0 {
            self.sample_rate.store(rate.to_bits(), Ordering::Relaxed);
        }
        self.phase.store(0f64.to_bits(), Ordering::Relaxed);
        info!(
            "Tone {} Hz on {} ({} outputs, {} frames @ {rate} Hz)",
            self.frequency,
            device.name(),
            device.output_channel_names().len(),
            device.current_buffer_size_samples()
        );
    }

    fn stopped(&self) {
        info!("Tone stopped");
    }

    fn io_callback(
        &self,
        inputs: &InputChannels<'_>,
        outputs: &mut OutputChannels<'_>,
        num_samples: usize,
    ) {
        let rate = f64::from_bits(self.sample_rate.load(Ordering::Relaxed));
        let step = std::f64::consts::TAU * self.frequency / rate;
        let start = f64::from_bits(self.phase.load(Ordering::Relaxed));
        let monitor = inputs.channel(0);

        for ch in 0..outputs.num_channels() {
            let Some(out) = outputs.channel_mut(ch) else {
                continue;
            };
            let mut phase = start;
            for (i, sample) in out.iter_mut().enumerate() {
                let dry = monitor.map_or(0.0, |m| m[i]);
                *sample = phase.sin() as f32 * self.gain + dry;
                phase += step;
            }
        }

        let end = (start + step * num_samples as f64) % std::f64::consts::TAU;
        self.phase.store(end.to_bits(), Ordering::Relaxed);
    }

    fn device_error(&self, message: &str) {
        error!("Device error: {message}");
    }
}
