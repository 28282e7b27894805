mod logging;
mod player;

use elkpi_engine::{
    AdapterOptions, AudioIODevice, AudioIODeviceCallback, ChannelMask, DeviceError,
    ElkPiDeviceType,
};
use player::TonePlayer;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

const REPORT_INTERVAL: Duration = Duration::from_secs(1);

async fn load_options(path: Option<String>) -> Result<AdapterOptions, DeviceError> {
    let options = match path {
        Some(path) => {
            let text = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| DeviceError::Config(format!("{path}: {e}")))?;
            AdapterOptions::from_toml_str(&text)?
        }
        None => AdapterOptions::default(),
    };
    Ok(options.with_env(|key| std::env::var(key).ok()))
}

async fn run(options: AdapterOptions) -> Result<(), DeviceError> {
    let device_type = ElkPiDeviceType::new(options);
    let mut device = device_type.create_adapter()?;
    device.open(ChannelMask::first(2), ChannelMask::first(2), 0.0, 0)?;

    let tone: Arc<dyn AudioIODeviceCallback> = Arc::new(TonePlayer::new(440.0, 0.2));
    device.start(Some(&tone))?;

    let mut report = tokio::time::interval(REPORT_INTERVAL);
    loop {
        tokio::select! {
            _ = report.tick() => {
                device.report_xruns();
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    error!("Waiting for Ctrl-C failed: {e}");
                }
                break;
            }
        }
    }

    info!("Shutting down, {} xruns", device.report_xruns().max(0));
    device.close()
}

#[tokio::main]
async fn main() -> ExitCode {
    logging::init();

    let options = match load_options(std::env::args().nth(1)).await {
        Ok(options) => options,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    info!(
        "Using {:?} transport, {} frames per block",
        options.transport, options.block_size
    );

    match run(options).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
