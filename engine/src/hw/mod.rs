pub mod config;
pub mod error_fmt;
pub mod options;
pub mod raspa;
pub mod sim;
pub mod traits;

pub use self::options::{AdapterOptions, TransportKind};
pub use self::raspa::RaspaTransport;
pub use self::sim::{SimConfig, SimMonitor, SimTransport};
pub use self::traits::{BlockCallback, Status, Transport};

use crate::error::DeviceResult;

/// Build the transport selected in `options`.
pub fn open_transport(options: &AdapterOptions) -> DeviceResult<Box<dyn Transport>> {
    match options.transport {
        TransportKind::Raspa => Ok(Box::new(RaspaTransport::load(
            &options.raspa_library,
            options.raspa_debug_flags,
        )?)),
        TransportKind::Sim => Ok(Box::new(SimTransport::new(options.sim.clone()))),
    }
}
