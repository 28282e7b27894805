//! Realtime audio device adapter for the Elk Pi.
//!
//! Bridges the RASPA driver, which calls back once per block from its RT
//! task with planar float buffers, to an [`AudioIODeviceCallback`] that
//! receives per-channel buffers.
//!
//! ```text
//! transport ──▶ RealtimeBridge ──▶ ChannelPointers::map ──▶ callback.io_callback
//!     ▲               │ (registry lock)
//!     └── DeviceAdapter::open/start/stop/close (management thread)
//! ```

pub mod bridge;
pub mod buffer;
pub mod callback;
pub mod device;
pub mod device_type;
pub mod error;
pub mod hw;

pub use bridge::{RealtimeBridge, XRUNS_UNKNOWN};
pub use buffer::{ChannelPointers, InputChannels, OutputChannels};
pub use callback::{AudioIODeviceCallback, CallbackRegistry};
pub use device::{AudioIODevice, ChannelMask, DEVICE_NAME, DeviceAdapter, DeviceState, TYPE_NAME};
pub use device_type::{AudioIODeviceType, ElkPiDeviceType};
pub use error::{DeviceError, DeviceResult};
pub use hw::{AdapterOptions, SimConfig, SimMonitor, SimTransport, Status, Transport, TransportKind};
