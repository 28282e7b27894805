//! Device error types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// The transport refused to open (channels unavailable, resource busy).
    #[error("Failed to open audio device: {0}")]
    Open(String),

    /// The transport refused to begin realtime delivery.
    #[error("Failed to start audio device: {0}")]
    Start(String),

    /// Closing or halting the transport failed. The device still reaches its
    /// target state.
    #[error("Transport close failed: {0}")]
    TransportClose(String),

    #[error("Audio device is not open")]
    NotOpen,

    #[error("Audio device is already running")]
    AlreadyRunning,

    #[error("Audio device is not running")]
    NotRunning,

    #[error("Failed to load transport: {0}")]
    Load(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type DeviceResult<T> = Result<T, DeviceError>;
