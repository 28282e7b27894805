use super::config;
use super::sim::SimConfig;
use crate::error::{DeviceError, DeviceResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Raspa,
    Sim,
}

impl TransportKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "raspa" => Some(Self::Raspa),
            "sim" | "simulated" => Some(Self::Sim),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterOptions {
    /// Fixed block size handed to the transport. Requests for other sizes
    /// are ignored.
    pub block_size: usize,
    pub transport: TransportKind,
    pub raspa_library: PathBuf,
    pub raspa_debug_flags: u32,
    pub sim: SimConfig,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            block_size: config::DEFAULT_BLOCK_SIZE,
            transport: TransportKind::default(),
            raspa_library: PathBuf::from(config::DEFAULT_RASPA_LIB),
            raspa_debug_flags: 0,
            sim: SimConfig::default(),
        }
    }
}

impl AdapterOptions {
    pub fn from_env() -> Self {
        Self::default().with_env(|key| std::env::var(key).ok())
    }

    /// Overlay settings found through `lookup` on top of `self`. Values that
    /// do not parse are skipped with a warning.
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(path) = lookup(config::RASPA_LIB_ENV) {
            self.raspa_library = PathBuf::from(path);
        }
        if let Some(value) = lookup(config::BLOCK_SIZE_ENV) {
            match value.trim().parse::<usize>() {
                Ok(size) if size > 0 => self.block_size = size,
                _ => tracing::warn!("Ignoring invalid {}={value:?}", config::BLOCK_SIZE_ENV),
            }
        }
        if lookup(config::RASPA_DEBUG_ENV).is_some_and(|v| config::flag_value(&v)) {
            self.raspa_debug_flags |= config::RASPA_DEBUG_SIGNAL_ON_MODE_SW;
        }
        if let Some(value) = lookup(config::TRANSPORT_ENV) {
            match TransportKind::parse(&value) {
                Some(kind) => self.transport = kind,
                None => tracing::warn!("Ignoring unknown {}={value:?}", config::TRANSPORT_ENV),
            }
        }
        self
    }

    pub fn from_toml_str(text: &str) -> DeviceResult<Self> {
        let options: Self = toml::from_str(text).map_err(|e| DeviceError::Config(e.to_string()))?;
        if options.block_size == 0 {
            return Err(DeviceError::Config("block_size must be non-zero".to_string()));
        }
        Ok(options)
    }
}
