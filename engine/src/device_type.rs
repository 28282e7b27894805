//! Device-type entry point. There is exactly one physical target, so the
//! type always lists a single device.

use crate::device::{AudioIODevice, DEVICE_NAME, DeviceAdapter, TYPE_NAME};
use crate::error::DeviceResult;
use crate::hw::options::AdapterOptions;
use crate::hw::traits::Transport;
use crate::hw::open_transport;

pub trait AudioIODeviceType {
    fn type_name(&self) -> &str;
    fn device_names(&self, want_inputs: bool) -> Vec<String>;
    fn scan_for_devices(&mut self);
    fn default_device_index(&self, for_input: bool) -> usize;
    fn index_of_device(&self, device: Option<&dyn AudioIODevice>, as_input: bool) -> Option<usize>;
    fn has_separate_inputs_and_outputs(&self) -> bool;
    /// `Ok(None)` when neither name belongs to this type.
    fn create_device(
        &self,
        output_name: &str,
        input_name: &str,
    ) -> DeviceResult<Option<Box<dyn AudioIODevice>>>;
}

type TransportFactory = Box<dyn Fn(&AdapterOptions) -> DeviceResult<Box<dyn Transport>> + Send + Sync>;

pub struct ElkPiDeviceType {
    options: AdapterOptions,
    factory: TransportFactory,
}

impl ElkPiDeviceType {
    /// Devices use the transport selected in `options`.
    pub fn new(options: AdapterOptions) -> Self {
        Self::with_factory(options, open_transport)
    }

    pub fn with_factory(
        options: AdapterOptions,
        factory: impl Fn(&AdapterOptions) -> DeviceResult<Box<dyn Transport>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            options,
            factory: Box::new(factory),
        }
    }

    /// Like [`AudioIODeviceType::create_device`] but keeps the concrete type.
    pub fn create_adapter(&self) -> DeviceResult<DeviceAdapter> {
        tracing::debug!("Creating {DEVICE_NAME} device");
        let transport = (self.factory)(&self.options)?;
        Ok(DeviceAdapter::new(transport, self.options.clone()))
    }
}

impl AudioIODeviceType for ElkPiDeviceType {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    fn device_names(&self, _want_inputs: bool) -> Vec<String> {
        vec![DEVICE_NAME.to_string()]
    }

    fn scan_for_devices(&mut self) {}

    fn default_device_index(&self, _for_input: bool) -> usize {
        0
    }

    fn index_of_device(&self, device: Option<&dyn AudioIODevice>, _as_input: bool) -> Option<usize> {
        device.map(|_| 0)
    }

    fn has_separate_inputs_and_outputs(&self) -> bool {
        false
    }

    fn create_device(
        &self,
        output_name: &str,
        input_name: &str,
    ) -> DeviceResult<Option<Box<dyn AudioIODevice>>> {
        if output_name != DEVICE_NAME && input_name != DEVICE_NAME {
            return Ok(None);
        }
        Ok(Some(Box::new(self.create_adapter()?)))
    }
}
