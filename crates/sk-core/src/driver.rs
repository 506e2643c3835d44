use crate::chain::{CreateChain, CreateInfo};
use crate::object::{Device, Endpoint, Object, ObjectHandle, ObjectKind, SkObject};
use crate::properties::{DeviceProperties, DriverProperties, EndpointProperties};
use crate::result::{SkError, SkResult};
use crate::table::{CreateFn, Dispatchable};

dispatch_table! {
    /// Entry points of a driver chain.
    pub struct DriverTable {
        get_driver_properties: GetDriverPropertiesFn =
            "skGetDriverProperties" => fn(&Driver) -> SkResult<DriverProperties>;
        enumerate_devices: EnumerateDevicesFn =
            "skEnumerateDevices" => fn(&Driver) -> SkResult<Vec<DeviceProperties>>;
        enumerate_device_endpoints: EnumerateDeviceEndpointsFn =
            "skEnumerateDeviceEndpoints" => fn(&Driver, &Device) -> SkResult<Vec<EndpointProperties>>;
    }
}

impl Dispatchable for DriverTable {
    type CreateInfo = DriverCreateInfo;
    const KIND: ObjectKind = ObjectKind::Driver;
    const CREATE_SYMBOL: &'static str = "skCreateDriver";
}

pub type Driver = Object<DriverTable>;
pub type CreateDriverFn = CreateFn<DriverTable>;

#[derive(Debug, Clone, Default)]
pub struct DriverCreateInfo {
    /// Instance the driver is created for.
    pub instance: Option<ObjectHandle>,
    pub chain: CreateChain,
}

impl DriverCreateInfo {
    pub fn new(instance: Option<ObjectHandle>, chain: CreateChain) -> Self {
        Self { instance, chain }
    }
}

impl CreateInfo for DriverCreateInfo {
    fn chain(&self) -> &CreateChain {
        &self.chain
    }

    fn parent(&self) -> Option<ObjectHandle> {
        self.instance
    }
}

impl Object<DriverTable> {
    pub fn properties(&self) -> SkResult<DriverProperties> {
        let get = self
            .dispatch()
            .get_driver_properties
            .as_ref()
            .ok_or(SkError::NotSupported)?;
        get(self)
    }

    pub fn enumerate_devices(&self) -> SkResult<Vec<Device>> {
        let enumerate = self
            .dispatch()
            .enumerate_devices
            .as_ref()
            .ok_or(SkError::NotSupported)?;
        let devices = enumerate(self)?;
        Ok(devices
            .into_iter()
            .map(|properties| Device::new(self, properties))
            .collect())
    }

    /// Endpoints of `device`, which must have been enumerated from this driver.
    pub fn enumerate_endpoints(&self, device: &Device) -> SkResult<Vec<Endpoint>> {
        if device.parent() != Some(self.handle()) {
            log::warn!("device {:?} belongs to another driver", device.handle());
            return Err(SkError::Invalid);
        }
        let enumerate = self
            .dispatch()
            .enumerate_device_endpoints
            .as_ref()
            .ok_or(SkError::NotSupported)?;
        let endpoints = enumerate(self, device)?;
        Ok(endpoints
            .into_iter()
            .map(|properties| Endpoint::new(device, properties))
            .collect())
    }
}
