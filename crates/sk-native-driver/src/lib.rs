//! A driver that only exists as a shared library.
//!
//! The loader tests point a descriptor at the built `cdylib` and drive it
//! through the native platform, so every entry point below runs from code
//! mapped by `libloading`.

use std::sync::Arc;

use sk_core::{
    Allocator, CreateDriverFn, CreateInfo, DeviceProperties, Driver, DriverCreateInfo,
    DriverProperties, EnumerateDevicesFn, GetDriverPropertiesFn, Object, ProcMap, ProcResolver,
    SkError, SkResult, Uuid, Version,
};

pub const IDENTITY: Uuid = Uuid::from_bytes([
    0x5e, 0x1f, 0x0a, 0x7c, 0x2b, 0x44, 0x4d, 0x0e, 0x9a, 0x61, 0x3c, 0x8d, 0x11, 0xf2, 0x07, 0xb5,
]);
pub const NAME: &str = "native";
/// Library file name without the platform prefix and suffix.
pub const LIBRARY: &str = "sk_native_driver";

/// Opened per driver and kept on its terminal node.
struct Session {
    devices: Vec<String>,
}

fn terminal() -> Arc<dyn ProcResolver> {
    let properties: GetDriverPropertiesFn = Arc::new(|_: &Driver| {
        Ok(DriverProperties {
            identity: IDENTITY,
            name: NAME.to_owned(),
            display_name: "Native test driver".to_owned(),
            implementation_version: Version::new(0, 1, 0),
            ..DriverProperties::default()
        })
    });
    let devices: EnumerateDevicesFn = Arc::new(|driver: &Driver| {
        let session = driver
            .terminal_state::<Session>()
            .ok_or(SkError::SystemInternal)?;
        Ok(session
            .devices
            .iter()
            .map(|name| DeviceProperties {
                identity: IDENTITY,
                name: name.clone(),
                display_name: name.to_uppercase(),
            })
            .collect())
    });
    Arc::new(
        ProcMap::new()
            .with("skGetDriverProperties", properties)
            .with("skEnumerateDevices", devices),
    )
}

fn resolver() -> ProcMap {
    let create: CreateDriverFn = Arc::new(
        |info: &DriverCreateInfo, allocator: &Allocator| -> SkResult<Driver> {
            let session = Session {
                devices: vec!["native-out".to_owned(), "native-in".to_owned()],
            };
            Object::terminal(
                IDENTITY,
                info.parent(),
                terminal(),
                Some(Box::new(session)),
                allocator,
            )
        },
    );
    ProcMap::new().with("skCreateDriver", create)
}

sk_core::sk_export_resolver!(resolver());
