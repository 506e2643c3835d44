//! The loader's own implementation of the instance entry points, used as the
//! terminal of every instance chain.

use std::sync::Arc;

use sk_core::{
    Allocator, ApplicationInfo, ChainEntry, CreateInstanceFn, DriverProperties,
    EnumerateFlags, EnumerateInstanceDriverPropertiesFn, EnumerateInstanceLayerPropertiesFn,
    GetInstancePropertiesFn, Instance, InstanceCreateInfo, InstanceProperties, LayerProperties,
    Object, ProcMap, SkError, SkResult, StructureType, Uuid,
};

/// Identity of the loader-provided instance terminal.
pub const LOADER_INSTANCE_IDENTITY: Uuid = Uuid::from_bytes([
    0x5b, 0x0c, 0x4e, 0x6a, 0x2f, 0x31, 0x4d, 0x8e, 0x9a, 0x1b, 0x7c, 0x3d, 0x00, 0x00, 0x00, 0x01,
]);

/// What the loader knew when the instance was created.
#[derive(Debug, Clone)]
struct InstanceSnapshot {
    application: ApplicationInfo,
    drivers: Vec<DriverProperties>,
    layers: Vec<LayerProperties>,
}

fn snapshot(instance: &Instance) -> SkResult<&InstanceSnapshot> {
    instance.terminal_state::<InstanceSnapshot>().ok_or_else(|| {
        log::error!("instance terminal has no loader snapshot");
        SkError::SystemInternal
    })
}

fn entry_points() -> ProcMap {
    let get_properties: GetInstancePropertiesFn =
        Arc::new(|instance: &Instance| -> SkResult<InstanceProperties> {
            let snapshot = snapshot(instance)?;
            Ok(InstanceProperties {
                application: snapshot.application.clone(),
                enabled_layers: instance.layer_identities(),
                driver_count: snapshot.drivers.len(),
                layer_count: snapshot.layers.len(),
            })
        });
    let drivers: EnumerateInstanceDriverPropertiesFn = Arc::new(
        |instance: &Instance, flags: EnumerateFlags| -> SkResult<Vec<DriverProperties>> {
            Ok(snapshot(instance)?
                .drivers
                .iter()
                .filter(|driver| flags.admits(driver.implicit))
                .cloned()
                .collect())
        },
    );
    let layers: EnumerateInstanceLayerPropertiesFn = Arc::new(
        |instance: &Instance, flags: EnumerateFlags| -> SkResult<Vec<LayerProperties>> {
            Ok(snapshot(instance)?
                .layers
                .iter()
                .filter(|layer| flags.admits(layer.implicit))
                .cloned()
                .collect())
        },
    );
    ProcMap::new()
        .with("skGetInstanceProperties", get_properties)
        .with("skEnumerateInstanceDriverProperties", drivers)
        .with("skEnumerateInstanceLayerProperties", layers)
}

/// Chain entry that builds the instance terminal over the given snapshot.
pub(crate) fn terminal_entry(
    drivers: Vec<DriverProperties>,
    layers: Vec<LayerProperties>,
) -> ChainEntry {
    let create: CreateInstanceFn = Arc::new(
        move |info: &InstanceCreateInfo, allocator: &Allocator| -> SkResult<Instance> {
            let state = InstanceSnapshot {
                application: info.application.clone(),
                drivers: drivers.clone(),
                layers: layers.clone(),
            };
            Object::terminal(
                LOADER_INSTANCE_IDENTITY,
                None,
                Arc::new(entry_points()),
                Some(Box::new(state)),
                allocator,
            )
        },
    );
    ChainEntry::new(
        StructureType::InstanceCreateInfo,
        LOADER_INSTANCE_IDENTITY,
        Arc::new(ProcMap::new().with("skCreateInstance", create)),
    )
}
