//! Core object model of the SK audio API.
//!
//! Every layered object (instance, driver, PCM stream) is a chain of nodes,
//! each holding a dispatch table resolved by name from a driver or layer
//! library. Layers are spliced in front of the real implementation at
//! creation time and may service or forward any call. Drivers and layers are
//! discovered and loaded by `sk-loader`; this crate only knows how to build
//! and tear down chains from the [`ProcResolver`]s it is handed.

#[macro_use]
mod table;

mod alloc;
mod chain;
mod driver;
mod identity;
mod instance;
mod object;
mod pcm;
mod proc;
mod properties;
mod result;
mod version;

pub use alloc::{Allocation, AllocationInfo, AllocationScope, Allocator, HostAllocator, SystemAllocator};
pub use chain::{attach_layer, create_object, ChainEntry, CreateChain, CreateInfo, StructureType};
pub use driver::{
    CreateDriverFn, Driver, DriverCreateInfo, DriverTable, EnumerateDeviceEndpointsFn,
    EnumerateDevicesFn, GetDriverPropertiesFn,
};
pub use identity::Uuid;
pub use instance::{
    ApplicationInfo, CreateInstanceFn, EnumerateInstanceDriverPropertiesFn,
    EnumerateInstanceLayerPropertiesFn, GetInstancePropertiesFn, Instance, InstanceCreateInfo,
    InstanceProperties, InstanceTable,
};
pub use object::{
    Device, Endpoint, Libraries, NodeState, Object, ObjectHandle, ObjectKind, ObjectNode, SharedTable,
    SkObject,
};
pub use pcm::{
    CreatePcmStreamFn, GetPcmStreamInfoFn, PcmStream, PcmStreamAvailableFn, PcmStreamConfig,
    PcmStreamCreateInfo, PcmStreamInfo, PcmStreamTable, ReadPcmStreamFn, SampleFormat,
    StartPcmStreamFn, StopPcmStreamFn, WritePcmStreamFn,
};
pub use proc::{resolve_as, Proc, ProcMap, ProcResolver, ProcResolverEntry, ENTRY_SYMBOL};
pub use properties::{
    DeviceProperties, DriverProperties, EndpointDirection, EndpointProperties, EnumerateFlags,
    LayerProperties, SK_MAX_DESCRIPTION_SIZE, SK_MAX_NAME_SIZE,
};
pub use result::{fill_buffer, SkError, SkResult, SkResultCode, SkStatus};
pub use table::{CreateFn, DispatchTable, Dispatchable};
pub use version::Version;
