use crate::chain::{CreateChain, CreateInfo};
use crate::identity::Uuid;
use crate::object::{Object, ObjectHandle, ObjectKind};
use crate::properties::{DriverProperties, EnumerateFlags, LayerProperties};
use crate::result::{fill_buffer, SkError, SkResult, SkStatus};
use crate::table::{CreateFn, Dispatchable};
use crate::version::Version;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ApplicationInfo {
    pub application_name: String,
    pub application_version: Version,
    pub engine_name: String,
    pub engine_version: Version,
}

impl ApplicationInfo {
    pub fn new(application_name: impl Into<String>, application_version: Version) -> Self {
        Self {
            application_name: application_name.into(),
            application_version,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InstanceProperties {
    pub application: ApplicationInfo,
    /// Layers of the instance chain, outermost first.
    pub enabled_layers: Vec<Uuid>,
    pub driver_count: usize,
    pub layer_count: usize,
}

dispatch_table! {
    /// Entry points of an instance chain.
    pub struct InstanceTable {
        get_instance_properties: GetInstancePropertiesFn =
            "skGetInstanceProperties" => fn(&Instance) -> SkResult<InstanceProperties>;
        enumerate_instance_driver_properties: EnumerateInstanceDriverPropertiesFn =
            "skEnumerateInstanceDriverProperties"
                => fn(&Instance, EnumerateFlags) -> SkResult<Vec<DriverProperties>>;
        enumerate_instance_layer_properties: EnumerateInstanceLayerPropertiesFn =
            "skEnumerateInstanceLayerProperties"
                => fn(&Instance, EnumerateFlags) -> SkResult<Vec<LayerProperties>>;
    }
}

impl Dispatchable for InstanceTable {
    type CreateInfo = InstanceCreateInfo;
    const KIND: ObjectKind = ObjectKind::Instance;
    const CREATE_SYMBOL: &'static str = "skCreateInstance";
}

pub type Instance = Object<InstanceTable>;
pub type CreateInstanceFn = CreateFn<InstanceTable>;

#[derive(Debug, Clone, Default)]
pub struct InstanceCreateInfo {
    pub application: ApplicationInfo,
    pub chain: CreateChain,
}

impl InstanceCreateInfo {
    pub fn new(application: ApplicationInfo, chain: CreateChain) -> Self {
        Self { application, chain }
    }
}

impl CreateInfo for InstanceCreateInfo {
    fn chain(&self) -> &CreateChain {
        &self.chain
    }

    fn parent(&self) -> Option<ObjectHandle> {
        None
    }
}

impl Object<InstanceTable> {
    pub fn properties(&self) -> SkResult<InstanceProperties> {
        let get = self
            .dispatch()
            .get_instance_properties
            .as_ref()
            .ok_or(SkError::NotSupported)?;
        get(self)
    }

    pub fn driver_properties(&self, flags: EnumerateFlags) -> SkResult<Vec<DriverProperties>> {
        let enumerate = self
            .dispatch()
            .enumerate_instance_driver_properties
            .as_ref()
            .ok_or(SkError::NotSupported)?;
        enumerate(self, flags)
    }

    pub fn layer_properties(&self, flags: EnumerateFlags) -> SkResult<Vec<LayerProperties>> {
        let enumerate = self
            .dispatch()
            .enumerate_instance_layer_properties
            .as_ref()
            .ok_or(SkError::NotSupported)?;
        enumerate(self, flags)
    }

    /// Count (`out == None`) or copy driver properties into `out`.
    pub fn enumerate_driver_properties(
        &self,
        flags: EnumerateFlags,
        out: Option<&mut [DriverProperties]>,
    ) -> SkResult<(usize, SkStatus)> {
        Ok(fill_buffer(&self.driver_properties(flags)?, out))
    }

    pub fn enumerate_layer_properties(
        &self,
        flags: EnumerateFlags,
        out: Option<&mut [LayerProperties]>,
    ) -> SkResult<(usize, SkStatus)> {
        Ok(fill_buffer(&self.layer_properties(flags)?, out))
    }
}
