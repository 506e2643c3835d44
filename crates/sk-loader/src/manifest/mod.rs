//! Parsed descriptor files.
//!
//! A descriptor is identified by its `file_format_version`. Each supported
//! version has its own parser and storage; [`Manifest`] dispatches every
//! query on the stored version.

mod error;
mod v1;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use sk_core::{
    Allocation, AllocationScope, Allocator, ChainEntry, DriverProperties, EnumerateFlags,
    LayerProperties, Uuid,
};

pub use error::ManifestError;
pub use v1::{EntryV1, ManifestV1};

use crate::error::{LoaderError, PlatformError};
use crate::platform::Platform;

const VERSION_KEY: &str = "file_format_version";

/// Descriptor schema versions understood by this loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaVersion {
    V1_0_0,
}

impl SchemaVersion {
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "1.0.0" => Some(SchemaVersion::V1_0_0),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SchemaVersion::V1_0_0 => "1.0.0",
        }
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Version-specific storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestData {
    V1_0_0(ManifestV1),
}

impl ManifestData {
    /// Parse descriptor text; `path` is used for diagnostics and to resolve
    /// relative library paths.
    pub fn parse(path: &Path, text: &str) -> Result<Self, ManifestError> {
        let value: Value = serde_json::from_str(text).map_err(|source| ManifestError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        let root = value
            .as_object()
            .ok_or_else(|| ManifestError::invalid(path, "root is not an object"))?;
        let version = match root.get(VERSION_KEY) {
            None => {
                return Err(ManifestError::invalid(
                    path,
                    format!("missing `{VERSION_KEY}`"),
                ))
            }
            Some(Value::String(version)) => version,
            Some(_) => return Err(ManifestError::unexpected_type(path, VERSION_KEY, "a string")),
        };
        match SchemaVersion::parse(version) {
            Some(SchemaVersion::V1_0_0) => ManifestV1::from_value(path, root).map(Self::V1_0_0),
            None => Err(ManifestError::Unsupported {
                path: path.to_path_buf(),
                version: version.clone(),
            }),
        }
    }

    pub fn schema_version(&self) -> SchemaVersion {
        match self {
            ManifestData::V1_0_0(_) => SchemaVersion::V1_0_0,
        }
    }
}

/// Parse arbitrary bytes as a descriptor and check what any accepted
/// descriptor must satisfy.
#[cfg(any(test, feature = "fuzzing"))]
pub fn fuzz_parse_descriptor(data: &[u8]) {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(ManifestData::V1_0_0(v1)) = ManifestData::parse(Path::new("fuzz/sk.json"), text)
    else {
        return;
    };
    assert!(v1.drivers().len() <= v1.defined_driver_count());
    assert!(v1.layers().len() <= v1.defined_layer_count());
    for entry in v1.drivers().iter().chain(v1.layers()) {
        assert!(!entry.name.is_empty());
        assert!(entry.name.len() < sk_core::SK_MAX_NAME_SIZE);
        assert!(entry.description.len() < sk_core::SK_MAX_DESCRIPTION_SIZE);
    }
}

/// Entry counts of one descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManifestProperties {
    pub schema_version: SchemaVersion,
    pub valid_driver_count: usize,
    pub defined_driver_count: usize,
    pub valid_layer_count: usize,
    pub defined_layer_count: usize,
}

pub struct Manifest {
    filepath: PathBuf,
    data: ManifestData,
    _allocation: Allocation,
}

impl Manifest {
    /// Read and parse the descriptor at `path`.
    pub fn open(path: impl AsRef<Path>, allocator: &Allocator) -> Result<Self, LoaderError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let data = ManifestData::parse(path, &text)?;
        let allocation =
            allocator.reserve_for::<Manifest>(AllocationScope::Manifest, None, Uuid::NIL)?;
        log::debug!(
            "parsed {} (schema {})",
            path.display(),
            data.schema_version()
        );
        Ok(Self {
            filepath: path.to_path_buf(),
            data,
            _allocation: allocation,
        })
    }

    pub fn filepath(&self) -> &Path {
        &self.filepath
    }

    pub fn schema_version(&self) -> SchemaVersion {
        self.data.schema_version()
    }

    pub fn data(&self) -> &ManifestData {
        &self.data
    }

    pub fn properties(&self) -> ManifestProperties {
        match &self.data {
            ManifestData::V1_0_0(v1) => ManifestProperties {
                schema_version: SchemaVersion::V1_0_0,
                valid_driver_count: v1.drivers().len(),
                defined_driver_count: v1.defined_driver_count(),
                valid_layer_count: v1.layers().len(),
                defined_layer_count: v1.defined_layer_count(),
            },
        }
    }

    pub fn enumerate_driver_properties(&self, flags: EnumerateFlags) -> Vec<DriverProperties> {
        match &self.data {
            ManifestData::V1_0_0(v1) => v1.driver_properties(flags),
        }
    }

    pub fn enumerate_layer_properties(&self, flags: EnumerateFlags) -> Vec<LayerProperties> {
        match &self.data {
            ManifestData::V1_0_0(v1) => v1.layer_properties(flags),
        }
    }

    /// Chain entry for the driver `name`, loading its library.
    ///
    /// `Ok(None)` when this descriptor has no valid driver of that name.
    pub fn driver_create_info(
        &self,
        name: &str,
        platform: &dyn Platform,
    ) -> Result<Option<ChainEntry>, PlatformError> {
        match &self.data {
            ManifestData::V1_0_0(v1) => v1
                .driver(name)
                .map(|entry| {
                    let resolver = platform.load_library(&entry.library_path)?;
                    Ok(ChainEntry::driver(entry.identity, resolver))
                })
                .transpose(),
        }
    }

    /// Identity of the layer `name`, if this descriptor defines it.
    pub fn layer_identity(&self, name: &str) -> Option<Uuid> {
        match &self.data {
            ManifestData::V1_0_0(v1) => v1.layer(name).map(|entry| entry.identity),
        }
    }

    pub fn layer_create_info(
        &self,
        name: &str,
        platform: &dyn Platform,
    ) -> Result<Option<ChainEntry>, PlatformError> {
        match &self.data {
            ManifestData::V1_0_0(v1) => v1
                .layer(name)
                .map(|entry| {
                    let resolver = platform.load_library(&entry.library_path)?;
                    Ok(ChainEntry::layer(entry.identity, resolver))
                })
                .transpose(),
        }
    }
}

impl fmt::Debug for Manifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manifest")
            .field("filepath", &self.filepath)
            .field("data", &self.data)
            .finish()
    }
}
