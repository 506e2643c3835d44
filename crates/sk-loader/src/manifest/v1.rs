//! Schema `1.0.0` of the descriptor file.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use sk_core::{
    DriverProperties, EnumerateFlags, LayerProperties, Uuid, Version, SK_MAX_DESCRIPTION_SIZE,
    SK_MAX_NAME_SIZE,
};

use super::ManifestError;

const DRIVERS: &str = "drivers";
const LAYERS: &str = "layers";

/// Which kind of entry a list holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    Driver,
    Layer,
}

impl EntryKind {
    fn key(self) -> &'static str {
        match self {
            EntryKind::Driver => DRIVERS,
            EntryKind::Layer => LAYERS,
        }
    }

    fn label(self) -> &'static str {
        match self {
            EntryKind::Driver => "driver",
            EntryKind::Layer => "layer",
        }
    }
}

/// A valid driver or layer declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryV1 {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub identity: Uuid,
    pub implementation_version: Version,
    /// Absolute, or relative to the working directory when the descriptor
    /// path itself was relative.
    pub library_path: PathBuf,
    pub implicit: bool,
}

impl EntryV1 {
    pub fn driver_properties(&self) -> DriverProperties {
        DriverProperties {
            identity: self.identity,
            name: self.name.clone(),
            display_name: self.display_name.clone(),
            description: self.description.clone(),
            implementation_version: self.implementation_version,
            implicit: self.implicit,
        }
    }

    pub fn layer_properties(&self) -> LayerProperties {
        LayerProperties {
            identity: self.identity,
            name: self.name.clone(),
            display_name: self.display_name.clone(),
            description: self.description.clone(),
            implementation_version: self.implementation_version,
            implicit: self.implicit,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestV1 {
    drivers: Vec<EntryV1>,
    layers: Vec<EntryV1>,
    defined_drivers: usize,
    defined_layers: usize,
}

impl ManifestV1 {
    pub fn from_value(path: &Path, root: &Map<String, Value>) -> Result<Self, ManifestError> {
        if !root.contains_key(DRIVERS) && !root.contains_key(LAYERS) {
            return Err(ManifestError::invalid(
                path,
                "declares neither `drivers` nor `layers`",
            ));
        }
        let (drivers, defined_drivers) = parse_entries(path, root, EntryKind::Driver)?;
        let (layers, defined_layers) = parse_entries(path, root, EntryKind::Layer)?;
        Ok(Self {
            drivers,
            layers,
            defined_drivers,
            defined_layers,
        })
    }

    pub fn drivers(&self) -> &[EntryV1] {
        &self.drivers
    }

    pub fn layers(&self) -> &[EntryV1] {
        &self.layers
    }

    pub fn defined_driver_count(&self) -> usize {
        self.defined_drivers
    }

    pub fn defined_layer_count(&self) -> usize {
        self.defined_layers
    }

    pub fn driver(&self, name: &str) -> Option<&EntryV1> {
        self.drivers.iter().find(|entry| entry.name == name)
    }

    pub fn layer(&self, name: &str) -> Option<&EntryV1> {
        self.layers.iter().find(|entry| entry.name == name)
    }

    pub fn driver_properties(&self, flags: EnumerateFlags) -> Vec<DriverProperties> {
        self.drivers
            .iter()
            .filter(|entry| flags.admits(entry.implicit))
            .map(EntryV1::driver_properties)
            .collect()
    }

    pub fn layer_properties(&self, flags: EnumerateFlags) -> Vec<LayerProperties> {
        self.layers
            .iter()
            .filter(|entry| flags.admits(entry.implicit))
            .map(EntryV1::layer_properties)
            .collect()
    }
}

/// Valid entries of one list plus the number of entries it declares.
fn parse_entries(
    path: &Path,
    root: &Map<String, Value>,
    kind: EntryKind,
) -> Result<(Vec<EntryV1>, usize), ManifestError> {
    let Some(list) = root.get(kind.key()) else {
        return Ok((Vec::new(), 0));
    };
    let list = list
        .as_array()
        .ok_or_else(|| ManifestError::unexpected_type(path, kind.key(), "an array"))?;

    let mut entries: Vec<EntryV1> = Vec::with_capacity(list.len());
    let mut names = HashSet::new();
    let mut identities = HashSet::new();
    for (index, value) in list.iter().enumerate() {
        let field = format!("{}[{index}]", kind.key());
        let object = value
            .as_object()
            .ok_or_else(|| ManifestError::unexpected_type(path, field.as_str(), "an object"))?;
        let Some(entry) = parse_entry(path, &field, object)? else {
            continue;
        };
        if !names.insert(entry.name.clone()) {
            return Err(ManifestError::Duplicate {
                path: path.to_path_buf(),
                kind: kind.label(),
                what: entry.name,
            });
        }
        if !identities.insert(entry.identity) {
            return Err(ManifestError::Duplicate {
                path: path.to_path_buf(),
                kind: kind.label(),
                what: entry.identity.to_string(),
            });
        }
        entries.push(entry);
    }
    Ok((entries, list.len()))
}

/// Shape errors fail the whole descriptor; value errors only drop the entry.
fn parse_entry(
    path: &Path,
    field: &str,
    object: &Map<String, Value>,
) -> Result<Option<EntryV1>, ManifestError> {
    let name = string_field(path, field, object, "name", SK_MAX_NAME_SIZE)?;
    let uuid = string_field(path, field, object, "uuid", usize::MAX)?;
    let library_path = string_field(path, field, object, "library_path", usize::MAX)?;
    let display_name = string_field(path, field, object, "display_name", SK_MAX_NAME_SIZE)?;
    let description = string_field(path, field, object, "description", SK_MAX_DESCRIPTION_SIZE)?;
    let version = string_field(path, field, object, "implementation_version", usize::MAX)?;
    let implicit = match object.get("implicit") {
        None => false,
        Some(value) => value.as_bool().ok_or_else(|| {
            ManifestError::unexpected_type(path, format!("{field}.implicit"), "a boolean")
        })?,
    };

    let (Some(name), Some(uuid), Some(library_path)) = (name, uuid, library_path) else {
        log::warn!(
            "{}: {field} lacks one of `name`, `uuid`, `library_path`; ignoring it",
            path.display()
        );
        return Ok(None);
    };
    if name.is_empty() || library_path.is_empty() {
        log::warn!("{}: {field} has an empty name or library path; ignoring it", path.display());
        return Ok(None);
    }
    let Ok(identity) = Uuid::parse(uuid) else {
        log::warn!("{}: {field} has malformed uuid {uuid:?}; ignoring it", path.display());
        return Ok(None);
    };
    let implementation_version = match version {
        None => Version::default(),
        Some(text) => match Version::parse(text) {
            Ok(version) => version,
            Err(_) => {
                log::warn!(
                    "{}: {field} has malformed implementation_version {text:?}; ignoring it",
                    path.display()
                );
                return Ok(None);
            }
        },
    };

    Ok(Some(EntryV1 {
        name: name.to_owned(),
        display_name: display_name.unwrap_or(name).to_owned(),
        description: description.unwrap_or_default().to_owned(),
        identity,
        implementation_version,
        library_path: resolve_library_path(path, library_path),
        implicit,
    }))
}

/// Optional string field no longer than `limit - 1` bytes.
fn string_field<'a>(
    path: &Path,
    field: &str,
    object: &'a Map<String, Value>,
    key: &str,
    limit: usize,
) -> Result<Option<&'a str>, ManifestError> {
    let Some(value) = object.get(key) else {
        return Ok(None);
    };
    let text = value
        .as_str()
        .ok_or_else(|| ManifestError::unexpected_type(path, format!("{field}.{key}"), "a string"))?;
    if text.len() >= limit {
        return Err(ManifestError::Overflow {
            path: path.to_path_buf(),
            field: format!("{field}.{key}"),
            len: text.len(),
            limit,
        });
    }
    Ok(Some(text))
}

fn resolve_library_path(descriptor: &Path, library: &str) -> PathBuf {
    let library = Path::new(library);
    if library.is_absolute() {
        return library.to_path_buf();
    }
    descriptor
        .parent()
        .map(|dir| dir.join(library))
        .unwrap_or_else(|| library.to_path_buf())
}
