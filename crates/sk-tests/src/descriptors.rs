use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use tempfile::TempDir;

/// A temporary search path holding descriptor files.
#[derive(Debug)]
pub struct DescriptorTree {
    dir: TempDir,
}

impl DescriptorTree {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("failed to create descriptor dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Where a descriptor's relative `library_path` resolves to.
    pub fn library(&self, file: &str) -> PathBuf {
        self.dir.path().join(file)
    }

    pub fn write(&self, file: &str, descriptor: &Value) -> PathBuf {
        let text = serde_json::to_string_pretty(descriptor).expect("descriptor serializes");
        self.write_raw(file, &text)
    }

    pub fn write_raw(&self, file: &str, text: &str) -> PathBuf {
        let path = self.dir.path().join(file);
        fs::write(&path, text).expect("failed to write descriptor");
        path
    }
}

impl Default for DescriptorTree {
    fn default() -> Self {
        Self::new()
    }
}

/// A driver or layer declaration.
pub fn entry(name: &str, uuid: &str, library: &str) -> Value {
    json!({ "name": name, "uuid": uuid, "library_path": library })
}

pub fn implicit_entry(name: &str, uuid: &str, library: &str) -> Value {
    json!({ "name": name, "uuid": uuid, "library_path": library, "implicit": true })
}

/// A schema 1.0.0 descriptor.
pub fn descriptor(drivers: Vec<Value>, layers: Vec<Value>) -> Value {
    json!({
        "file_format_version": "1.0.0",
        "drivers": drivers,
        "layers": layers,
    })
}
