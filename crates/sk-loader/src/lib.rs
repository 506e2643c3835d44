//! Driver and layer discovery for the SK audio API.
//!
//! The [`Loader`] scans the configured search paths for descriptor files,
//! parses each into a [`Manifest`], and turns requests for named drivers and
//! layers into creation chains that `sk-core` assembles into layered objects.

mod config;
mod error;
mod instance;
mod loader;
pub mod manifest;
mod platform;

pub use config::{SearchConfig, SK_NO_SYSTEM_PATH_VAR, SK_PATH_VAR};
pub use error::{LoaderError, PlatformError};
pub use instance::LOADER_INSTANCE_IDENTITY;
pub use loader::{Loader, LoaderState};
#[cfg(any(test, feature = "fuzzing"))]
pub use manifest::fuzz_parse_descriptor;
pub use manifest::{Manifest, ManifestData, ManifestError, ManifestProperties, SchemaVersion};
pub use platform::{discover_descriptors, LibraryResolver, NativePlatform, Platform, PlatformFactory};
