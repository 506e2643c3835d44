use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

use sk_core::{
    create_object, fill_buffer, Allocator, ApplicationInfo, ChainEntry, CreateChain, Driver,
    DriverCreateInfo, DriverProperties, DriverTable, EnumerateFlags, Instance, InstanceCreateInfo,
    InstanceTable, LayerProperties, SkError, SkObject, SkResult, SkStatus, Uuid,
};

use crate::config::SearchConfig;
use crate::error::LoaderError;
use crate::instance::terminal_entry;
use crate::manifest::Manifest;
use crate::platform::{NativePlatform, Platform, PlatformFactory};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoaderState {
    Uninitialized,
    Initializing,
    Initialized,
}

/// Discovers drivers and layers and assembles objects from them.
///
/// Discovery runs lazily on the first query and is kept until
/// [`Loader::deinitialize`].
pub struct Loader {
    allocator: Allocator,
    state: LoaderState,
    factory: PlatformFactory,
    platform: Option<Box<dyn Platform>>,
    search_paths: Vec<PathBuf>,
    manifests: Vec<Manifest>,
}

impl Loader {
    /// Loader over the host filesystem, configured from the environment.
    pub fn new() -> Self {
        Self::with_search_config(SearchConfig::from_env())
    }

    pub fn with_search_config(config: SearchConfig) -> Self {
        Self::with_platform(Box::new(move || {
            Ok(Box::new(NativePlatform::new(config.clone())) as Box<dyn Platform>)
        }))
    }

    pub fn with_platform(factory: PlatformFactory) -> Self {
        Self {
            allocator: Allocator::default(),
            state: LoaderState::Uninitialized,
            factory,
            platform: None,
            search_paths: Vec::new(),
            manifests: Vec::new(),
        }
    }

    pub fn state(&self) -> LoaderState {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        self.state == LoaderState::Initialized
    }

    pub fn allocator(&self) -> &Allocator {
        &self.allocator
    }

    /// Replace the allocator; only allowed before discovery.
    pub fn set_allocator(&mut self, allocator: Allocator) -> Result<(), LoaderError> {
        if self.state != LoaderState::Uninitialized {
            log::warn!("allocator cannot change once the loader is initialized");
            return Err(LoaderError::InvalidState(
                "allocator must be set before initialization",
            ));
        }
        self.allocator = allocator;
        Ok(())
    }

    /// Discover descriptors; a no-op when already done or in progress.
    pub fn initialize(&mut self) -> Result<(), LoaderError> {
        if self.state != LoaderState::Uninitialized {
            return Ok(());
        }
        self.state = LoaderState::Initializing;
        match self.discover() {
            Ok(()) => {
                self.state = LoaderState::Initialized;
                Ok(())
            }
            Err(err) => {
                log::warn!("loader initialization failed: {err}");
                self.deinitialize();
                Err(err)
            }
        }
    }

    pub fn ensure_initialized(&mut self) -> Result<(), LoaderError> {
        self.initialize()
    }

    fn discover(&mut self) -> Result<(), LoaderError> {
        let platform = (self.factory)()?;
        let search_paths = platform.search_paths();
        let files = platform.descriptor_files(&search_paths);
        log::debug!(
            "discovering descriptors for {:?} (home {:?}): {} candidates in {} search paths",
            platform.executable_path(),
            platform.home_dir(),
            files.len(),
            search_paths.len()
        );

        let mut manifests = Vec::with_capacity(files.len());
        for file in &files {
            match Manifest::open(file, &self.allocator) {
                Ok(manifest) => manifests.push(manifest),
                Err(LoaderError::Manifest(err)) => {
                    log::warn!("skipping descriptor: {err}");
                }
                Err(err) => return Err(err),
            }
        }
        log::debug!("loaded {} of {} descriptors", manifests.len(), files.len());

        self.platform = Some(platform);
        self.search_paths = search_paths;
        self.manifests = manifests;
        Ok(())
    }

    /// Release everything discovery produced. Objects already created keep
    /// their libraries loaded.
    pub fn deinitialize(&mut self) {
        self.manifests.clear();
        self.search_paths.clear();
        self.platform = None;
        self.state = LoaderState::Uninitialized;
    }

    pub fn search_paths(&mut self) -> SkResult<&[PathBuf]> {
        self.ensure_initialized()?;
        Ok(&self.search_paths)
    }

    pub fn manifests(&mut self) -> SkResult<&[Manifest]> {
        self.ensure_initialized()?;
        Ok(&self.manifests)
    }

    /// Home directory reported by the platform.
    pub fn home_dir(&mut self) -> SkResult<Option<PathBuf>> {
        self.ensure_initialized()?;
        Ok(self.platform()?.home_dir())
    }

    /// Path of the running executable as reported by the platform.
    pub fn executable_path(&mut self) -> SkResult<Option<PathBuf>> {
        self.ensure_initialized()?;
        Ok(self.platform()?.executable_path())
    }

    fn platform(&self) -> SkResult<&dyn Platform> {
        self.platform.as_deref().ok_or_else(|| {
            log::error!("loader has no platform after initialization");
            SkError::SystemInternal
        })
    }

    pub fn driver_properties(&mut self, flags: EnumerateFlags) -> SkResult<Vec<DriverProperties>> {
        self.ensure_initialized()?;
        Ok(self
            .manifests
            .iter()
            .flat_map(|manifest| manifest.enumerate_driver_properties(flags))
            .collect())
    }

    pub fn layer_properties(&mut self, flags: EnumerateFlags) -> SkResult<Vec<LayerProperties>> {
        self.ensure_initialized()?;
        Ok(self
            .manifests
            .iter()
            .flat_map(|manifest| manifest.enumerate_layer_properties(flags))
            .collect())
    }

    /// Count (`out == None`) or copy driver properties into `out`.
    ///
    /// Returns [`SkStatus::Incomplete`] when `out` is too small; the entries
    /// written are still valid.
    pub fn enumerate_driver_properties(
        &mut self,
        flags: EnumerateFlags,
        out: Option<&mut [DriverProperties]>,
    ) -> SkResult<(usize, SkStatus)> {
        let all = self.driver_properties(flags)?;
        Ok(fill_buffer(&all, out))
    }

    pub fn enumerate_layer_properties(
        &mut self,
        flags: EnumerateFlags,
        out: Option<&mut [LayerProperties]>,
    ) -> SkResult<(usize, SkStatus)> {
        let all = self.layer_properties(flags)?;
        Ok(fill_buffer(&all, out))
    }

    /// One chain entry per descriptor defining a loadable driver `name`,
    /// in discovery order.
    pub fn enumerate_driver_create_infos(&mut self, name: &str) -> SkResult<Vec<ChainEntry>> {
        self.ensure_initialized()?;
        let platform = self.platform()?;
        let mut entries = Vec::new();
        for manifest in &self.manifests {
            match manifest.driver_create_info(name, platform) {
                Ok(Some(entry)) => entries.push(entry),
                Ok(None) => {}
                Err(err) => log::warn!(
                    "skipping driver `{name}` from {}: {err}",
                    manifest.filepath().display()
                ),
            }
        }
        Ok(entries)
    }

    pub fn enumerate_layer_create_infos(&mut self, name: &str) -> SkResult<Vec<ChainEntry>> {
        self.ensure_initialized()?;
        let platform = self.platform()?;
        let mut entries = Vec::new();
        for manifest in &self.manifests {
            match manifest.layer_create_info(name, platform) {
                Ok(Some(entry)) => entries.push(entry),
                Ok(None) => {}
                Err(err) => log::warn!(
                    "skipping layer `{name}` from {}: {err}",
                    manifest.filepath().display()
                ),
            }
        }
        Ok(entries)
    }

    /// First installation of layer `name` whose library loads.
    ///
    /// With `identity`, installations declaring another identity are passed
    /// over without loading anything.
    fn first_layer_create_info(
        &mut self,
        name: &str,
        identity: Option<Uuid>,
    ) -> SkResult<Option<ChainEntry>> {
        self.ensure_initialized()?;
        let platform = self.platform()?;
        for manifest in &self.manifests {
            let Some(declared) = manifest.layer_identity(name) else {
                continue;
            };
            if identity.is_some_and(|wanted| wanted != declared) {
                continue;
            }
            match manifest.layer_create_info(name, platform) {
                Ok(Some(entry)) => return Ok(Some(entry)),
                Ok(None) => {}
                Err(err) => log::warn!(
                    "skipping layer `{name}` from {}: {err}",
                    manifest.filepath().display()
                ),
            }
        }
        Ok(None)
    }

    /// Requested layers in order, then implicit layers not already present.
    fn layer_chain(&mut self, requested: &[&str]) -> SkResult<CreateChain> {
        let mut chain = CreateChain::new();
        let mut seen = HashSet::new();
        for name in requested {
            let Some(entry) = self.first_layer_create_info(name, None)? else {
                log::warn!("requested layer `{name}` is not available");
                return Err(SkError::NotFound);
            };
            if seen.insert(entry.identity) {
                chain.push(entry);
            }
        }
        for layer in self.layer_properties(EnumerateFlags::ImplicitOnly)? {
            if seen.contains(&layer.identity) {
                continue;
            }
            match self.first_layer_create_info(&layer.name, Some(layer.identity))? {
                Some(entry) => {
                    seen.insert(entry.identity);
                    chain.push(entry);
                }
                None => log::warn!("implicit layer `{}` could not be loaded", layer.name),
            }
        }
        Ok(chain)
    }

    /// Create an instance through the requested and implicit layers.
    pub fn create_instance(
        &mut self,
        application: ApplicationInfo,
        layers: &[&str],
    ) -> SkResult<Instance> {
        let mut chain = self.layer_chain(layers)?;
        let drivers = self.driver_properties(EnumerateFlags::All)?;
        let available = self.layer_properties(EnumerateFlags::All)?;
        chain.push(terminal_entry(drivers, available));
        let info = InstanceCreateInfo::new(application, chain);
        create_object::<InstanceTable>(&info, &self.allocator)
    }

    /// Create the driver `name` for `instance`, trying each installation in
    /// discovery order until one succeeds.
    pub fn create_driver(
        &mut self,
        instance: &Instance,
        name: &str,
        layers: &[&str],
    ) -> SkResult<Driver> {
        let candidates = self.enumerate_driver_create_infos(name)?;
        if candidates.is_empty() {
            log::warn!("no driver named `{name}` is available");
            return Err(SkError::NotFound);
        }
        let layer_chain = self.layer_chain(layers)?;

        let mut last = SkError::NotFound;
        for candidate in candidates {
            let identity = candidate.identity;
            let chain = layer_chain.clone().with(candidate);
            let info = DriverCreateInfo::new(Some(instance.handle()), chain);
            match create_object::<DriverTable>(&info, &self.allocator) {
                Ok(driver) => return Ok(driver),
                Err(err) => {
                    log::warn!("driver `{name}` ({identity}) failed to initialize: {err}");
                    last = err;
                }
            }
        }
        Err(last)
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Loader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loader")
            .field("state", &self.state)
            .field("search_paths", &self.search_paths)
            .field("manifests", &self.manifests.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    use super::*;
    use crate::error::PlatformError;

    fn write_descriptor(dir: &std::path::Path, file: &str, drivers: &[(&str, &str)]) {
        let drivers: Vec<String> = drivers
            .iter()
            .map(|(name, uuid)| {
                format!(r#"{{ "name": "{name}", "uuid": "{uuid}", "library_path": "lib{name}.so" }}"#)
            })
            .collect();
        fs::write(
            dir.join(file),
            format!(
                r#"{{ "file_format_version": "1.0.0", "drivers": [{}] }}"#,
                drivers.join(",")
            ),
        )
        .unwrap();
    }

    #[test]
    fn initialization_is_lazy_and_idempotent() {
        let dir = tempdir().unwrap();
        write_descriptor(
            dir.path(),
            "a.json",
            &[("alsa", "0f1e2d3c-4b5a-6978-8796-a5b4c3d2e1f0")],
        );
        fs::write(dir.path().join("broken.json"), "{ not json").unwrap();

        let builds = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&builds);
        let root = dir.path().to_path_buf();
        let mut loader = Loader::with_platform(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(NativePlatform::new(SearchConfig::isolated([root.clone()])))
                as Box<dyn Platform>)
        }));
        assert_eq!(loader.state(), LoaderState::Uninitialized);

        let drivers = loader.driver_properties(EnumerateFlags::All).unwrap();
        assert_eq!(drivers.len(), 1);
        loader.initialize().unwrap();
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert_eq!(loader.manifests().unwrap().len(), 1);

        loader.deinitialize();
        assert!(!loader.is_initialized());
        loader.initialize().unwrap();
        assert_eq!(builds.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn allocator_is_fixed_after_initialization() {
        let dir = tempdir().unwrap();
        let mut loader = Loader::with_search_config(SearchConfig::isolated([dir
            .path()
            .to_path_buf()]));
        loader.set_allocator(Allocator::default()).unwrap();
        loader.initialize().unwrap();
        let err = loader.set_allocator(Allocator::default()).unwrap_err();
        assert!(matches!(err, LoaderError::InvalidState(_)));
        assert_eq!(SkError::from(err), SkError::SystemInternal);
    }

    #[test]
    fn platform_failure_leaves_loader_uninitialized() {
        let mut loader = Loader::with_platform(Box::new(|| {
            Err(PlatformError::Unavailable("no filesystem".into()))
        }));
        let err = loader.initialize().unwrap_err();
        assert_eq!(SkError::from(err), SkError::InitializationFailed);
        assert_eq!(loader.state(), LoaderState::Uninitialized);
        assert_eq!(
            loader.driver_properties(EnumerateFlags::All).unwrap_err(),
            SkError::InitializationFailed
        );
    }

    #[test]
    fn unloadable_driver_is_not_a_candidate() {
        let dir = tempdir().unwrap();
        write_descriptor(
            dir.path(),
            "a.json",
            &[("alsa", "0f1e2d3c-4b5a-6978-8796-a5b4c3d2e1f0")],
        );
        let mut loader =
            Loader::with_search_config(SearchConfig::isolated([dir.path().to_path_buf()]));
        assert!(loader.enumerate_driver_create_infos("alsa").unwrap().is_empty());
        assert!(loader.enumerate_driver_create_infos("missing").unwrap().is_empty());

        let instance = loader
            .create_instance(ApplicationInfo::default(), &[])
            .unwrap();
        assert_eq!(
            loader.create_driver(&instance, "alsa", &[]).unwrap_err(),
            SkError::NotFound
        );
        assert_eq!(
            loader.create_instance(ApplicationInfo::default(), &["nope"]).unwrap_err(),
            SkError::NotFound
        );
    }
}
