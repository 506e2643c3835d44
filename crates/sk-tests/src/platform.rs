use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use sk_core::ProcResolver;
use sk_loader::{discover_descriptors, Platform, PlatformError, PlatformFactory};

/// Platform over real descriptor directories whose "libraries" are
/// in-process resolvers registered by path.
#[derive(Clone)]
pub struct MockPlatform {
    roots: Vec<PathBuf>,
    libraries: HashMap<PathBuf, Arc<dyn ProcResolver>>,
    home: Option<PathBuf>,
    executable: Option<PathBuf>,
    scans: Arc<AtomicUsize>,
    loads: Arc<AtomicUsize>,
}

impl MockPlatform {
    pub fn new(roots: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            roots: roots.into_iter().collect(),
            libraries: HashMap::new(),
            home: None,
            executable: None,
            scans: Arc::new(AtomicUsize::new(0)),
            loads: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_library(mut self, path: impl Into<PathBuf>, resolver: Arc<dyn ProcResolver>) -> Self {
        self.libraries.insert(path.into(), resolver);
        self
    }

    /// Host properties to report instead of none.
    pub fn with_host(mut self, home: impl Into<PathBuf>, executable: impl Into<PathBuf>) -> Self {
        self.home = Some(home.into());
        self.executable = Some(executable.into());
        self
    }

    /// Number of descriptor scans performed by every clone of this platform.
    pub fn scans(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn factory(&self) -> PlatformFactory {
        let platform = self.clone();
        Box::new(move || Ok(Box::new(platform.clone()) as Box<dyn Platform>))
    }
}

impl Platform for MockPlatform {
    fn home_dir(&self) -> Option<PathBuf> {
        self.home.clone()
    }

    fn executable_path(&self) -> Option<PathBuf> {
        self.executable.clone()
    }

    fn search_paths(&self) -> Vec<PathBuf> {
        self.roots.clone()
    }

    fn descriptor_files(&self, search_paths: &[PathBuf]) -> Vec<PathBuf> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        discover_descriptors(search_paths, 1)
    }

    fn load_library(&self, path: &Path) -> Result<Arc<dyn ProcResolver>, PlatformError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.libraries.get(path).cloned().ok_or_else(|| {
            PlatformError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no mock library at {}", path.display()),
            ))
        })
    }
}
