//! Host services the loader depends on: search paths, descriptor discovery
//! and native library loading.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use libloading::Library;
use sk_core::{Proc, ProcResolver, ProcResolverEntry, ENTRY_SYMBOL};
use walkdir::WalkDir;

use crate::config::SearchConfig;
use crate::error::PlatformError;

pub trait Platform: Send + Sync {
    fn home_dir(&self) -> Option<PathBuf>;

    fn executable_path(&self) -> Option<PathBuf>;

    /// Directories to scan, in priority order.
    fn search_paths(&self) -> Vec<PathBuf>;

    /// Candidate descriptor files below `search_paths`.
    fn descriptor_files(&self, search_paths: &[PathBuf]) -> Vec<PathBuf>;

    /// Load the library at `path` and return its resolver.
    ///
    /// The library stays loaded for as long as the returned resolver (or any
    /// clone of it) is alive.
    fn load_library(&self, path: &Path) -> Result<Arc<dyn ProcResolver>, PlatformError>;
}

/// Builds the platform on each loader initialization.
pub type PlatformFactory =
    Box<dyn Fn() -> Result<Box<dyn Platform>, PlatformError> + Send + Sync>;

/// Every `*.json` file (any case) within `max_depth` of each root.
///
/// Roots are visited in order and files of one directory sorted by name;
/// a file reachable from two roots is reported once.
pub fn discover_descriptors(roots: &[PathBuf], max_depth: usize) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    let mut found = Vec::new();
    for root in roots {
        if !root.is_dir() {
            log::debug!("skipping missing search path {}", root.display());
            continue;
        }
        let walker = WalkDir::new(root)
            .max_depth(max_depth)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    if let Some(io) = err.io_error() {
                        log::debug!("skipping entry while scanning {}: {}", root.display(), io);
                    }
                    continue;
                }
            };
            if !entry.file_type().is_file() || !is_descriptor(entry.path()) {
                continue;
            }
            let path = entry.into_path();
            if seen.insert(path.clone()) {
                found.push(path);
            }
        }
    }
    log::debug!(
        "found {} descriptor files in {} search paths",
        found.len(),
        roots.len()
    );
    found
}

fn is_descriptor(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Filesystem and `libloading` backed platform.
#[derive(Debug, Clone)]
pub struct NativePlatform {
    config: SearchConfig,
}

impl NativePlatform {
    pub fn new(config: SearchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }
}

impl Default for NativePlatform {
    fn default() -> Self {
        Self::new(SearchConfig::from_env())
    }
}

impl Platform for NativePlatform {
    fn home_dir(&self) -> Option<PathBuf> {
        dirs::home_dir()
    }

    fn executable_path(&self) -> Option<PathBuf> {
        std::env::current_exe().ok()
    }

    fn search_paths(&self) -> Vec<PathBuf> {
        self.config.roots()
    }

    fn descriptor_files(&self, search_paths: &[PathBuf]) -> Vec<PathBuf> {
        discover_descriptors(search_paths, self.config.max_depth)
    }

    fn load_library(&self, path: &Path) -> Result<Arc<dyn ProcResolver>, PlatformError> {
        let resolver = LibraryResolver::load(path)?;
        Ok(Arc::new(resolver))
    }
}

/// Resolver exported by a loaded library, keeping that library mapped.
pub struct LibraryResolver {
    // Dropped before `_library`.
    inner: Box<dyn ProcResolver>,
    path: PathBuf,
    _library: Library,
}

impl LibraryResolver {
    pub fn load(path: &Path) -> Result<Self, PlatformError> {
        if !path.exists() {
            return Err(PlatformError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} does not exist", path.display()),
            )));
        }
        // SAFETY: driver and layer libraries are trusted code listed by an
        // installed descriptor; their initializers run here.
        let library = unsafe { Library::new(path) }?;
        let symbol = format!("{ENTRY_SYMBOL}\0");
        // SAFETY: the entry point is declared with `sk_export_resolver!`,
        // which fixes its signature to `ProcResolverEntry`.
        let entry = unsafe {
            library
                .get::<ProcResolverEntry>(symbol.as_bytes())
                .map_err(|_| PlatformError::MissingEntry {
                    path: path.to_path_buf(),
                    symbol: ENTRY_SYMBOL,
                })
                .map(|entry| *entry)?
        };
        log::debug!("loaded {}", path.display());
        Ok(Self {
            inner: entry(),
            path: path.to_path_buf(),
            _library: library,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ProcResolver for LibraryResolver {
    fn resolve(&self, name: &str) -> Option<Proc> {
        self.inner.resolve(name)
    }
}

impl Drop for LibraryResolver {
    fn drop(&mut self) {
        log::trace!("unloading {}", self.path.display());
    }
}

impl fmt::Debug for LibraryResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibraryResolver")
            .field("path", &self.path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn discovers_json_files_sorted_and_once() {
        let dir = tempdir().unwrap();
        let root = dir.path().to_path_buf();
        fs::write(root.join("b.json"), "{}").unwrap();
        fs::write(root.join("A.JSON"), "{}").unwrap();
        fs::write(root.join("notes.txt"), "").unwrap();
        fs::create_dir(root.join("nested")).unwrap();
        fs::write(root.join("nested/c.json"), "{}").unwrap();

        let shallow = discover_descriptors(&[root.clone(), root.clone()], 1);
        assert_eq!(shallow, vec![root.join("A.JSON"), root.join("b.json")]);

        let deep = discover_descriptors(&[root.clone()], 2);
        assert_eq!(deep.len(), 3);
        assert!(deep.contains(&root.join("nested/c.json")));
    }

    #[test]
    fn missing_roots_are_skipped() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("absent");
        assert!(discover_descriptors(&[missing], 1).is_empty());
    }

    #[test]
    fn loading_a_non_library_fails() {
        let dir = tempdir().unwrap();
        let bogus = dir.path().join("libbogus.so");
        fs::write(&bogus, b"not a shared object").unwrap();
        let platform = NativePlatform::new(SearchConfig::isolated([]));
        assert!(matches!(
            platform.load_library(&bogus),
            Err(PlatformError::LibraryLoad(_))
        ));
        assert!(matches!(
            platform.load_library(&dir.path().join("libmissing.so")),
            Err(PlatformError::Io(_))
        ));
    }
}
