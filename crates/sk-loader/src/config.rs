use std::collections::HashSet;
use std::env;
use std::ffi::OsStr;
use std::path::PathBuf;

/// Extra descriptor directories, separated like `PATH`.
pub const SK_PATH_VAR: &str = "SK_PATH";
/// When set, only `SK_PATH` directories are searched.
pub const SK_NO_SYSTEM_PATH_VAR: &str = "SK_NO_SYSTEM_PATH";

const MANIFEST_SUBDIR: &str = "sk/manifests";

/// Where descriptor files are looked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchConfig {
    /// Directories from `SK_PATH`; always searched first.
    pub extra_roots: Vec<PathBuf>,
    pub user_roots: Vec<PathBuf>,
    pub system_roots: Vec<PathBuf>,
    /// Whether user and system roots are searched at all.
    pub include_system: bool,
    /// Directory depth below each root; 1 means the root's own files.
    pub max_depth: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl SearchConfig {
    pub fn from_env() -> Self {
        Self::from_vars(
            env::var_os(SK_PATH_VAR).as_deref(),
            env::var_os(SK_NO_SYSTEM_PATH_VAR).is_some(),
        )
    }

    pub fn from_vars(sk_path: Option<&OsStr>, no_system_path: bool) -> Self {
        let extra_roots = sk_path
            .map(|paths| {
                env::split_paths(paths)
                    .filter(|path| !path.as_os_str().is_empty())
                    .collect()
            })
            .unwrap_or_default();
        Self {
            extra_roots,
            user_roots: default_user_roots(),
            system_roots: default_system_roots(),
            include_system: !no_system_path,
            max_depth: 1,
        }
    }

    /// Only the given roots, nothing from the host.
    pub fn isolated(roots: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            extra_roots: roots.into_iter().collect(),
            user_roots: Vec::new(),
            system_roots: Vec::new(),
            include_system: false,
            max_depth: 1,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Ordered, de-duplicated list of roots to scan.
    pub fn roots(&self) -> Vec<PathBuf> {
        let mut candidates: Vec<&PathBuf> = self.extra_roots.iter().collect();
        if self.include_system {
            candidates.extend(self.user_roots.iter().chain(&self.system_roots));
        }
        let mut seen = HashSet::new();
        candidates
            .into_iter()
            .filter(|root| seen.insert(root.as_path()))
            .cloned()
            .collect()
    }
}

fn default_user_roots() -> Vec<PathBuf> {
    let mut roots = Vec::new();
    if let Some(home) = dirs::home_dir() {
        roots.push(home.join(".config").join(MANIFEST_SUBDIR));
        roots.push(home.join(".local/share").join(MANIFEST_SUBDIR));
    }
    if let Some(config) = dirs::config_dir() {
        let root = config.join(MANIFEST_SUBDIR);
        if !roots.contains(&root) {
            roots.push(root);
        }
    }
    roots
}

#[cfg(unix)]
fn default_system_roots() -> Vec<PathBuf> {
    vec![
        PathBuf::from("/etc").join(MANIFEST_SUBDIR),
        PathBuf::from("/usr/local/share").join(MANIFEST_SUBDIR),
        PathBuf::from("/usr/share").join(MANIFEST_SUBDIR),
    ]
}

#[cfg(not(unix))]
fn default_system_roots() -> Vec<PathBuf> {
    dirs::data_dir()
        .map(|data| vec![data.join(MANIFEST_SUBDIR)])
        .unwrap_or_default()
}
