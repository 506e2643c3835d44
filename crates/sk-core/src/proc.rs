use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A type-erased entry point.
///
/// Each dispatch slot stores a concrete `Arc<dyn Fn(..) + Send + Sync>`; a
/// `Proc` wraps exactly that value so the table builder can downcast it back.
pub type Proc = Arc<dyn Any + Send + Sync>;

/// Name of the symbol every driver/layer library exports.
pub const ENTRY_SYMBOL: &str = "sk_get_proc_resolver";

/// Signature of [`ENTRY_SYMBOL`].
pub type ProcResolverEntry = fn() -> Box<dyn ProcResolver>;

/// Resolves entry points of a driver or layer by name.
pub trait ProcResolver: Send + Sync {
    fn resolve(&self, name: &str) -> Option<Proc>;
}

impl<R: ProcResolver + ?Sized> ProcResolver for Arc<R> {
    fn resolve(&self, name: &str) -> Option<Proc> {
        (**self).resolve(name)
    }
}

impl<R: ProcResolver + ?Sized> ProcResolver for Box<R> {
    fn resolve(&self, name: &str) -> Option<Proc> {
        (**self).resolve(name)
    }
}

/// Stock name → entry point map.
#[derive(Clone, Default)]
pub struct ProcMap {
    procs: HashMap<String, Proc>,
}

impl ProcMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `proc` under `name`.
    ///
    /// `F` must be the exact slot type (for example
    /// [`GetDriverPropertiesFn`](crate::GetDriverPropertiesFn)); anything else
    /// is ignored by the table builder.
    pub fn insert<F>(&mut self, name: impl Into<String>, proc: F) -> &mut Self
    where
        F: Any + Send + Sync,
    {
        self.procs.insert(name.into(), Arc::new(proc));
        self
    }

    pub fn with<F>(mut self, name: impl Into<String>, proc: F) -> Self
    where
        F: Any + Send + Sync,
    {
        self.insert(name, proc);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.procs.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.procs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.procs.is_empty()
    }
}

impl ProcResolver for ProcMap {
    fn resolve(&self, name: &str) -> Option<Proc> {
        self.procs.get(name).cloned()
    }
}

impl fmt::Debug for ProcMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.procs.keys().collect();
        names.sort();
        f.debug_struct("ProcMap").field("procs", &names).finish()
    }
}

/// Resolve `name` and downcast it to the slot type `F`.
pub fn resolve_as<F>(resolver: &dyn ProcResolver, name: &str) -> Option<F>
where
    F: Any + Clone,
{
    let proc = resolver.resolve(name)?;
    match proc.downcast_ref::<F>() {
        Some(typed) => Some(typed.clone()),
        None => {
            log::warn!("entry point {name} resolved to an unexpected type; ignoring it");
            None
        }
    }
}

/// Declare the resolver entry point of a driver or layer library.
///
/// # Example
///
/// ```ignore
/// sk_core::sk_export_resolver!(build_resolver());
/// ```
#[macro_export]
macro_rules! sk_export_resolver {
    ($resolver:expr) => {
        #[no_mangle]
        pub fn sk_get_proc_resolver() -> Box<dyn $crate::ProcResolver> {
            Box::new($resolver)
        }
    };
}
