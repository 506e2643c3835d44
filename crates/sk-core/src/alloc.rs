use std::fmt;
use std::sync::Arc;

use crate::identity::Uuid;
use crate::object::ObjectKind;
use crate::result::{SkError, SkResult};

/// What an allocation is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AllocationScope {
    /// A chain node or a non-layered object.
    Object,
    /// A resolved dispatch table.
    DispatchTable,
    /// Parsed descriptor storage held by the loader.
    Manifest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AllocationInfo {
    pub scope: AllocationScope,
    /// Object kind the allocation belongs to, if any.
    pub kind: Option<ObjectKind>,
    pub identity: Uuid,
    pub size: usize,
}

/// Host hooks consulted for every long-lived allocation made by the runtime.
///
/// Returning `false` from [`HostAllocator::allocate`] makes the calling
/// operation fail with [`SkError::OutOfHostMemory`]. Every granted allocation
/// is matched by exactly one [`HostAllocator::free`].
pub trait HostAllocator: Send + Sync {
    fn allocate(&self, info: &AllocationInfo) -> bool;
    fn free(&self, info: &AllocationInfo);
}

/// Grants everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemAllocator;

impl HostAllocator for SystemAllocator {
    fn allocate(&self, _info: &AllocationInfo) -> bool {
        true
    }

    fn free(&self, _info: &AllocationInfo) {}
}

/// Shared handle to the active [`HostAllocator`].
#[derive(Clone)]
pub struct Allocator {
    inner: Arc<dyn HostAllocator>,
}

impl Allocator {
    pub fn new(inner: Arc<dyn HostAllocator>) -> Self {
        Self { inner }
    }

    pub fn reserve(&self, info: AllocationInfo) -> SkResult<Allocation> {
        if !self.inner.allocate(&info) {
            log::warn!(
                "allocator refused {:?} allocation of {} bytes for {:?}",
                info.scope,
                info.size,
                info.kind
            );
            return Err(SkError::OutOfHostMemory);
        }
        Ok(Allocation {
            allocator: self.clone(),
            info,
        })
    }

    pub fn reserve_for<T>(
        &self,
        scope: AllocationScope,
        kind: Option<ObjectKind>,
        identity: Uuid,
    ) -> SkResult<Allocation> {
        self.reserve(AllocationInfo {
            scope,
            kind,
            identity,
            size: std::mem::size_of::<T>(),
        })
    }

    pub fn same_as(&self, other: &Allocator) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for Allocator {
    fn default() -> Self {
        Self::new(Arc::new(SystemAllocator))
    }
}

impl fmt::Debug for Allocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Allocator").finish_non_exhaustive()
    }
}

/// A granted allocation; released back to its allocator on drop.
pub struct Allocation {
    allocator: Allocator,
    info: AllocationInfo,
}

impl Allocation {
    pub fn info(&self) -> &AllocationInfo {
        &self.info
    }
}

impl Drop for Allocation {
    fn drop(&mut self) {
        self.allocator.inner.free(&self.info);
    }
}

impl fmt::Debug for Allocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Allocation").field("info", &self.info).finish()
    }
}
