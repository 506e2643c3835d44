//! Object handles and the chain of dispatch nodes behind every layered object.
//!
//! A layered object ([`Object<T>`]) owns a singly linked chain of
//! [`ObjectNode`]s. The head is the most recently attached layer; the tail is
//! the terminal node created by the real driver (or the loader, for
//! instances). Each node owns its resolved table; the object only tracks which
//! node is currently the head.

use std::any::Any;
use std::fmt;
use std::num::NonZeroU64;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::alloc::{Allocation, AllocationScope, Allocator};
use crate::identity::Uuid;
use crate::proc::ProcResolver;
use crate::properties::{DeviceProperties, EndpointProperties};
use crate::result::{SkError, SkResult};
use crate::table::Dispatchable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Instance,
    Driver,
    Device,
    Endpoint,
    PcmStream,
    Layer,
}

impl ObjectKind {
    /// Kinds that terminate a dispatch chain.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ObjectKind::Instance | ObjectKind::Driver | ObjectKind::PcmStream
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            ObjectKind::Instance => "instance",
            ObjectKind::Driver => "driver",
            ObjectKind::Device => "device",
            ObjectKind::Endpoint => "endpoint",
            ObjectKind::PcmStream => "pcm stream",
            ObjectKind::Layer => "layer",
        }
    }
}

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

/// Process-unique, kind-tagged reference to an object.
///
/// Handles never own anything; they are used as back-references to a logical
/// parent and to check that an argument is the kind of object a call expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectHandle {
    kind: ObjectKind,
    id: NonZeroU64,
}

impl ObjectHandle {
    pub fn allocate(kind: ObjectKind) -> Self {
        let raw = NEXT_HANDLE.fetch_add(1, Ordering::Relaxed);
        Self {
            kind,
            id: NonZeroU64::new(raw).unwrap_or(NonZeroU64::MIN),
        }
    }

    pub fn kind(self) -> ObjectKind {
        self.kind
    }

    pub fn id(self) -> u64 {
        self.id.get()
    }

    /// Checked downcast: the handle must refer to an object of `kind`.
    pub fn expect_kind(self, kind: ObjectKind) -> SkResult<Self> {
        if self.kind == kind {
            Ok(self)
        } else {
            log::warn!(
                "expected a {} handle, got a {} handle",
                kind.label(),
                self.kind.label()
            );
            Err(SkError::Invalid)
        }
    }
}

/// Capabilities shared by every object kind.
pub trait SkObject {
    fn handle(&self) -> ObjectHandle;

    /// Logical owner, e.g. the device of an endpoint.
    fn parent(&self) -> Option<ObjectHandle>;

    /// Identity of the driver (or loader) that produced the object.
    fn identity(&self) -> Uuid;

    fn kind(&self) -> ObjectKind {
        self.handle().kind()
    }
}

pub type NodeState = Box<dyn Any + Send + Sync>;

/// Resolvers of the libraries whose code an object runs.
///
/// One set is shared by an object and every table it built. Entry points,
/// node state and terminal resolvers may all live in those libraries, so the
/// set is released only after the last of them is gone.
#[derive(Default)]
pub struct Libraries {
    retained: Mutex<Vec<Arc<dyn ProcResolver>>>,
}

impl Libraries {
    /// Returns `false` if `library` was already retained.
    fn retain(&self, library: Arc<dyn ProcResolver>) -> bool {
        let mut retained = self.retained.lock();
        let address = Arc::as_ptr(&library).cast::<()>();
        if retained
            .iter()
            .any(|held| Arc::as_ptr(held).cast::<()>() == address)
        {
            return false;
        }
        retained.push(library);
        true
    }

    fn snapshot(&self) -> Vec<Arc<dyn ProcResolver>> {
        self.retained.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.retained.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.retained.lock().is_empty()
    }
}

impl fmt::Debug for Libraries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Libraries")
            .field("retained", &self.len())
            .finish()
    }
}

/// A resolved dispatch table together with the allocation backing it.
///
/// Layers may keep an `Arc` of an inner table around; the allocation is
/// released when the last reference goes away, and the libraries of the
/// object that built the table stay loaded until then.
pub struct SharedTable<T> {
    table: T,
    _allocation: Allocation,
    // Declared last: the entry points above may run library code on drop.
    libraries: Arc<Libraries>,
}

impl<T> SharedTable<T> {
    pub fn libraries(&self) -> &Libraries {
        &self.libraries
    }
}

impl<T> Deref for SharedTable<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.table
    }
}

impl<T: fmt::Debug> fmt::Debug for SharedTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.table.fmt(f)
    }
}

/// One link of a dispatch chain.
pub struct ObjectNode<T> {
    kind: ObjectKind,
    identity: Uuid,
    parent: Option<ObjectHandle>,
    dispatch: Arc<SharedTable<T>>,
    state: Option<NodeState>,
    _allocation: Allocation,
    resolver: Arc<dyn ProcResolver>,
    next: Option<Box<ObjectNode<T>>>,
}

impl<T> ObjectNode<T> {
    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn identity(&self) -> Uuid {
        self.identity
    }

    pub fn parent(&self) -> Option<ObjectHandle> {
        self.parent
    }

    pub fn dispatch(&self) -> &T {
        &self.dispatch
    }

    pub fn shared_dispatch(&self) -> Arc<SharedTable<T>> {
        Arc::clone(&self.dispatch)
    }

    pub fn resolver(&self) -> &Arc<dyn ProcResolver> {
        &self.resolver
    }

    pub fn next(&self) -> Option<&ObjectNode<T>> {
        self.next.as_deref()
    }

    pub fn is_layer(&self) -> bool {
        self.kind == ObjectKind::Layer
    }

    pub fn state<S: Any>(&self) -> Option<&S> {
        self.state.as_ref()?.downcast_ref::<S>()
    }
}

impl<T> Drop for ObjectNode<T> {
    fn drop(&mut self) {
        log::trace!("releasing {} node {}", self.kind.label(), self.identity);
    }
}

impl<T: fmt::Debug> fmt::Debug for ObjectNode<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectNode")
            .field("kind", &self.kind)
            .field("identity", &self.identity)
            .field("dispatch", &self.dispatch)
            .finish_non_exhaustive()
    }
}

fn new_node<T: Dispatchable>(
    kind: ObjectKind,
    identity: Uuid,
    parent: Option<ObjectHandle>,
    resolver: Arc<dyn ProcResolver>,
    previous: Option<&T>,
    libraries: &Arc<Libraries>,
    allocator: &Allocator,
) -> SkResult<Box<ObjectNode<T>>> {
    let node_allocation =
        allocator.reserve_for::<ObjectNode<T>>(AllocationScope::Object, Some(kind), identity)?;
    let table_allocation =
        allocator.reserve_for::<T>(AllocationScope::DispatchTable, Some(kind), identity)?;
    let table = T::build(resolver.as_ref(), previous);
    Ok(Box::new(ObjectNode {
        kind,
        identity,
        parent,
        dispatch: Arc::new(SharedTable {
            table,
            _allocation: table_allocation,
            libraries: Arc::clone(libraries),
        }),
        state: None,
        _allocation: node_allocation,
        resolver,
        next: None,
    }))
}

/// A layered object: instance, driver or PCM stream.
pub struct Object<T: Dispatchable> {
    handle: ObjectHandle,
    parent: Option<ObjectHandle>,
    allocator: Allocator,
    head: Box<ObjectNode<T>>,
    // Released after every node.
    libraries: Arc<Libraries>,
}

impl<T: Dispatchable> Object<T> {
    /// Create the terminal object of a chain.
    ///
    /// Called by the real implementation's constructor; its entry points are
    /// resolved through `resolver` with no fallback.
    pub fn terminal(
        identity: Uuid,
        parent: Option<ObjectHandle>,
        resolver: Arc<dyn ProcResolver>,
        state: Option<NodeState>,
        allocator: &Allocator,
    ) -> SkResult<Self> {
        let handle = ObjectHandle::allocate(T::KIND);
        let libraries = Arc::new(Libraries::default());
        let mut head = new_node::<T>(
            T::KIND,
            identity,
            parent,
            resolver,
            None,
            &libraries,
            allocator,
        )?;
        head.state = state;
        log::debug!(
            "created {} {} with {} entry points",
            T::KIND.label(),
            identity,
            head.dispatch().resolved_count()
        );
        Ok(Self {
            handle,
            parent,
            allocator: allocator.clone(),
            head,
            libraries,
        })
    }

    /// Keep the library behind `library` loaded for as long as this object
    /// or any table it built is alive.
    pub(crate) fn retain_library(&self, library: Arc<dyn ProcResolver>) {
        if self.libraries.retain(library) {
            log::trace!(
                "{} {} retains {} libraries",
                T::KIND.label(),
                self.identity(),
                self.libraries.len()
            );
        }
    }

    /// Retain everything `other` retains.
    pub(crate) fn retain_libraries_of<U: Dispatchable>(&self, other: &Object<U>) {
        for library in other.libraries.snapshot() {
            self.retain_library(library);
        }
    }

    pub fn libraries(&self) -> &Libraries {
        &self.libraries
    }

    /// Splice a layer node in front of the current head.
    ///
    /// The new table resolves through `resolver` and inherits every slot the
    /// layer does not provide from the current head's table.
    pub(crate) fn push_layer(
        &mut self,
        identity: Uuid,
        resolver: Arc<dyn ProcResolver>,
        allocator: &Allocator,
    ) -> SkResult<()> {
        let node = new_node::<T>(
            ObjectKind::Layer,
            identity,
            Some(self.handle),
            Arc::clone(&resolver),
            Some(self.head.dispatch()),
            &self.libraries,
            allocator,
        )?;
        self.retain_library(resolver);
        let previous = std::mem::replace(&mut self.head, node);
        self.head.next = Some(previous);
        log::debug!(
            "attached layer {} to {} {}",
            identity,
            T::KIND.label(),
            self.identity()
        );
        Ok(())
    }

    /// The externally visible dispatch table (the head's).
    pub fn dispatch(&self) -> &T {
        self.head.dispatch()
    }

    pub fn shared_dispatch(&self) -> Arc<SharedTable<T>> {
        self.head.shared_dispatch()
    }

    pub fn allocator(&self) -> &Allocator {
        &self.allocator
    }

    pub fn head(&self) -> &ObjectNode<T> {
        &self.head
    }

    /// Nodes from the head to the terminal node.
    pub fn nodes(&self) -> impl Iterator<Item = &ObjectNode<T>> + '_ {
        std::iter::successors(Some(self.head.as_ref()), |node| node.next())
    }

    pub fn layer_count(&self) -> usize {
        self.nodes().filter(|node| node.is_layer()).count()
    }

    /// Identities of the attached layers, outermost first.
    pub fn layer_identities(&self) -> Vec<Uuid> {
        self.nodes()
            .filter(|node| node.is_layer())
            .map(ObjectNode::identity)
            .collect()
    }

    pub fn terminal_node(&self) -> &ObjectNode<T> {
        let mut node = self.head.as_ref();
        while let Some(next) = node.next() {
            node = next;
        }
        node
    }

    /// First node carrying `identity`, scanning from the head.
    pub fn find_node(&self, identity: Uuid) -> Option<&ObjectNode<T>> {
        self.nodes().find(|node| node.identity == identity)
    }

    fn find_node_mut(&mut self, identity: Uuid) -> Option<&mut ObjectNode<T>> {
        let mut cursor = Some(self.head.as_mut());
        while let Some(node) = cursor {
            if node.identity == identity {
                return Some(node);
            }
            cursor = node.next.as_deref_mut();
        }
        None
    }

    /// Table of whatever sits directly beneath the node `identity`.
    ///
    /// This is how a layer forwards a call it does not fully service.
    pub fn next_dispatch(&self, identity: Uuid) -> SkResult<&T> {
        self.next_node(identity).map(ObjectNode::dispatch)
    }

    pub fn next_shared_dispatch(&self, identity: Uuid) -> SkResult<Arc<SharedTable<T>>> {
        self.next_node(identity).map(ObjectNode::shared_dispatch)
    }

    fn next_node(&self, identity: Uuid) -> SkResult<&ObjectNode<T>> {
        let Some(node) = self.find_node(identity) else {
            log::error!(
                "{} is not part of the {} chain {}",
                identity,
                T::KIND.label(),
                self.identity()
            );
            return Err(SkError::SystemInternal);
        };
        node.next().ok_or_else(|| {
            log::error!("{} is the terminal node; nothing lies beneath it", identity);
            SkError::SystemInternal
        })
    }

    /// Attach private state to the node `identity`.
    pub fn set_node_state(&mut self, identity: Uuid, state: NodeState) -> SkResult<()> {
        let node = self.find_node_mut(identity).ok_or(SkError::NotFound)?;
        node.state = Some(state);
        Ok(())
    }

    pub fn node_state<S: Any>(&self, identity: Uuid) -> Option<&S> {
        self.find_node(identity)?.state::<S>()
    }

    /// State the real implementation stored on the terminal node.
    pub fn terminal_state<S: Any>(&self) -> Option<&S> {
        self.terminal_node().state::<S>()
    }
}

impl<T: Dispatchable> SkObject for Object<T> {
    fn handle(&self) -> ObjectHandle {
        self.handle
    }

    fn parent(&self) -> Option<ObjectHandle> {
        self.parent
    }

    fn identity(&self) -> Uuid {
        self.terminal_node().identity
    }
}

impl<T: Dispatchable> Drop for Object<T> {
    fn drop(&mut self) {
        log::debug!(
            "destroying {} {} ({} layers)",
            T::KIND.label(),
            self.terminal_node().identity,
            self.layer_count()
        );
    }
}

impl<T: Dispatchable + fmt::Debug> fmt::Debug for Object<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("handle", &self.handle)
            .field("parent", &self.parent)
            .field("nodes", &self.nodes().collect::<Vec<_>>())
            .finish()
    }
}

/// A physical or virtual audio device exposed by a driver.
#[derive(Debug, Clone)]
pub struct Device {
    handle: ObjectHandle,
    parent: ObjectHandle,
    driver: Uuid,
    properties: DeviceProperties,
}

impl Device {
    pub fn new<T: Dispatchable>(driver: &Object<T>, properties: DeviceProperties) -> Self {
        Self {
            handle: ObjectHandle::allocate(ObjectKind::Device),
            parent: driver.handle(),
            driver: driver.identity(),
            properties,
        }
    }

    pub fn properties(&self) -> &DeviceProperties {
        &self.properties
    }
}

impl SkObject for Device {
    fn handle(&self) -> ObjectHandle {
        self.handle
    }

    fn parent(&self) -> Option<ObjectHandle> {
        Some(self.parent)
    }

    fn identity(&self) -> Uuid {
        self.driver
    }
}

/// A playback or capture endpoint of a [`Device`].
#[derive(Debug, Clone)]
pub struct Endpoint {
    handle: ObjectHandle,
    parent: ObjectHandle,
    driver_handle: ObjectHandle,
    driver: Uuid,
    properties: EndpointProperties,
}

impl Endpoint {
    pub fn new(device: &Device, properties: EndpointProperties) -> Self {
        Self {
            handle: ObjectHandle::allocate(ObjectKind::Endpoint),
            parent: device.handle,
            driver_handle: device.parent,
            driver: device.driver,
            properties,
        }
    }

    pub fn properties(&self) -> &EndpointProperties {
        &self.properties
    }

    /// Handle of the driver that owns this endpoint's device.
    pub fn driver_handle(&self) -> ObjectHandle {
        self.driver_handle
    }
}

impl SkObject for Endpoint {
    fn handle(&self) -> ObjectHandle {
        self.handle
    }

    fn parent(&self) -> Option<ObjectHandle> {
        Some(self.parent)
    }

    fn identity(&self) -> Uuid {
        self.driver
    }
}
