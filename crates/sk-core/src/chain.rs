//! Creation chains and the layer-splicing builder.
//!
//! A constructor for a layered object receives a [`CreateInfo`] whose chain
//! lists every layer that wants to join, outermost first, followed by the
//! entry that builds the real object. Layer constructors call
//! [`attach_layer`]; it builds everything beneath the layer first and then
//! splices the layer's node in as the new head.

use std::fmt;
use std::sync::Arc;

use crate::alloc::Allocator;
use crate::identity::Uuid;
use crate::object::{Object, ObjectHandle};
use crate::proc::{resolve_as, ProcResolver};
use crate::result::{SkError, SkResult};
use crate::table::{CreateFn, Dispatchable};

/// Discriminant of a chain entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StructureType {
    InstanceCreateInfo,
    DriverCreateInfo,
    PcmStreamCreateInfo,
    LayerCreateInfo,
}

/// One link of a creation chain.
#[derive(Clone)]
pub struct ChainEntry {
    pub s_type: StructureType,
    pub identity: Uuid,
    pub resolver: Arc<dyn ProcResolver>,
}

impl ChainEntry {
    pub fn new(s_type: StructureType, identity: Uuid, resolver: Arc<dyn ProcResolver>) -> Self {
        Self {
            s_type,
            identity,
            resolver,
        }
    }

    pub fn layer(identity: Uuid, resolver: Arc<dyn ProcResolver>) -> Self {
        Self::new(StructureType::LayerCreateInfo, identity, resolver)
    }

    pub fn driver(identity: Uuid, resolver: Arc<dyn ProcResolver>) -> Self {
        Self::new(StructureType::DriverCreateInfo, identity, resolver)
    }

    pub fn is_layer(&self) -> bool {
        self.s_type == StructureType::LayerCreateInfo
    }
}

impl fmt::Debug for ChainEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainEntry")
            .field("s_type", &self.s_type)
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

/// Ordered creation chain, outermost layer first.
#[derive(Debug, Clone, Default)]
pub struct CreateChain {
    entries: Vec<ChainEntry>,
}

impl CreateChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: ChainEntry) -> &mut Self {
        self.entries.push(entry);
        self
    }

    pub fn with(mut self, entry: ChainEntry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn entries(&self) -> &[ChainEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index of the layer entry declaring `identity`.
    pub fn layer_position(&self, identity: Uuid) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.is_layer() && entry.identity == identity)
    }
}

impl FromIterator<ChainEntry> for CreateChain {
    fn from_iter<I: IntoIterator<Item = ChainEntry>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl Extend<ChainEntry> for CreateChain {
    fn extend<I: IntoIterator<Item = ChainEntry>>(&mut self, iter: I) {
        self.entries.extend(iter);
    }
}

/// Creation parameters of a layered object kind.
pub trait CreateInfo: Send + Sync {
    fn chain(&self) -> &CreateChain;

    /// Logical parent of the object being created.
    fn parent(&self) -> Option<ObjectHandle>;
}

fn constructor_in<'a, T: Dispatchable>(
    entries: impl IntoIterator<Item = &'a ChainEntry>,
) -> Option<(&'a ChainEntry, CreateFn<T>)> {
    entries.into_iter().find_map(|entry| {
        resolve_as::<CreateFn<T>>(entry.resolver.as_ref(), T::CREATE_SYMBOL)
            .map(|create| (entry, create))
    })
}

/// Build an object from the top of its creation chain.
///
/// The object retains the resolver of every entry whose constructor ran, so
/// libraries stay loaded after the chain itself is dropped.
pub fn create_object<T: Dispatchable>(
    info: &T::CreateInfo,
    allocator: &Allocator,
) -> SkResult<Object<T>> {
    let Some((entry, create)) = constructor_in::<T>(info.chain().entries()) else {
        log::warn!(
            "no entry of a {}-long chain provides {}",
            info.chain().len(),
            T::CREATE_SYMBOL
        );
        return Err(SkError::NotFound);
    };
    log::debug!("{} served by {:?} {}", T::CREATE_SYMBOL, entry.s_type, entry.identity);
    let object = create(info, allocator)?;
    object.retain_library(Arc::clone(&entry.resolver));
    Ok(object)
}

/// Build everything beneath `layer`, then splice `layer` on top.
///
/// Called from a layer's constructor with the info and allocator it was
/// given. Any failure releases whatever was built beneath the layer.
pub fn attach_layer<T: Dispatchable>(
    layer: Uuid,
    info: &T::CreateInfo,
    allocator: &Allocator,
) -> SkResult<Object<T>> {
    let chain = info.chain();
    let Some(position) = chain.layer_position(layer) else {
        log::error!("layer {layer} asked to join a chain that does not list it");
        return Err(SkError::SystemInternal);
    };
    if chain.entries()[position + 1..]
        .iter()
        .any(|entry| entry.is_layer() && entry.identity == layer)
    {
        log::error!("layer {layer} is listed more than once in one chain");
        return Err(SkError::SystemInternal);
    }
    let own = Arc::clone(&chain.entries()[position].resolver);

    let Some((next, create)) = constructor_in::<T>(&chain.entries()[position + 1..]) else {
        log::error!(
            "nothing beneath layer {layer} provides {}",
            T::CREATE_SYMBOL
        );
        return Err(SkError::SystemInternal);
    };
    log::trace!("layer {layer} builds on {:?} {}", next.s_type, next.identity);

    let mut inner = create(info, allocator)?;
    inner.retain_library(Arc::clone(&next.resolver));
    inner.push_layer(layer, own, allocator)?;
    Ok(inner)
}
