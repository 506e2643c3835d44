//! Shared fixtures for the cross-crate tests.

pub mod allocator;
pub mod descriptors;
pub mod mock;
pub mod platform;

pub use allocator::{AllocationEvent, RecordingAllocator};
pub use descriptors::{descriptor, entry, implicit_entry, DescriptorTree};
pub use mock::{identity, CachedInner, CallLog, MockDriver, MockLayer, MockStream};
pub use platform::MockPlatform;
