use std::iter;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use sk_core::{
    create_object, AllocationScope, Allocator, ChainEntry, CreateChain, DriverCreateInfo,
    DriverTable, ObjectKind, SkError, SkObject,
};
use sk_tests::{identity, CachedInner, CallLog, MockDriver, MockLayer, RecordingAllocator};

const DRIVER: sk_core::Uuid = identity(0xd0);
const A: sk_core::Uuid = identity(0xa1);
const B: sk_core::Uuid = identity(0xb2);
const C: sk_core::Uuid = identity(0xc3);

/// Chain with `layers` listed outermost first, over `driver`.
fn chain_over(layers: &[&MockLayer], driver: &MockDriver) -> CreateChain {
    layers
        .iter()
        .map(|layer| ChainEntry::layer(layer.identity, layer.resolver()))
        .chain(iter::once(ChainEntry::driver(driver.identity, driver.resolver())))
        .collect()
}

#[test]
fn layers_are_stacked_outermost_first() {
    let log = CallLog::new();
    let driver = MockDriver::new(DRIVER, "mock", log.clone());
    let a = MockLayer::new(A, "a", log.clone());
    let b = MockLayer::new(B, "b", log.clone()).serving_properties();
    let c = MockLayer::new(C, "c", log.clone());

    let info = DriverCreateInfo::new(None, chain_over(&[&c, &b, &a], &driver));
    let object = create_object::<DriverTable>(&info, &Allocator::default()).unwrap();

    assert_eq!(object.layer_identities(), vec![C, B, A]);
    assert_eq!(object.identity(), DRIVER);
    assert_eq!(object.head().identity(), C);
    assert_eq!(object.terminal_node().kind(), ObjectKind::Driver);

    // No layer provides device enumeration: the head table points straight
    // at the driver.
    let devices = object.enumerate_devices().unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(log.take(), vec!["driver:devices"]);

    // B answers without forwarding; A and the driver never see the call.
    let properties = object.properties().unwrap();
    assert_eq!(properties.name, "b-wrapped");
    assert_eq!(properties.identity, DRIVER);
    assert_eq!(log.take(), vec!["b:properties"]);
}

#[test]
fn forwarded_calls_visit_every_layer_in_order() {
    let log = CallLog::new();
    let driver = MockDriver::new(DRIVER, "mock", log.clone());
    let a = MockLayer::new(A, "a", log.clone()).forwarding_properties();
    let b = MockLayer::new(B, "b", log.clone()).forwarding_properties();
    let c = MockLayer::new(C, "c", log.clone()).forwarding_properties();

    let info = DriverCreateInfo::new(None, chain_over(&[&c, &b, &a], &driver));
    let object = create_object::<DriverTable>(&info, &Allocator::default()).unwrap();

    let properties = object.properties().unwrap();
    assert_eq!(properties, driver.properties());
    assert_eq!(
        log.take(),
        vec!["c:properties", "b:properties", "a:properties", "driver:properties"]
    );
}

#[test]
fn next_dispatch_resolves_the_node_beneath() {
    let log = CallLog::new();
    let driver = MockDriver::new(DRIVER, "mock", log.clone());
    let a = MockLayer::new(A, "a", log.clone());
    let b = MockLayer::new(B, "b", log.clone()).serving_properties();

    let info = DriverCreateInfo::new(None, chain_over(&[&b, &a], &driver));
    let object = create_object::<DriverTable>(&info, &Allocator::default()).unwrap();

    let beneath_b = object.next_shared_dispatch(B).unwrap();
    let a_table = object.find_node(A).unwrap().shared_dispatch();
    assert!(Arc::ptr_eq(&beneath_b, &a_table));

    assert!(object.next_dispatch(A).is_ok());
    assert_eq!(object.next_dispatch(DRIVER).unwrap_err(), SkError::SystemInternal);
    assert_eq!(
        object.next_dispatch(identity(0x99)).unwrap_err(),
        SkError::SystemInternal
    );
}

#[test]
fn empty_chain_has_nothing_to_create() {
    let info = DriverCreateInfo::new(None, CreateChain::new());
    let err = create_object::<DriverTable>(&info, &Allocator::default()).unwrap_err();
    assert_eq!(err, SkError::NotFound);
}

#[test]
fn layer_missing_from_its_chain_is_internal_error() {
    let log = CallLog::new();
    let driver = MockDriver::new(DRIVER, "mock", log.clone());
    let a = MockLayer::new(A, "a", log);

    // The layer's constructor looks itself up as A, but the chain lists it
    // under another identity.
    let chain = CreateChain::new()
        .with(ChainEntry::layer(identity(0x55), a.resolver()))
        .with(ChainEntry::driver(DRIVER, driver.resolver()));
    let info = DriverCreateInfo::new(None, chain);
    let err = create_object::<DriverTable>(&info, &Allocator::default()).unwrap_err();
    assert_eq!(err, SkError::SystemInternal);
}

#[test]
fn failing_driver_fails_the_whole_chain() {
    let recorder = RecordingAllocator::new();
    let log = CallLog::new();
    let driver =
        MockDriver::new(DRIVER, "mock", log.clone()).failing(SkError::InitializationFailed);
    let a = MockLayer::new(A, "a", log);

    let info = DriverCreateInfo::new(None, chain_over(&[&a], &driver));
    let err = create_object::<DriverTable>(&info, &recorder.allocator()).unwrap_err();
    assert_eq!(err, SkError::InitializationFailed);
    assert_eq!(recorder.outstanding(), 0);
}

#[test]
fn allocation_failure_mid_chain_releases_everything() {
    // Each node takes two allocations: the driver and A fit, B's table does not.
    let recorder = RecordingAllocator::with_budget(5);
    let log = CallLog::new();
    let driver = MockDriver::new(DRIVER, "mock", log.clone());
    let a = MockLayer::new(A, "a", log.clone());
    let b = MockLayer::new(B, "b", log.clone());
    let c = MockLayer::new(C, "c", log);

    let info = DriverCreateInfo::new(None, chain_over(&[&c, &b, &a], &driver));
    let err = create_object::<DriverTable>(&info, &recorder.allocator()).unwrap_err();

    assert_eq!(err, SkError::OutOfHostMemory);
    assert_eq!(recorder.granted().len(), 5);
    assert_eq!(recorder.refusals(), 1);
    assert_eq!(recorder.outstanding(), 0);
}

#[test]
fn teardown_releases_head_to_terminal() {
    let recorder = RecordingAllocator::new();
    let log = CallLog::new();
    let driver = MockDriver::new(DRIVER, "mock", log.clone());
    let a = MockLayer::new(A, "a", log.clone());
    let b = MockLayer::new(B, "b", log.clone()).caching_inner_table();
    let c = MockLayer::new(C, "c", log);

    let info = DriverCreateInfo::new(None, chain_over(&[&c, &b, &a], &driver));
    let object = create_object::<DriverTable>(&info, &recorder.allocator()).unwrap();
    assert_eq!(recorder.granted().len(), 8);
    assert!(recorder.frees().is_empty());
    assert!(object.node_state::<CachedInner>(B).is_some());

    drop(object);

    assert_eq!(
        recorder.free_order(),
        vec![
            (AllocationScope::DispatchTable, C),
            (AllocationScope::Object, C),
            (AllocationScope::DispatchTable, B),
            (AllocationScope::Object, B),
            (AllocationScope::DispatchTable, A),
            (AllocationScope::Object, A),
            (AllocationScope::DispatchTable, DRIVER),
            (AllocationScope::Object, DRIVER),
        ]
    );
    assert_eq!(recorder.outstanding(), 0);
}

#[test]
fn layer_may_hold_the_table_beneath_it() {
    let recorder = RecordingAllocator::new();
    let log = CallLog::new();
    let driver = MockDriver::new(DRIVER, "mock", log.clone());
    let a = MockLayer::new(A, "a", log).caching_inner_table();

    let info = DriverCreateInfo::new(None, chain_over(&[&a], &driver));
    let object = create_object::<DriverTable>(&info, &recorder.allocator()).unwrap();

    let cached = object.node_state::<CachedInner>(A).unwrap();
    let driver_table = object.terminal_node().shared_dispatch();
    assert!(Arc::ptr_eq(&cached.0, &driver_table));
    drop(driver_table);

    drop(object);
    assert_eq!(recorder.frees().len(), 4);
    assert_eq!(recorder.outstanding(), 0);
}

#[test]
fn node_allocations_carry_kind_and_identity() {
    let recorder = RecordingAllocator::new();
    let log = CallLog::new();
    let driver = MockDriver::new(DRIVER, "mock", log.clone());
    let a = MockLayer::new(A, "a", log);

    let info = DriverCreateInfo::new(None, chain_over(&[&a], &driver));
    let _object = create_object::<DriverTable>(&info, &recorder.allocator()).unwrap();

    let kinds: Vec<_> = recorder
        .granted()
        .into_iter()
        .map(|info| (info.scope, info.kind, info.identity))
        .collect();
    assert_eq!(
        kinds,
        vec![
            (AllocationScope::Object, Some(ObjectKind::Driver), DRIVER),
            (AllocationScope::DispatchTable, Some(ObjectKind::Driver), DRIVER),
            (AllocationScope::Object, Some(ObjectKind::Layer), A),
            (AllocationScope::DispatchTable, Some(ObjectKind::Layer), A),
        ]
    );
}
