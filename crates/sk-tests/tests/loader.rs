use std::ffi::OsStr;
use std::path::PathBuf;

use pretty_assertions::assert_eq;
use sk_core::{
    ApplicationInfo, DriverProperties, EnumerateFlags, LayerProperties, SkError, SkObject,
    SkStatus, Uuid, Version,
};
use sk_loader::{Loader, LoaderState, SearchConfig, LOADER_INSTANCE_IDENTITY};
use sk_tests::{
    descriptor, entry, identity, implicit_entry, CallLog, DescriptorTree, MockDriver, MockLayer,
    MockPlatform, RecordingAllocator,
};

const MOCK: Uuid = identity(0xd0);
const BACKUP: Uuid = identity(0xd1);
const TRACE: Uuid = identity(0x7a);
const EXTRA: Uuid = identity(0xe7);

fn uuid(identity: Uuid) -> String {
    identity.to_string()
}

fn isolated(tree: &DescriptorTree) -> Loader {
    Loader::with_search_config(SearchConfig::isolated([tree.path().to_path_buf()]))
}

fn app() -> ApplicationInfo {
    ApplicationInfo::new("loader-tests", Version::new(1, 0, 0))
}

/// One descriptor with a driver `mock`, an implicit layer `trace` and an
/// explicit layer `extra`, all backed by in-process resolvers.
struct Installation {
    _tree: DescriptorTree,
    log: CallLog,
    platform: MockPlatform,
}

impl Installation {
    fn new() -> Self {
        let tree = DescriptorTree::new();
        tree.write(
            "sk.json",
            &descriptor(
                vec![entry("mock", &uuid(MOCK), "libmock.so")],
                vec![
                    implicit_entry("trace", &uuid(TRACE), "libtrace.so"),
                    entry("extra", &uuid(EXTRA), "libextra.so"),
                ],
            ),
        );
        let log = CallLog::new();
        let platform = MockPlatform::new([tree.path().to_path_buf()])
            .with_library(
                tree.library("libmock.so"),
                MockDriver::new(MOCK, "mock", log.clone()).resolver(),
            )
            .with_library(
                tree.library("libtrace.so"),
                MockLayer::new(TRACE, "trace", log.clone())
                    .forwarding_properties()
                    .resolver(),
            )
            .with_library(
                tree.library("libextra.so"),
                MockLayer::new(EXTRA, "extra", log.clone())
                    .forwarding_properties()
                    .resolver(),
            );
        Self {
            _tree: tree,
            log,
            platform,
        }
    }

    fn loader(&self) -> Loader {
        Loader::with_platform(self.platform.factory())
    }
}

#[test]
fn discovery_round_trips_every_declaration() {
    let tree = DescriptorTree::new();
    let drivers = [
        ("alsa", identity(0x01)),
        ("pulse", identity(0x02)),
        ("jack", identity(0x03)),
    ];
    let layers = [("trace", identity(0x11)), ("meter", identity(0x12))];
    tree.write(
        "sk.json",
        &descriptor(
            drivers
                .iter()
                .map(|(name, id)| entry(name, &uuid(*id), "lib.so"))
                .collect(),
            layers
                .iter()
                .map(|(name, id)| entry(name, &uuid(*id), "lib.so"))
                .collect(),
        ),
    );
    let mut loader = isolated(&tree);

    let found: Vec<_> = loader
        .driver_properties(EnumerateFlags::All)
        .unwrap()
        .into_iter()
        .map(|driver| (driver.name, driver.identity))
        .collect();
    let expected: Vec<_> = drivers.iter().map(|(name, id)| (name.to_string(), *id)).collect();
    assert_eq!(found, expected);

    let found: Vec<_> = loader
        .layer_properties(EnumerateFlags::All)
        .unwrap()
        .into_iter()
        .map(|layer| (layer.name, layer.identity))
        .collect();
    let expected: Vec<_> = layers.iter().map(|(name, id)| (name.to_string(), *id)).collect();
    assert_eq!(found, expected);
}

#[test]
fn initialization_scans_once_until_deinitialized() {
    let installation = Installation::new();
    let mut loader = installation.loader();
    assert_eq!(installation.platform.scans(), 0);

    loader.initialize().unwrap();
    loader.initialize().unwrap();
    loader.ensure_initialized().unwrap();
    loader.driver_properties(EnumerateFlags::All).unwrap();
    loader.layer_properties(EnumerateFlags::All).unwrap();
    assert_eq!(installation.platform.scans(), 1);
    assert_eq!(loader.state(), LoaderState::Initialized);

    loader.deinitialize();
    assert_eq!(loader.state(), LoaderState::Uninitialized);
    loader.driver_properties(EnumerateFlags::All).unwrap();
    assert_eq!(installation.platform.scans(), 2);
}

#[test]
fn enumeration_reports_incomplete_for_short_buffers() {
    let tree = DescriptorTree::new();
    tree.write(
        "sk.json",
        &descriptor(
            vec![
                entry("a", &uuid(identity(0x01)), "a.so"),
                entry("b", &uuid(identity(0x02)), "b.so"),
                entry("c", &uuid(identity(0x03)), "c.so"),
            ],
            vec![],
        ),
    );
    let mut loader = isolated(&tree);

    assert_eq!(
        loader.enumerate_driver_properties(EnumerateFlags::All, None).unwrap(),
        (3, SkStatus::Success)
    );

    let mut short = vec![DriverProperties::default(); 2];
    assert_eq!(
        loader
            .enumerate_driver_properties(EnumerateFlags::All, Some(short.as_mut_slice()))
            .unwrap(),
        (2, SkStatus::Incomplete)
    );
    assert_eq!(short[0].name, "a");
    assert_eq!(short[1].name, "b");

    let mut roomy = vec![DriverProperties::default(); 5];
    assert_eq!(
        loader
            .enumerate_driver_properties(EnumerateFlags::All, Some(roomy.as_mut_slice()))
            .unwrap(),
        (3, SkStatus::Success)
    );
    assert_eq!(roomy[2].name, "c");
    assert_eq!(roomy[3], DriverProperties::default());

    let mut none: Vec<LayerProperties> = Vec::new();
    assert_eq!(
        loader
            .enumerate_layer_properties(EnumerateFlags::All, Some(none.as_mut_slice()))
            .unwrap(),
        (0, SkStatus::Success)
    );
}

#[test]
fn broken_descriptors_do_not_hide_good_ones() {
    let tree = DescriptorTree::new();
    tree.write(
        "a.json",
        &descriptor(vec![entry("first", &uuid(identity(0x01)), "a.so")], vec![]),
    );
    tree.write_raw("b.json", "{ \"file_format_version\": \"1.0.0\", \"drivers\": [");
    tree.write(
        "c.json",
        &descriptor(vec![entry("second", &uuid(identity(0x02)), "c.so")], vec![]),
    );
    tree.write_raw("d.json", r#"{ "file_format_version": "2.0.0", "drivers": [] }"#);
    tree.write_raw("notes.txt", "not a descriptor");

    let mut loader = isolated(&tree);
    let names: Vec<_> = loader
        .driver_properties(EnumerateFlags::All)
        .unwrap()
        .into_iter()
        .map(|driver| driver.name)
        .collect();
    assert_eq!(names, vec!["first", "second"]);
    assert_eq!(loader.manifests().unwrap().len(), 2);
}

#[test]
fn sk_path_adds_search_roots() {
    let tree = DescriptorTree::new();
    tree.write(
        "sk.json",
        &descriptor(vec![entry("env", &uuid(identity(0x0e)), "env.so")], vec![]),
    );
    let config = SearchConfig::from_vars(Some(tree.path().as_os_str()), true);
    assert_eq!(config.roots(), vec![tree.path().to_path_buf()]);

    let mut loader = Loader::with_search_config(config);
    assert_eq!(loader.search_paths().unwrap().to_vec(), vec![tree.path().to_path_buf()]);
    let drivers = loader.driver_properties(EnumerateFlags::All).unwrap();
    assert_eq!(drivers.len(), 1);
    assert_eq!(drivers[0].name, "env");

    let config = SearchConfig::from_vars(Some(OsStr::new("")), true);
    assert!(config.roots().is_empty());
}

#[test]
fn manifest_storage_goes_through_the_host_allocator() {
    let installation = Installation::new();
    let recorder = RecordingAllocator::new();
    let mut loader = installation.loader();
    loader.set_allocator(recorder.allocator()).unwrap();

    loader.initialize().unwrap();
    assert_eq!(recorder.outstanding(), 1);
    assert!(loader.set_allocator(recorder.allocator()).is_err());

    loader.deinitialize();
    assert_eq!(recorder.outstanding(), 0);
}

#[test]
fn refused_manifest_allocation_fails_initialization() {
    let tree = DescriptorTree::new();
    tree.write(
        "a.json",
        &descriptor(vec![entry("alsa", &uuid(identity(0x01)), "liba.so")], vec![]),
    );
    tree.write(
        "b.json",
        &descriptor(vec![entry("jack", &uuid(identity(0x02)), "libb.so")], vec![]),
    );
    let recorder = RecordingAllocator::with_budget(1);
    let mut loader = isolated(&tree);
    loader.set_allocator(recorder.allocator()).unwrap();

    let err = loader.initialize().unwrap_err();
    assert_eq!(SkError::from(err), SkError::OutOfHostMemory);
    assert_eq!(loader.state(), LoaderState::Uninitialized);
    assert_eq!(recorder.refusals(), 1);
    assert_eq!(recorder.outstanding(), 0);

    // Nothing was kept: the next query tries again and fails the same way.
    assert_eq!(
        loader.driver_properties(EnumerateFlags::All).unwrap_err(),
        SkError::OutOfHostMemory
    );
    assert_eq!(recorder.outstanding(), 0);
}

#[test]
fn host_properties_come_from_the_platform() {
    let tree = DescriptorTree::new();
    let platform = MockPlatform::new([tree.path().to_path_buf()])
        .with_host("/home/listener", "/opt/player/bin/player");
    let mut loader = Loader::with_platform(platform.factory());

    assert_eq!(
        loader.home_dir().unwrap(),
        Some(PathBuf::from("/home/listener"))
    );
    assert_eq!(
        loader.executable_path().unwrap(),
        Some(PathBuf::from("/opt/player/bin/player"))
    );
    assert!(loader.is_initialized());

    let mut bare = Loader::with_platform(MockPlatform::new([]).factory());
    assert_eq!(bare.home_dir().unwrap(), None);
}

#[test]
fn layers_load_only_the_installation_they_use() {
    let tree = DescriptorTree::new();
    tree.write(
        "a.json",
        &descriptor(
            vec![],
            vec![implicit_entry("trace", &uuid(TRACE), "libtrace-a.so")],
        ),
    );
    tree.write(
        "b.json",
        &descriptor(
            vec![],
            vec![
                implicit_entry("trace", &uuid(TRACE), "libtrace-b.so"),
                entry("extra", &uuid(EXTRA), "libextra-b.so"),
            ],
        ),
    );
    tree.write(
        "c.json",
        &descriptor(vec![], vec![entry("extra", &uuid(EXTRA), "libextra-c.so")]),
    );
    let log = CallLog::new();
    let mut platform = MockPlatform::new([tree.path().to_path_buf()]);
    for (library, layer) in [
        ("libtrace-a.so", MockLayer::new(TRACE, "trace", log.clone())),
        ("libtrace-b.so", MockLayer::new(TRACE, "trace", log.clone())),
        ("libextra-b.so", MockLayer::new(EXTRA, "extra", log.clone())),
        ("libextra-c.so", MockLayer::new(EXTRA, "extra", log.clone())),
    ] {
        platform = platform.with_library(tree.library(library), layer.resolver());
    }
    let mut loader = Loader::with_platform(platform.factory());

    let instance = loader.create_instance(app(), &["extra"]).unwrap();
    assert_eq!(instance.layer_identities(), vec![EXTRA, TRACE]);
    assert_eq!(platform.loads(), instance.layer_count());

    // Listing every installation still loads each of them.
    assert_eq!(loader.enumerate_layer_create_infos("trace").unwrap().len(), 2);
    assert_eq!(platform.loads(), instance.layer_count() + 2);
}

#[test]
fn implicit_layers_join_every_instance() {
    let installation = Installation::new();
    let mut loader = installation.loader();

    assert_eq!(
        loader
            .layer_properties(EnumerateFlags::ImplicitOnly)
            .unwrap()
            .into_iter()
            .map(|layer| layer.identity)
            .collect::<Vec<_>>(),
        vec![TRACE]
    );

    let instance = loader.create_instance(app(), &["extra"]).unwrap();
    assert_eq!(instance.layer_identities(), vec![EXTRA, TRACE]);
    assert_eq!(instance.identity(), LOADER_INSTANCE_IDENTITY);

    let properties = instance.properties().unwrap();
    assert_eq!(properties.enabled_layers, vec![EXTRA, TRACE]);
    assert_eq!(properties.application.application_name, "loader-tests");
    assert_eq!(properties.driver_count, 1);
    assert_eq!(properties.layer_count, 2);

    let drivers = instance.driver_properties(EnumerateFlags::All).unwrap();
    assert_eq!(drivers.len(), 1);
    assert_eq!(drivers[0].identity, MOCK);

    // Asking for an implicit layer by name does not attach it twice.
    let instance = loader.create_instance(app(), &["trace"]).unwrap();
    assert_eq!(instance.layer_identities(), vec![TRACE]);
}

#[test]
fn drivers_are_wrapped_by_requested_and_implicit_layers() {
    let installation = Installation::new();
    let mut loader = installation.loader();
    let instance = loader.create_instance(app(), &[]).unwrap();

    let driver = loader.create_driver(&instance, "mock", &["extra"]).unwrap();
    assert_eq!(driver.identity(), MOCK);
    assert_eq!(driver.parent(), Some(instance.handle()));
    assert_eq!(driver.layer_identities(), vec![EXTRA, TRACE]);

    installation.log.take();
    let properties = driver.properties().unwrap();
    assert_eq!(properties.name, "mock");
    assert_eq!(
        installation.log.take(),
        vec!["extra:properties", "trace:properties", "driver:properties"]
    );
    // The instance took one implicit layer; the driver one candidate and
    // the two layers in its chain.
    assert_eq!(installation.platform.loads(), 4);
}

#[test]
fn unknown_layers_and_drivers_are_not_found() {
    let installation = Installation::new();
    let mut loader = installation.loader();
    let instance = loader.create_instance(app(), &[]).unwrap();

    assert_eq!(
        loader.create_instance(app(), &["nope"]).unwrap_err(),
        SkError::NotFound
    );
    assert_eq!(
        loader.create_driver(&instance, "nope", &[]).unwrap_err(),
        SkError::NotFound
    );
    assert_eq!(
        loader.create_driver(&instance, "mock", &["nope"]).unwrap_err(),
        SkError::NotFound
    );
}

#[test]
fn driver_creation_falls_back_to_the_next_installation() {
    let tree = DescriptorTree::new();
    tree.write(
        "a.json",
        &descriptor(vec![entry("mock", &uuid(MOCK), "libbroken.so")], vec![]),
    );
    tree.write(
        "b.json",
        &descriptor(vec![entry("mock", &uuid(BACKUP), "libbackup.so")], vec![]),
    );
    let log = CallLog::new();
    let platform = MockPlatform::new([tree.path().to_path_buf()])
        .with_library(
            tree.library("libbroken.so"),
            MockDriver::new(MOCK, "mock", log.clone())
                .failing(SkError::InitializationFailed)
                .resolver(),
        )
        .with_library(
            tree.library("libbackup.so"),
            MockDriver::new(BACKUP, "mock", log).resolver(),
        );
    let mut loader = Loader::with_platform(platform.factory());
    let instance = loader.create_instance(app(), &[]).unwrap();

    let candidates = loader.enumerate_driver_create_infos("mock").unwrap();
    assert_eq!(
        candidates.iter().map(|entry| entry.identity).collect::<Vec<_>>(),
        vec![MOCK, BACKUP]
    );

    let driver = loader.create_driver(&instance, "mock", &[]).unwrap();
    assert_eq!(driver.identity(), BACKUP);
}

#[test]
fn last_failure_is_reported_when_no_installation_works() {
    let tree = DescriptorTree::new();
    tree.write(
        "a.json",
        &descriptor(vec![entry("mock", &uuid(MOCK), "liba.so")], vec![]),
    );
    tree.write(
        "b.json",
        &descriptor(vec![entry("mock", &uuid(BACKUP), "libb.so")], vec![]),
    );
    let log = CallLog::new();
    let platform = MockPlatform::new([tree.path().to_path_buf()])
        .with_library(
            tree.library("liba.so"),
            MockDriver::new(MOCK, "mock", log.clone())
                .failing(SkError::InitializationFailed)
                .resolver(),
        )
        .with_library(
            tree.library("libb.so"),
            MockDriver::new(BACKUP, "mock", log)
                .failing(SkError::OutOfHostMemory)
                .resolver(),
        );
    let mut loader = Loader::with_platform(platform.factory());
    let instance = loader.create_instance(app(), &[]).unwrap();

    assert_eq!(
        loader.create_driver(&instance, "mock", &[]).unwrap_err(),
        SkError::OutOfHostMemory
    );
}

#[test]
fn objects_outlive_the_loader() {
    let installation = Installation::new();
    let mut loader = installation.loader();
    let instance = loader.create_instance(app(), &[]).unwrap();
    let driver = loader.create_driver(&instance, "mock", &[]).unwrap();
    drop(loader);

    assert_eq!(driver.properties().unwrap().name, "mock");
    assert_eq!(instance.properties().unwrap().driver_count, 1);
}
