//! Drivers loaded from a real shared library through the native platform.

use std::env;
use std::path::PathBuf;

use pretty_assertions::assert_eq;
use sk_core::{ApplicationInfo, Driver, SkObject, Uuid, Version};
use sk_loader::{Loader, SearchConfig};
use sk_tests::{descriptor, entry, DescriptorTree};

// Compiled into the `sk-native-driver` library.
const NATIVE: Uuid = Uuid::from_bytes([
    0x5e, 0x1f, 0x0a, 0x7c, 0x2b, 0x44, 0x4d, 0x0e, 0x9a, 0x61, 0x3c, 0x8d, 0x11, 0xf2, 0x07, 0xb5,
]);

/// The `sk-native-driver` cdylib cargo built alongside this test binary.
fn native_library() -> PathBuf {
    let file = format!(
        "{}sk_native_driver{}",
        env::consts::DLL_PREFIX,
        env::consts::DLL_SUFFIX
    );
    let exe = env::current_exe().unwrap();
    exe.ancestors()
        .skip(1)
        .take(2)
        .map(|dir| dir.join(&file))
        .find(|path| path.is_file())
        .unwrap_or_else(|| panic!("{file} was not built next to {}", exe.display()))
}

#[cfg(target_os = "linux")]
fn mapped(file: &str) -> bool {
    std::fs::read_to_string("/proc/self/maps").is_ok_and(|maps| maps.contains(file))
}

/// A driver created through a loader that is already gone.
fn native_driver(tree: &DescriptorTree) -> Driver {
    let library = native_library();
    tree.write(
        "native.json",
        &descriptor(
            vec![entry("native", &NATIVE.to_string(), &library.to_string_lossy())],
            vec![],
        ),
    );
    let mut loader =
        Loader::with_search_config(SearchConfig::isolated([tree.path().to_path_buf()]));
    let instance = loader
        .create_instance(ApplicationInfo::new("native-tests", Version::new(1, 0, 0)), &[])
        .unwrap();
    loader.create_driver(&instance, "native", &[]).unwrap()
}

#[test]
fn native_driver_runs_after_its_chain_is_dropped() {
    let tree = DescriptorTree::new();
    let driver = native_driver(&tree);

    #[cfg(target_os = "linux")]
    assert!(mapped("sk_native_driver"));
    assert_eq!(driver.libraries().len(), 1);

    let properties = driver.properties().unwrap();
    assert_eq!(properties.identity, NATIVE);
    assert_eq!(properties.name, "native");
    assert_eq!(driver.identity(), NATIVE);

    let names: Vec<_> = driver
        .enumerate_devices()
        .unwrap()
        .into_iter()
        .map(|device| device.properties().name.clone())
        .collect();
    assert_eq!(names, vec!["native-out", "native-in"]);
}

#[test]
fn table_keeps_the_library_after_the_driver_is_gone() {
    let tree = DescriptorTree::new();
    let driver = native_driver(&tree);
    let table = driver.shared_dispatch();
    drop(driver);

    #[cfg(target_os = "linux")]
    assert!(mapped("sk_native_driver"));
    assert_eq!(table.libraries().len(), 1);
    assert!(table.get_driver_properties.is_some());
    drop(table);
}
